//! Partition indexes for objdb.
//!
//! A partition is a secondary key hierarchy derived from field values. For a
//! resource `orders` partitioned as `byRegion` on `region`, the record `o1`
//! with `region = "EU"` gets a pointer object at:
//!
//! ```text
//! resource=orders/partition=byRegion/region=EU/id=o1
//! ```
//!
//! Listing every `EU` order is then a prefix listing of that subtree, whose
//! cost grows with the number of matches rather than the size of the
//! resource.
//!
//! # Key Types
//!
//! - [`PartitionDefinition`] -- named, ordered projection of field values
//! - [`PartitionIndex`] -- maintains entries on insert, update, delete
//! - [`PartitionSyncWarning`] -- a failed index write; never an error
//! - [`SweepReport`] -- outcome of reconciling entries against live records
//!
//! # Consistency
//!
//! Index maintenance is best effort. The canonical record is the source of
//! truth; failed entry writes are reported as warnings and repaired by the
//! next write of the same record or by [`PartitionIndex::sweep`]. When a
//! partitioned value changes, the new entry is written before the old one is
//! deleted, so a crash between the two leaves a duplicate, never a gap.

pub mod definition;
pub mod error;
pub mod index;
pub mod sweep;
pub mod warning;

pub use definition::{value_at, PartitionDefinition, PartitionField};
pub use error::{PartitionError, PartitionResult};
pub use index::{IdPage, PartitionIndex};
pub use sweep::SweepReport;
pub use warning::PartitionSyncWarning;
