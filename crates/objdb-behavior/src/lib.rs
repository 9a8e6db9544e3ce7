//! Behavior strategies for objdb.
//!
//! A behavior decides how a validated record is distributed between the
//! bounded metadata map of its canonical object and the unbounded body, and
//! reverses that split on read. Every strategy shares one [`FieldCodec`], so
//! the encoding of an individual value never depends on the strategy.
//!
//! # Strategies
//!
//! - [`EnforceLimits`] -- everything in metadata; overflow is an error
//! - [`BodyOverflow`] -- fill metadata in field order, spill the rest to
//!   the body (the default)
//! - [`TruncateData`] -- everything in metadata; overflow shortens values
//! - [`BodyOnly`] -- everything in the body
//!
//! Only metadata-only strategies ([`Behavior::metadata_only`]) allow the
//! engine's single-request metadata rewrite for patches.

pub mod behavior;
pub mod codec;
pub mod error;
pub mod strategies;

pub use behavior::{Behavior, BehaviorKind, EncodeContext, Encoded, DEFAULT_METADATA_BUDGET};
pub use codec::{CodecEntry, FieldCodec};
pub use error::{BehaviorError, BehaviorResult};
pub use strategies::{BodyOnly, BodyOverflow, EnforceLimits, TruncateData};
