//! The engine behind a [`Resource`](crate::Resource): validation, encoding,
//! request-pattern selection and partition upkeep.
//!
//! Request patterns per operation:
//!
//! | operation | requests                                              |
//! |-----------|-------------------------------------------------------|
//! | insert    | `head` (duplicate check), `put`                       |
//! | get       | `head`, plus `get` when the body holds fields         |
//! | update    | `get`, then `put`                                     |
//! | patch     | `head`, `copy_metadata` (metadata-only behaviors)     |
//! | replace   | `put`; a prior read only when partitions need it      |
//! | delete    | `get`, then `delete` or `copy_metadata`               |

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};

use objdb_behavior::{Behavior, BehaviorError, EncodeContext, Encoded, FieldCodec};
use objdb_partition::{PartitionIndex, PartitionSyncWarning, SweepReport};
use objdb_schema::{Schema, ValidationError, ValidationErrors};
use objdb_store::{KeyLayout, ListRequest, StorageClient};
use objdb_types::{record_id, reserved, validate_id, Metadata, Record, ID_FIELD};

use crate::config::{PartitionSync, ResourceConfig};
use crate::error::{EngineError, EngineResult};
use crate::fanout::bounded;
use crate::middleware::{Operation, OperationHandler, Outcome};
use crate::observer::ResourceObserver;
use crate::options::{matches_filter, ListOptions, Page};

/// Field maintained by the engine when timestamps are enabled.
pub const CREATED_AT: &str = "createdAt";
/// Field maintained by the engine when timestamps are enabled.
pub const UPDATED_AT: &str = "updatedAt";

/// Metadata kept free for the soft-delete stamp: `_del` plus a
/// millisecond-precision UTC RFC 3339 timestamp.
const DELETE_STAMP_RESERVE: usize = 4 + 24;

pub(crate) type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// A record read from storage together with the metadata it came from.
struct Loaded {
    record: Record,
    metadata: Metadata,
}

/// Queued partition jobs per resource before async writers wait.
const UPKEEP_QUEUE: usize = 1024;

/// Partition maintenance owed after a canonical write.
pub(crate) enum PartitionJob {
    Insert(Record),
    Update(Option<Record>, Record),
    Delete(Record),
}

enum WritePath {
    Put,
    CopyMetadata,
}

pub(crate) struct Core {
    pub(crate) name: String,
    pub(crate) schema: Schema,
    pub(crate) codec: FieldCodec,
    pub(crate) behavior: Arc<dyn Behavior>,
    pub(crate) config: ResourceConfig,
    pub(crate) layout: KeyLayout,
    pub(crate) storage: Arc<dyn StorageClient>,
    pub(crate) partitions: Arc<PartitionIndex>,
    pub(crate) observers: Vec<Arc<dyn ResourceObserver>>,
    pub(crate) id_generator: IdGenerator,
    pub(crate) warnings: broadcast::Sender<PartitionSyncWarning>,
    pub(crate) upkeep: Mutex<Option<mpsc::Sender<Upkeep>>>,
}

/// Messages to the background partition worker.
pub(crate) enum Upkeep {
    Job(PartitionJob),
    /// Answered once every job queued before it has run.
    Flush(oneshot::Sender<()>),
}

impl Core {
    // ---------------------------------------------------------------
    // Helpers
    // ---------------------------------------------------------------

    fn not_found(&self, id: &str) -> EngineError {
        EngineError::NotFound {
            resource: self.name.clone(),
            id: id.to_string(),
        }
    }

    fn behavior_error(&self, id: &str, e: BehaviorError) -> EngineError {
        match e {
            BehaviorError::SizeLimitExceeded { bytes_over, .. } => EngineError::SizeLimitExceeded {
                resource: self.name.clone(),
                id: id.to_string(),
                bytes_over,
            },
            BehaviorError::Corrupt { field, reason } => EngineError::Corrupt {
                resource: self.name.clone(),
                id: id.to_string(),
                reason: format!("{field}: {reason}"),
            },
            BehaviorError::Serialization(reason) => EngineError::Internal(reason),
        }
    }

    /// Metadata bytes a behavior may fill.
    fn write_budget(&self) -> usize {
        if self.config.soft_delete {
            self.config.metadata_budget.saturating_sub(DELETE_STAMP_RESERVE)
        } else {
            self.config.metadata_budget
        }
    }

    fn encode(&self, id: &str, record: &Record) -> EngineResult<Encoded> {
        let ctx = EncodeContext {
            resource: &self.name,
            id,
            budget: self.write_budget(),
            version: self.schema.version(),
        };
        self.behavior
            .encode(&self.codec, &ctx, record)
            .map_err(|e| self.behavior_error(id, e))
    }

    fn decode(&self, id: &str, metadata: &Metadata, body: Option<&[u8]>) -> EngineResult<Record> {
        self.behavior
            .decode(&self.codec, id, metadata, body)
            .map_err(|e| self.behavior_error(id, e))
    }

    /// The record as a later read will see it. Differs from `record` only
    /// when values were truncated to fit.
    fn stored_view(&self, id: &str, record: Record, encoded: &Encoded) -> EngineResult<Record> {
        if encoded.truncated {
            self.decode(id, &encoded.metadata, encoded.body.as_deref())
        } else {
            Ok(record)
        }
    }

    fn validate_full(&self, record: &Record) -> EngineResult<Record> {
        Ok(self.schema.validate(record).into_result()?)
    }

    /// Early check of update and patch payloads, before any storage call.
    fn validate_changes(&self, id: &str, changes: &Record) -> EngineResult<()> {
        let mut validated = self.schema.validate_partial(changes);
        match changes.get(ID_FIELD) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if s == id => {}
            Some(_) => validated
                .errors
                .push(ValidationError::new(ID_FIELD, "immutable", "id cannot be changed")),
        }
        validated.into_result()?;
        Ok(())
    }

    /// Stamp engine-managed timestamps. `created` carries over the original
    /// creation time on rewrites.
    fn stamp(&self, record: &mut Record, created: Option<&Value>) {
        if !self.config.timestamps {
            return;
        }
        let now = Value::String(now_rfc3339());
        let created = created.cloned().unwrap_or_else(|| now.clone());
        record.insert(CREATED_AT.to_string(), created);
        record.insert(UPDATED_AT.to_string(), now);
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    /// Read the canonical object, fetching the body only when the metadata
    /// says fields live there. Soft-deleted objects are returned as well.
    async fn read(&self, id: &str) -> EngineResult<Option<Loaded>> {
        let key = self.layout.canonical_key(id);
        let Some(metadata) = self.storage.head(&key).await? else {
            return Ok(None);
        };
        if !self.behavior.needs_body(&metadata) {
            let record = self.decode(id, &metadata, None)?;
            return Ok(Some(Loaded { record, metadata }));
        }
        self.read_full(id).await
    }

    /// Read metadata and body in one request.
    async fn read_full(&self, id: &str) -> EngineResult<Option<Loaded>> {
        let key = self.layout.canonical_key(id);
        let Some(object) = self.storage.get(&key).await? else {
            return Ok(None);
        };
        let record = self.decode(id, &object.metadata, object.body.as_deref())?;
        Ok(Some(Loaded {
            record,
            metadata: object.metadata,
        }))
    }

    async fn load_live(&self, id: &str) -> EngineResult<Option<Loaded>> {
        Ok(self.read(id).await?.filter(|l| !is_deleted(&l.metadata)))
    }

    async fn require_live(&self, id: &str) -> EngineResult<Loaded> {
        self.load_live(id).await?.ok_or_else(|| self.not_found(id))
    }

    /// Fetch many records with bounded concurrency, in input order,
    /// skipping ids with no live record.
    async fn fetch_live(self: &Arc<Self>, ids: Vec<String>) -> EngineResult<Vec<Record>> {
        let core = Arc::clone(self);
        let results = bounded(self.config.parallelism, ids, move |id| {
            let core = Arc::clone(&core);
            async move { core.load_live(&id).await.map(|l| l.map(|l| l.record)) }
        })
        .await?;
        results
            .into_iter()
            .filter_map(Result::transpose)
            .collect()
    }

    /// Ids whose canonical object exists and is not soft-deleted.
    async fn live_ids(self: &Arc<Self>, ids: Vec<String>) -> EngineResult<Vec<String>> {
        if !self.config.soft_delete {
            return Ok(ids);
        }
        let core = Arc::clone(self);
        let results = bounded(self.config.parallelism, ids, move |id| {
            let core = Arc::clone(&core);
            async move {
                let metadata = core.storage.head(&core.layout.canonical_key(&id)).await?;
                Ok::<_, EngineError>(metadata.filter(|m| !is_deleted(m)).map(|_| id))
            }
        })
        .await?;
        results
            .into_iter()
            .filter_map(Result::transpose)
            .collect()
    }

    async fn all_ids(&self) -> EngineResult<Vec<String>> {
        let keys = self.storage.list_all(&self.layout.canonical_prefix()).await?;
        Ok(ids_of(&keys))
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    pub(crate) async fn insert(self: &Arc<Self>, data: Record) -> EngineResult<Record> {
        let mut record = self.validate_full(&data)?;
        if !self.observers.is_empty() {
            for observer in &self.observers {
                observer.before_insert(&mut record).await?;
            }
            record = self.validate_full(&record)?;
        }
        self.stamp(&mut record, None);

        let id = match record_id(&record) {
            Some(id) => id.to_string(),
            None => {
                let id = (self.id_generator)();
                check_id(&id)?;
                record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
        };

        let key = self.layout.canonical_key(&id);
        if self.storage.head(&key).await?.is_some() {
            return Err(EngineError::DuplicateId {
                resource: self.name.clone(),
                id,
            });
        }

        let encoded = self.encode(&id, &record)?;
        let stored = self.stored_view(&id, record, &encoded)?;
        self.storage.put(&key, encoded.metadata, encoded.body).await?;
        tracing::debug!(resource = %self.name, id = %id, truncated = encoded.truncated, "record inserted");

        self.maintain(PartitionJob::Insert(stored.clone())).await;
        for observer in &self.observers {
            observer.after_insert(&stored).await;
        }
        Ok(stored)
    }

    pub(crate) async fn update(self: &Arc<Self>, id: &str, mut changes: Record) -> EngineResult<Record> {
        check_id(id)?;
        self.validate_changes(id, &changes)?;
        for observer in &self.observers {
            observer.before_update(id, &mut changes).await?;
        }
        let current = self.load_live_full(id).await?;
        self.rewrite(id, current, changes, WritePath::Put).await
    }

    /// Read for a rewrite or delete: metadata and body in one `get`.
    async fn load_live_full(&self, id: &str) -> EngineResult<Loaded> {
        self.read_full(id)
            .await?
            .filter(|l| !is_deleted(&l.metadata))
            .ok_or_else(|| self.not_found(id))
    }

    /// Update through the metadata-only request pattern when the behavior
    /// keeps every field in metadata and no key is a dot path. Otherwise,
    /// or when the stored object was written with a body, the result is
    /// produced by the update path instead.
    pub(crate) async fn patch(self: &Arc<Self>, id: &str, mut changes: Record) -> EngineResult<Record> {
        let eligible = self.behavior.metadata_only() && !changes.keys().any(|k| k.contains('.'));
        if !eligible {
            tracing::debug!(resource = %self.name, id, "patch falling back to update");
            return self.update(id, changes).await;
        }

        check_id(id)?;
        self.validate_changes(id, &changes)?;
        for observer in &self.observers {
            observer.before_update(id, &mut changes).await?;
        }

        let key = self.layout.canonical_key(id);
        let metadata = self
            .storage
            .head(&key)
            .await?
            .filter(|m| !is_deleted(m))
            .ok_or_else(|| self.not_found(id))?;

        if self.behavior.needs_body(&metadata) {
            tracing::debug!(resource = %self.name, id, "stored object has a body; patch rewrites it");
            let current = self.load_live_full(id).await?;
            return self.rewrite(id, current, changes, WritePath::Put).await;
        }

        let record = self.decode(id, &metadata, None)?;
        self.rewrite(id, Loaded { record, metadata }, changes, WritePath::CopyMetadata)
            .await
    }

    /// Merge `changes` over `current` and write the result.
    async fn rewrite(
        self: &Arc<Self>,
        id: &str,
        current: Loaded,
        changes: Record,
        path: WritePath,
    ) -> EngineResult<Record> {
        let before = strip_reserved(current.record);
        let mut merged = before.clone();
        for (field, value) in changes {
            merged.insert(field, value);
        }
        merged.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        self.stamp(&mut merged, before.get(CREATED_AT));

        let record = self.validate_full(&merged)?;
        let encoded = self.encode(id, &record)?;
        let stored = self.stored_view(id, record, &encoded)?;

        let key = self.layout.canonical_key(id);
        match path {
            WritePath::Put => self.storage.put(&key, encoded.metadata, encoded.body).await?,
            WritePath::CopyMetadata => self.storage.copy_metadata(&key, encoded.metadata).await?,
        }
        tracing::debug!(
            resource = %self.name,
            id,
            copy = matches!(path, WritePath::CopyMetadata),
            "record updated"
        );

        self.maintain(PartitionJob::Update(Some(before.clone()), stored.clone()))
            .await;
        for observer in &self.observers {
            observer.after_update(&before, &stored).await;
        }
        Ok(stored)
    }

    /// Write `data` as the complete record, creating it if absent.
    ///
    /// The previous record is read only when partitions or timestamps depend
    /// on it; observers otherwise see `before = None`.
    pub(crate) async fn replace(self: &Arc<Self>, id: &str, mut data: Record) -> EngineResult<Record> {
        check_id(id)?;
        match data.get(ID_FIELD) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) if s == id => {}
            Some(_) => {
                return Err(ValidationErrors::single(ValidationError::new(
                    ID_FIELD,
                    "immutable",
                    "id does not match the target record",
                ))
                .into())
            }
        }
        data.insert(ID_FIELD.to_string(), Value::String(id.to_string()));

        let mut record = self.validate_full(&data)?;
        if !self.observers.is_empty() {
            for observer in &self.observers {
                observer.before_replace(id, &mut record).await?;
            }
            record.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
            record = self.validate_full(&record)?;
        }

        let before = if !self.partitions.is_empty() || self.config.timestamps {
            self.load_live(id).await?.map(|l| strip_reserved(l.record))
        } else {
            None
        };
        self.stamp(&mut record, before.as_ref().and_then(|b| b.get(CREATED_AT)));

        let encoded = self.encode(id, &record)?;
        let stored = self.stored_view(id, record, &encoded)?;
        self.storage
            .put(&self.layout.canonical_key(id), encoded.metadata, encoded.body)
            .await?;
        tracing::debug!(resource = %self.name, id, existed = before.is_some(), "record replaced");

        self.maintain(PartitionJob::Update(before.clone(), stored.clone()))
            .await;
        for observer in &self.observers {
            observer.after_replace(before.as_ref(), &stored).await;
        }
        Ok(stored)
    }

    pub(crate) async fn delete(self: &Arc<Self>, id: &str) -> EngineResult<()> {
        check_id(id)?;
        for observer in &self.observers {
            observer.before_delete(id).await?;
        }
        let current = self.load_live_full(id).await?;
        let key = self.layout.canonical_key(id);

        if self.config.soft_delete {
            let mut metadata = current.metadata;
            metadata.insert(reserved::DELETED, now_rfc3339());
            self.storage.copy_metadata(&key, metadata).await?;
        } else {
            self.storage.delete(&key).await?;
        }
        tracing::debug!(resource = %self.name, id, soft = self.config.soft_delete, "record deleted");

        let record = strip_reserved(current.record);
        self.maintain(PartitionJob::Delete(record.clone())).await;
        for observer in &self.observers {
            observer.after_delete(&record).await;
        }
        Ok(())
    }

    /// Bring a soft-deleted record back. Restoring a live record returns it
    /// unchanged.
    pub(crate) async fn restore(self: &Arc<Self>, id: &str) -> EngineResult<Record> {
        if !self.config.soft_delete {
            return Err(EngineError::Config(format!(
                "soft delete is not enabled on {}",
                self.name
            )));
        }
        check_id(id)?;
        let key = self.layout.canonical_key(id);
        let mut metadata = self.storage.head(&key).await?.ok_or_else(|| self.not_found(id))?;
        if !is_deleted(&metadata) {
            return Ok(self.require_live(id).await?.record);
        }

        metadata.remove(reserved::DELETED);
        self.storage.copy_metadata(&key, metadata).await?;
        let record = self.require_live(id).await?.record;
        tracing::debug!(resource = %self.name, id, "record restored");

        self.maintain(PartitionJob::Insert(strip_reserved(record.clone())))
            .await;
        Ok(record)
    }

    /// Remove the canonical object, live or soft-deleted.
    pub(crate) async fn purge(self: &Arc<Self>, id: &str) -> EngineResult<()> {
        check_id(id)?;
        for observer in &self.observers {
            observer.before_delete(id).await?;
        }
        let current = self.read(id).await?.ok_or_else(|| self.not_found(id))?;
        let live = !is_deleted(&current.metadata);

        self.storage.delete(&self.layout.canonical_key(id)).await?;
        tracing::debug!(resource = %self.name, id, was_live = live, "record purged");

        if live {
            let record = strip_reserved(current.record);
            self.maintain(PartitionJob::Delete(record.clone())).await;
            for observer in &self.observers {
                observer.after_delete(&record).await;
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Listing and queries
    // ---------------------------------------------------------------

    /// Keys for a listing page: canonical keys, or partition entries when
    /// the options name a partition.
    async fn list_page_ids(&self, options: &ListOptions) -> EngineResult<Page<String>> {
        if options.limit == Some(0) {
            return Err(EngineError::InvalidQuery("limit must be at least 1".into()));
        }
        let request = ListRequest {
            start_after: options.cursor.clone(),
            max_keys: options.limit,
        };
        match &options.partition {
            Some(filter) => {
                let page = self
                    .partitions
                    .list(&filter.name, &filter.values, &request)
                    .await?;
                Ok(Page {
                    items: page.ids,
                    next_cursor: page.next_start_after,
                })
            }
            None => {
                let page = self
                    .storage
                    .list(&self.layout.canonical_prefix(), &request)
                    .await?;
                Ok(Page {
                    items: ids_of(&page.keys),
                    next_cursor: page.next_start_after,
                })
            }
        }
    }

    pub(crate) async fn list(self: &Arc<Self>, options: ListOptions) -> EngineResult<Page<Record>> {
        let ids = self.list_page_ids(&options).await?;
        let mut records = self.fetch_live(ids.items).await?;

        if let Some(filter) = &options.partition {
            let def = self.partitions.definition(&filter.name)?;
            let wanted = def.segments_for_filter(&filter.values);
            records.retain(|r| def.segments(r) == wanted);
        }
        Ok(Page {
            items: records,
            next_cursor: ids.next_cursor,
        })
    }

    /// Ids only. Partition listings return the index view, which may include
    /// stale entries until the next write of the record or a sweep.
    pub(crate) async fn list_ids(self: &Arc<Self>, options: ListOptions) -> EngineResult<Page<String>> {
        let page = self.list_page_ids(&options).await?;
        Ok(Page {
            items: self.live_ids(page.items).await?,
            next_cursor: page.next_cursor,
        })
    }

    /// Records equal to `filter` on every entry. A filter naming exactly one
    /// partition's fields is answered from that partition; every fetched
    /// record is checked against the filter either way.
    pub(crate) async fn query(self: &Arc<Self>, filter: &Record) -> EngineResult<Vec<Record>> {
        let ids = match self.partitions.match_filter(filter) {
            Some((def, segments)) => {
                tracing::debug!(resource = %self.name, partition = def.name(), "query answered from partition");
                let page = self
                    .partitions
                    .list_segments(def.name(), &segments, &ListRequest::all())
                    .await?;
                page.ids
            }
            None => {
                tracing::debug!(resource = %self.name, "query scanning all records");
                self.all_ids().await?
            }
        };
        let mut records = self.fetch_live(ids).await?;
        records.retain(|r| matches_filter(r, filter));
        Ok(records)
    }

    pub(crate) async fn count(self: &Arc<Self>, filter: Option<&Record>) -> EngineResult<usize> {
        match filter {
            Some(filter) => Ok(self.query(filter).await?.len()),
            None => {
                let ids = self.all_ids().await?;
                Ok(self.live_ids(ids).await?.len())
            }
        }
    }

    pub(crate) async fn get_many(self: &Arc<Self>, ids: Vec<String>) -> EngineResult<Vec<Record>> {
        for id in &ids {
            check_id(id)?;
        }
        self.fetch_live(ids).await
    }

    // ---------------------------------------------------------------
    // Partition upkeep
    // ---------------------------------------------------------------

    async fn maintain(self: &Arc<Self>, job: PartitionJob) {
        if self.partitions.is_empty() {
            return;
        }
        match self.config.partition_sync {
            PartitionSync::Sync => run_job(&self.partitions, &self.warnings, job).await,
            PartitionSync::Async => {
                let sender = self.upkeep_sender();
                if sender.send(Upkeep::Job(job)).await.is_err() {
                    tracing::warn!(resource = %self.name, "partition worker stopped; job dropped");
                }
            }
        }
    }

    /// The queue of the resource's partition worker, starting the worker on
    /// first use or after it stopped. One worker runs every job in
    /// submission order, so later writes never race earlier ones.
    fn upkeep_sender(&self) -> mpsc::Sender<Upkeep> {
        let mut slot = self.upkeep.lock().expect("lock poisoned");
        if let Some(sender) = slot.as_ref().filter(|s| !s.is_closed()) {
            return sender.clone();
        }
        let (sender, mut receiver) = mpsc::channel(UPKEEP_QUEUE);
        let partitions = Arc::clone(&self.partitions);
        let warnings = self.warnings.clone();
        let resource = self.name.clone();
        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                match message {
                    Upkeep::Job(job) => run_job(&partitions, &warnings, job).await,
                    Upkeep::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            tracing::debug!(resource = %resource, "partition worker finished");
        });
        *slot = Some(sender.clone());
        sender
    }

    /// Wait for background partition maintenance started so far.
    pub(crate) async fn flush_partitions(&self) {
        let sender = self.upkeep.lock().expect("lock poisoned").clone();
        let Some(sender) = sender else {
            return;
        };
        let (done, finished) = oneshot::channel();
        if sender.send(Upkeep::Flush(done)).await.is_err() || finished.await.is_err() {
            tracing::warn!(resource = %self.name, "partition worker stopped before flush");
        }
    }

    /// Reconcile every partition against the live records.
    pub(crate) async fn sweep_partitions(self: &Arc<Self>) -> EngineResult<SweepReport> {
        self.flush_partitions().await;
        let ids = self.all_ids().await?;
        let live: Vec<Record> = self
            .fetch_live(ids)
            .await?
            .into_iter()
            .map(strip_reserved)
            .collect();
        let report = self.partitions.sweep(&live).await?;
        for warning in &report.warnings {
            let _ = self.warnings.send(warning.clone());
        }
        Ok(report)
    }
}

async fn run_job(
    index: &PartitionIndex,
    warnings: &broadcast::Sender<PartitionSyncWarning>,
    job: PartitionJob,
) {
    let produced = match job {
        PartitionJob::Insert(record) => index.on_insert(&record).await,
        PartitionJob::Update(old, new) => index.on_update(old.as_ref(), &new).await,
        PartitionJob::Delete(record) => index.on_delete(&record).await,
    };
    for warning in produced {
        // No subscribers is fine; the warning has been logged.
        let _ = warnings.send(warning);
    }
}

/// The innermost handler of a resource's middleware chain.
#[derive(Clone)]
pub(crate) struct Engine(pub(crate) Arc<Core>);

#[async_trait]
impl OperationHandler for Engine {
    async fn execute(&self, op: Operation) -> EngineResult<Outcome> {
        let core = &self.0;
        match op {
            Operation::Insert(data) => core.insert(data).await.map(Outcome::Record),
            Operation::Get(id) => {
                check_id(&id)?;
                Ok(Outcome::Record(core.require_live(&id).await?.record))
            }
            Operation::GetMany(ids) => core.get_many(ids).await.map(Outcome::Records),
            Operation::Exists(id) => {
                check_id(&id)?;
                let metadata = core.storage.head(&core.layout.canonical_key(&id)).await?;
                Ok(Outcome::Exists(metadata.is_some_and(|m| !is_deleted(&m))))
            }
            Operation::Update { id, changes } => core.update(&id, changes).await.map(Outcome::Record),
            Operation::Patch { id, changes } => core.patch(&id, changes).await.map(Outcome::Record),
            Operation::Replace { id, record } => core.replace(&id, record).await.map(Outcome::Record),
            Operation::Delete(id) => core.delete(&id).await.map(|()| Outcome::Done),
            Operation::Restore(id) => core.restore(&id).await.map(Outcome::Record),
            Operation::Purge(id) => core.purge(&id).await.map(|()| Outcome::Done),
            Operation::List(options) => core.list(options).await.map(Outcome::Page),
            Operation::ListIds(options) => core.list_ids(options).await.map(Outcome::Ids),
            Operation::Query(filter) => core.query(&filter).await.map(Outcome::Records),
            Operation::Count(filter) => core.count(filter.as_ref()).await.map(Outcome::Count),
        }
    }
}

fn check_id(id: &str) -> EngineResult<()> {
    validate_id(id).map_err(|e| ValidationErrors::single(ValidationError::new(ID_FIELD, "id", e.to_string())).into())
}

fn is_deleted(metadata: &Metadata) -> bool {
    metadata.contains_key(reserved::DELETED)
}

/// Drop engine-reported keys such as `_truncated` before a record is merged
/// or indexed.
fn strip_reserved(mut record: Record) -> Record {
    record.retain(|k, _| !reserved::is_reserved_key(k));
    record
}

fn ids_of(keys: &[String]) -> Vec<String> {
    keys.iter()
        .filter_map(|k| KeyLayout::id_from_key(k))
        .map(String::from)
        .collect()
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
