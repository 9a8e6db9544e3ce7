use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use objdb_behavior::FieldCodec;
use objdb_partition::{PartitionDefinition, PartitionIndex, PartitionSyncWarning, SweepReport};
use objdb_schema::{FieldDef, FieldType, Schema};
use objdb_store::{KeyLayout, StorageClient, TimedStorage};
use objdb_types::Record;

use crate::config::ResourceConfig;
use crate::engine::{Core, Engine, IdGenerator, CREATED_AT, UPDATED_AT};
use crate::error::{EngineError, EngineResult};
use crate::fanout::bounded;
use crate::middleware::{Middleware, Next, Operation, Outcome};
use crate::observer::ResourceObserver;
use crate::options::{ListOptions, Page};

/// A schema-validated collection of records stored as objects.
///
/// Cloning is cheap; clones share storage, partitions, observers and the
/// warning channel.
#[derive(Clone)]
pub struct Resource {
    core: Arc<Core>,
    engine: Engine,
    middleware: Arc<[Arc<dyn Middleware>]>,
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.core.name)
            .field("root", &self.core.layout.root())
            .field("behavior", &self.core.config.behavior)
            .field("partitions", &self.core.partitions)
            .field("observers", &self.core.observers.len())
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

impl Resource {
    pub fn builder(name: impl Into<String>, storage: Arc<dyn StorageClient>) -> ResourceBuilder {
        ResourceBuilder::new(name, storage)
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// The effective schema, including engine-managed timestamp fields.
    pub fn schema(&self) -> &Schema {
        &self.core.schema
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.core.config
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.core.layout
    }

    pub fn partitions(&self) -> &[PartitionDefinition] {
        self.core.partitions.definitions()
    }

    /// Receive partition sync warnings produced from now on.
    pub fn subscribe_warnings(&self) -> broadcast::Receiver<PartitionSyncWarning> {
        self.core.warnings.subscribe()
    }

    /// Run `op` through the middleware chain.
    pub async fn execute(&self, op: Operation) -> EngineResult<Outcome> {
        Next::new(&self.middleware, &self.engine).run(op).await
    }

    // ---------------------------------------------------------------
    // Single-record operations
    // ---------------------------------------------------------------

    /// Validate and store a new record, assigning an id if it has none.
    pub async fn insert(&self, data: Record) -> EngineResult<Record> {
        self.execute(Operation::Insert(data)).await?.into_record()
    }

    pub async fn get(&self, id: &str) -> EngineResult<Record> {
        self.execute(Operation::Get(id.to_string())).await?.into_record()
    }

    pub async fn exists(&self, id: &str) -> EngineResult<bool> {
        self.execute(Operation::Exists(id.to_string())).await?.into_bool()
    }

    /// Merge `changes` over the stored record. Fields not named in `changes`
    /// are kept; a `null` removes an optional field.
    pub async fn update(&self, id: &str, changes: Record) -> EngineResult<Record> {
        self.execute(Operation::Update {
            id: id.to_string(),
            changes,
        })
        .await?
        .into_record()
    }

    /// Same result as [`update`](Self::update), through a metadata-only
    /// rewrite when the behavior allows it.
    pub async fn patch(&self, id: &str, changes: Record) -> EngineResult<Record> {
        self.execute(Operation::Patch {
            id: id.to_string(),
            changes,
        })
        .await?
        .into_record()
    }

    /// Store `record` as the complete record under `id`, creating it if
    /// absent. Fields missing from `record` are gone afterwards.
    pub async fn replace(&self, id: &str, record: Record) -> EngineResult<Record> {
        self.execute(Operation::Replace {
            id: id.to_string(),
            record,
        })
        .await?
        .into_record()
    }

    pub async fn delete(&self, id: &str) -> EngineResult<()> {
        self.execute(Operation::Delete(id.to_string())).await?.into_done()
    }

    /// Undo a soft delete.
    pub async fn restore(&self, id: &str) -> EngineResult<Record> {
        self.execute(Operation::Restore(id.to_string())).await?.into_record()
    }

    /// Remove a record for good, whether live or soft-deleted.
    pub async fn purge(&self, id: &str) -> EngineResult<()> {
        self.execute(Operation::Purge(id.to_string())).await?.into_done()
    }

    // ---------------------------------------------------------------
    // Listing and queries
    // ---------------------------------------------------------------

    pub async fn list(&self, options: ListOptions) -> EngineResult<Vec<Record>> {
        Ok(self.page(options).await?.items)
    }

    pub async fn page(&self, options: ListOptions) -> EngineResult<Page<Record>> {
        self.execute(Operation::List(options)).await?.into_page()
    }

    pub async fn list_ids(&self, options: ListOptions) -> EngineResult<Vec<String>> {
        Ok(self.execute(Operation::ListIds(options)).await?.into_ids()?.items)
    }

    /// Records whose values equal every entry of `filter`. Keys may be dot
    /// paths into nested objects.
    pub async fn query(&self, filter: Record) -> EngineResult<Vec<Record>> {
        self.execute(Operation::Query(filter)).await?.into_records()
    }

    pub async fn count(&self) -> EngineResult<usize> {
        self.execute(Operation::Count(None)).await?.into_count()
    }

    pub async fn count_where(&self, filter: Record) -> EngineResult<usize> {
        self.execute(Operation::Count(Some(filter))).await?.into_count()
    }

    /// Live records among `ids`, in the given order. Missing ids are skipped.
    pub async fn get_many<I, S>(&self, ids: I) -> EngineResult<Vec<Record>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids = ids.into_iter().map(Into::into).collect();
        self.execute(Operation::GetMany(ids)).await?.into_records()
    }

    // ---------------------------------------------------------------
    // Bulk writes
    // ---------------------------------------------------------------

    /// Insert each record independently; one failure does not stop the rest.
    pub async fn insert_many(&self, records: Vec<Record>) -> EngineResult<Vec<EngineResult<Record>>> {
        let resource = self.clone();
        bounded(self.core.config.parallelism, records, move |record| {
            let resource = resource.clone();
            async move { resource.insert(record).await }
        })
        .await
    }

    /// Delete each id independently; one failure does not stop the rest.
    pub async fn delete_many<I, S>(&self, ids: I) -> EngineResult<Vec<EngineResult<()>>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let resource = self.clone();
        bounded(self.core.config.parallelism, ids, move |id| {
            let resource = resource.clone();
            async move { resource.delete(&id).await }
        })
        .await
    }

    // ---------------------------------------------------------------
    // Partition maintenance
    // ---------------------------------------------------------------

    /// Wait until background partition updates have completed.
    pub async fn flush_partitions(&self) {
        self.core.flush_partitions().await;
    }

    /// Rebuild partition entries from the live records, writing missing
    /// entries and removing orphaned ones.
    pub async fn sweep_partitions(&self) -> EngineResult<SweepReport> {
        self.core.sweep_partitions().await
    }
}

/// Configures and builds a [`Resource`].
pub struct ResourceBuilder {
    name: String,
    storage: Arc<dyn StorageClient>,
    namespace: Option<String>,
    schema: Option<Schema>,
    config: ResourceConfig,
    partitions: Vec<PartitionDefinition>,
    observers: Vec<Arc<dyn ResourceObserver>>,
    middleware: Vec<Arc<dyn Middleware>>,
    id_generator: Option<IdGenerator>,
}

impl ResourceBuilder {
    pub fn new(name: impl Into<String>, storage: Arc<dyn StorageClient>) -> Self {
        Self {
            name: name.into(),
            storage,
            namespace: None,
            schema: None,
            config: ResourceConfig::default(),
            partitions: Vec::new(),
            observers: Vec::new(),
            middleware: Vec::new(),
            id_generator: None,
        }
    }

    /// Key prefix for every object of the resource.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn config(mut self, config: ResourceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn partition(mut self, definition: PartitionDefinition) -> Self {
        self.partitions.push(definition);
        self
    }

    /// Observers run in the order they are added.
    pub fn observer(mut self, observer: Arc<dyn ResourceObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// The first middleware added is the outermost.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Replace the default UUIDv7 id generator.
    pub fn id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.id_generator = Some(Arc::new(generator));
        self
    }

    pub fn build(self) -> EngineResult<Resource> {
        let config = self.config;
        config.check().map_err(EngineError::Config)?;

        let layout = KeyLayout::new(self.namespace.as_deref(), &self.name)
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let mut schema = self
            .schema
            .ok_or_else(|| EngineError::Config(format!("resource {} has no schema", self.name)))?;
        if let Some(policy) = config.unknown_fields {
            schema = schema.with_unknown_fields(policy);
        }
        if config.timestamps {
            schema = schema.with_extra_fields(vec![
                FieldDef::new(CREATED_AT, FieldType::Date),
                FieldDef::new(UPDATED_AT, FieldType::Date),
            ])?;
        }

        for (i, def) in self.partitions.iter().enumerate() {
            if self.partitions[..i].iter().any(|d| d.name() == def.name()) {
                return Err(EngineError::Config(format!(
                    "partition {} defined twice",
                    def.name()
                )));
            }
            def.validate_against(&schema)?;
        }

        let storage: Arc<dyn StorageClient> =
            Arc::new(TimedStorage::new(self.storage, config.request_timeout()));
        let partitions = Arc::new(PartitionIndex::new(
            self.name.clone(),
            layout.clone(),
            Arc::clone(&storage),
            self.partitions,
        ));
        let (warnings, _) = broadcast::channel(config.warning_capacity);
        let id_generator = self
            .id_generator
            .unwrap_or_else(|| Arc::new(|| uuid::Uuid::now_v7().to_string()));

        tracing::info!(
            resource = %self.name,
            root = layout.root(),
            behavior = %config.behavior,
            partitions = partitions.definitions().len(),
            "resource ready"
        );

        let core = Arc::new(Core {
            codec: FieldCodec::new(&schema),
            behavior: config.behavior.strategy(),
            name: self.name,
            schema,
            config,
            layout,
            storage,
            partitions,
            observers: self.observers,
            id_generator,
            warnings,
            upkeep: Mutex::new(None),
        });
        Ok(Resource {
            engine: Engine(Arc::clone(&core)),
            core,
            middleware: self.middleware.into(),
        })
    }
}
