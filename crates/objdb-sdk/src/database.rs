use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use objdb_engine::{Resource, ResourceBuilder, ResourceConfig};
use objdb_store::{validate_name, StorageClient};

use crate::config::{DatabaseConfig, ResourceDefinition};
use crate::error::{SdkError, SdkResult};

/// Resources sharing one storage client and namespace.
pub struct Database {
    storage: Arc<dyn StorageClient>,
    namespace: Option<String>,
    defaults: ResourceConfig,
    resources: RwLock<BTreeMap<String, Resource>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("namespace", &self.namespace)
            .field("resources", &self.resource_names())
            .finish()
    }
}

impl Database {
    pub fn new(storage: Arc<dyn StorageClient>) -> Self {
        Self {
            storage,
            namespace: None,
            defaults: ResourceConfig::default(),
            resources: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open a database whose keys all live under `namespace`.
    pub fn with_namespace(storage: Arc<dyn StorageClient>, namespace: impl Into<String>) -> SdkResult<Self> {
        let namespace = namespace.into();
        validate_name("namespace", &namespace).map_err(|e| SdkError::Config(e.to_string()))?;
        Ok(Self {
            namespace: Some(namespace),
            ..Self::new(storage)
        })
    }

    /// Open a database and register every resource in `config`.
    pub fn from_config(storage: Arc<dyn StorageClient>, config: &DatabaseConfig) -> SdkResult<Self> {
        config.defaults.check().map_err(SdkError::Config)?;
        let mut db = match &config.namespace {
            Some(ns) => Self::with_namespace(storage, ns.clone())?,
            None => Self::new(storage),
        };
        db.defaults = config.defaults.clone();
        for def in &config.resources {
            db.create_resource(def)?;
        }
        Ok(db)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn storage(&self) -> &Arc<dyn StorageClient> {
        &self.storage
    }

    pub fn defaults(&self) -> &ResourceConfig {
        &self.defaults
    }

    /// A builder bound to this database's storage, namespace and defaults.
    /// Finish it with [`register`](Self::register).
    pub fn builder(&self, name: &str) -> ResourceBuilder {
        let builder = Resource::builder(name, Arc::clone(&self.storage)).config(self.defaults.clone());
        match &self.namespace {
            Some(ns) => builder.namespace(ns.clone()),
            None => builder,
        }
    }

    /// Build and register the resource described by `def`.
    pub fn create_resource(&self, def: &ResourceDefinition) -> SdkResult<Resource> {
        self.create_resource_with(def, |builder| builder)
    }

    /// Like [`create_resource`](Self::create_resource), letting `customize`
    /// add observers, middleware or an id generator before the build.
    pub fn create_resource_with<F>(&self, def: &ResourceDefinition, customize: F) -> SdkResult<Resource>
    where
        F: FnOnce(ResourceBuilder) -> ResourceBuilder,
    {
        if self.contains(&def.name) {
            return Err(SdkError::DuplicateResource(def.name.clone()));
        }
        let mut builder = self
            .builder(&def.name)
            .schema(def.schema()?)
            .config(def.effective_config(&self.defaults)?);
        for partition in def.partition_definitions()? {
            builder = builder.partition(partition);
        }
        self.register(customize(builder).build()?)
    }

    /// Add a built resource to the registry.
    pub fn register(&self, resource: Resource) -> SdkResult<Resource> {
        let mut resources = self.resources.write().expect("lock poisoned");
        if resources.contains_key(resource.name()) {
            return Err(SdkError::DuplicateResource(resource.name().to_string()));
        }
        tracing::info!(
            namespace = self.namespace.as_deref().unwrap_or(""),
            resource = resource.name(),
            "resource registered"
        );
        resources.insert(resource.name().to_string(), resource.clone());
        Ok(resource)
    }

    pub fn resource(&self, name: &str) -> SdkResult<Resource> {
        self.resources
            .read()
            .expect("lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| SdkError::ResourceNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.read().expect("lock poisoned").contains_key(name)
    }

    pub fn resource_names(&self) -> Vec<String> {
        self.resources.read().expect("lock poisoned").keys().cloned().collect()
    }

    /// Remove a resource from the registry. Stored objects are left alone.
    pub fn unregister(&self, name: &str) -> Option<Resource> {
        self.resources.write().expect("lock poisoned").remove(name)
    }

    /// Wait for background partition upkeep on every resource.
    pub async fn flush_partitions(&self) {
        let resources: Vec<Resource> = self.resources.read().expect("lock poisoned").values().cloned().collect();
        for resource in resources {
            resource.flush_partitions().await;
        }
    }
}
