//! Lifecycle hooks around resource writes.

use async_trait::async_trait;

use objdb_types::Record;

use crate::error::EngineResult;

/// Hooks invoked around writes, in registration order, awaited inline.
///
/// `before_*` hooks run after input validation and before storage is
/// touched. They may rewrite the payload or veto the operation by returning
/// an error (conventionally [`EngineError::Rejected`]); the payload is
/// validated again after every hook has run. `after_*` hooks see the stored
/// result and cannot fail the operation.
///
/// `patch` reports through the update hooks whichever request pattern it
/// uses.
///
/// [`EngineError::Rejected`]: crate::EngineError::Rejected
#[async_trait]
pub trait ResourceObserver: Send + Sync {
    async fn before_insert(&self, _record: &mut Record) -> EngineResult<()> {
        Ok(())
    }

    async fn after_insert(&self, _record: &Record) {}

    async fn before_update(&self, _id: &str, _changes: &mut Record) -> EngineResult<()> {
        Ok(())
    }

    async fn after_update(&self, _before: &Record, _after: &Record) {}

    async fn before_replace(&self, _id: &str, _record: &mut Record) -> EngineResult<()> {
        Ok(())
    }

    async fn after_replace(&self, _before: Option<&Record>, _after: &Record) {}

    async fn before_delete(&self, _id: &str) -> EngineResult<()> {
        Ok(())
    }

    async fn after_delete(&self, _record: &Record) {}
}

/// An observer that does nothing.
pub struct NoOpObserver;

#[async_trait]
impl ResourceObserver for NoOpObserver {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[tokio::test]
    async fn noop_observer_allows() {
        let observer = NoOpObserver;
        let mut record = Map::new();
        observer.before_insert(&mut record).await.unwrap();
        observer.before_update("a", &mut record).await.unwrap();
        observer.before_replace("a", &mut record).await.unwrap();
        observer.before_delete("a").await.unwrap();
        observer.after_insert(&record).await;
        assert!(record.is_empty());
    }
}
