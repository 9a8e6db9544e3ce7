//! Middleware around resource operations.
//!
//! Every public operation of a [`Resource`](crate::Resource) is described as
//! an [`Operation`] and passed down an explicit chain of [`Middleware`]s,
//! outermost first. The innermost handler is the engine itself. A middleware
//! can inspect or rewrite the operation, short-circuit with its own
//! [`Outcome`], or post-process the result of `next.run(op)`.

use std::sync::Arc;

use async_trait::async_trait;

use objdb_types::Record;

use crate::error::{EngineError, EngineResult};
use crate::options::{ListOptions, Page};

/// A resource operation as seen by middleware.
#[derive(Clone, Debug)]
pub enum Operation {
    Insert(Record),
    Get(String),
    GetMany(Vec<String>),
    Exists(String),
    Update { id: String, changes: Record },
    Patch { id: String, changes: Record },
    Replace { id: String, record: Record },
    Delete(String),
    Restore(String),
    Purge(String),
    List(ListOptions),
    ListIds(ListOptions),
    Query(Record),
    Count(Option<Record>),
}

impl Operation {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::Get(_) => "get",
            Self::GetMany(_) => "get_many",
            Self::Exists(_) => "exists",
            Self::Update { .. } => "update",
            Self::Patch { .. } => "patch",
            Self::Replace { .. } => "replace",
            Self::Delete(_) => "delete",
            Self::Restore(_) => "restore",
            Self::Purge(_) => "purge",
            Self::List(_) => "list",
            Self::ListIds(_) => "list_ids",
            Self::Query(_) => "query",
            Self::Count(_) => "count",
        }
    }

    /// Returns `true` for operations that write storage.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Insert(_)
                | Self::Update { .. }
                | Self::Patch { .. }
                | Self::Replace { .. }
                | Self::Delete(_)
                | Self::Restore(_)
                | Self::Purge(_)
        )
    }
}

/// The result of an [`Operation`].
#[derive(Clone, Debug)]
pub enum Outcome {
    Record(Record),
    Records(Vec<Record>),
    Page(Page<Record>),
    Ids(Page<String>),
    Exists(bool),
    Count(usize),
    Done,
}

impl Outcome {
    fn unexpected(&self, wanted: &str) -> EngineError {
        EngineError::Internal(format!("expected a {wanted} outcome, got {self:?}"))
    }

    pub fn into_record(self) -> EngineResult<Record> {
        match self {
            Self::Record(record) => Ok(record),
            other => Err(other.unexpected("record")),
        }
    }

    pub fn into_records(self) -> EngineResult<Vec<Record>> {
        match self {
            Self::Records(records) => Ok(records),
            other => Err(other.unexpected("records")),
        }
    }

    pub fn into_page(self) -> EngineResult<Page<Record>> {
        match self {
            Self::Page(page) => Ok(page),
            other => Err(other.unexpected("page")),
        }
    }

    pub fn into_ids(self) -> EngineResult<Page<String>> {
        match self {
            Self::Ids(page) => Ok(page),
            other => Err(other.unexpected("ids")),
        }
    }

    pub fn into_bool(self) -> EngineResult<bool> {
        match self {
            Self::Exists(b) => Ok(b),
            other => Err(other.unexpected("exists")),
        }
    }

    pub fn into_count(self) -> EngineResult<usize> {
        match self {
            Self::Count(n) => Ok(n),
            other => Err(other.unexpected("count")),
        }
    }

    pub fn into_done(self) -> EngineResult<()> {
        match self {
            Self::Done => Ok(()),
            other => Err(other.unexpected("done")),
        }
    }
}

/// The innermost handler of a middleware chain.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn execute(&self, op: Operation) -> EngineResult<Outcome>;
}

/// A layer around resource operations.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str {
        "middleware"
    }

    async fn handle(&self, op: Operation, next: Next<'_>) -> EngineResult<Outcome>;
}

/// The rest of the chain after the current middleware.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    terminal: &'a dyn OperationHandler,
}

impl<'a> Next<'a> {
    pub fn new(chain: &'a [Arc<dyn Middleware>], terminal: &'a dyn OperationHandler) -> Self {
        Self { chain, terminal }
    }

    /// Pass `op` to the next middleware, or to the engine at the end.
    pub async fn run(self, op: Operation) -> EngineResult<Outcome> {
        match self.chain.split_first() {
            Some((layer, rest)) => {
                tracing::trace!(middleware = layer.name(), op = op.name(), "entering middleware");
                layer.handle(op, Next::new(rest, self.terminal)).await
            }
            None => self.terminal.execute(op).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Echo;

    #[async_trait]
    impl OperationHandler for Echo {
        async fn execute(&self, op: Operation) -> EngineResult<Outcome> {
            match op {
                Operation::Get(id) => {
                    let mut record = Record::new();
                    record.insert("id".into(), id.into());
                    Ok(Outcome::Record(record))
                }
                _ => Ok(Outcome::Done),
            }
        }
    }

    struct Trace {
        label: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Trace {
        async fn handle(&self, op: Operation, next: Next<'_>) -> EngineResult<Outcome> {
            self.seen.lock().unwrap().push(format!("{}>", self.label));
            let outcome = next.run(op).await;
            self.seen.lock().unwrap().push(format!("<{}", self.label));
            outcome
        }
    }

    struct Rewrite;

    #[async_trait]
    impl Middleware for Rewrite {
        async fn handle(&self, op: Operation, next: Next<'_>) -> EngineResult<Outcome> {
            match op {
                Operation::Get(id) => next.run(Operation::Get(id.to_uppercase())).await,
                other => next.run(other).await,
            }
        }
    }

    struct ReadOnly;

    #[async_trait]
    impl Middleware for ReadOnly {
        async fn handle(&self, op: Operation, next: Next<'_>) -> EngineResult<Outcome> {
            if op.is_write() {
                return Err(EngineError::Rejected(format!("{} is not allowed", op.name())));
            }
            next.run(op).await
        }
    }

    #[tokio::test]
    async fn chain_runs_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let chain: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(Trace { label: "a", seen: seen.clone() }),
            Arc::new(Trace { label: "b", seen: seen.clone() }),
        ];
        let outcome = Next::new(&chain, &Echo).run(Operation::Get("x".into())).await.unwrap();
        assert_eq!(outcome.into_record().unwrap()["id"], "x");
        assert_eq!(*seen.lock().unwrap(), vec!["a>", "b>", "<b", "<a"]);
    }

    #[tokio::test]
    async fn middleware_can_rewrite_and_veto() {
        let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(ReadOnly), Arc::new(Rewrite)];
        let outcome = Next::new(&chain, &Echo).run(Operation::Get("abc".into())).await.unwrap();
        assert_eq!(outcome.into_record().unwrap()["id"], "ABC");

        let err = Next::new(&chain, &Echo)
            .run(Operation::Delete("abc".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Rejected(_)));
    }

    #[test]
    fn unexpected_outcomes_are_errors() {
        assert!(Outcome::Done.into_record().is_err());
        assert_eq!(Outcome::Count(3).into_count().unwrap(), 3);
        assert!(Outcome::Exists(true).into_count().is_err());
    }
}
