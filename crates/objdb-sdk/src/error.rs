use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("resource already registered: {0}")]
    DuplicateResource(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("schema error: {0}")]
    Schema(#[from] objdb_schema::SchemaError),

    #[error("partition error: {0}")]
    Partition(#[from] objdb_partition::PartitionError),

    #[error("engine error: {0}")]
    Engine(#[from] objdb_engine::EngineError),
}

pub type SdkResult<T> = Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_convert() {
        let e: SdkError = objdb_engine::EngineError::Config("bad".into()).into();
        assert!(matches!(e, SdkError::Engine(_)));
        assert!(e.to_string().contains("bad"));
    }

    #[test]
    fn toml_errors_convert() {
        let parse: Result<toml::Table, _> = toml::from_str("not = [valid");
        let e: SdkError = parse.unwrap_err().into();
        assert!(matches!(e, SdkError::Toml(_)));
    }
}
