use thiserror::Error;

/// Fatal pipeline failures. There is no partial-success mode: a stage
/// either commits its full table replacement or the run aborts with one
/// of these.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network failure, non-2xx status, or an unparseable upstream payload.
    #[error("transport: {0}")]
    Transport(String),

    /// An expected source column is absent from the previous stage's table.
    #[error("schema: missing source column `{column}`")]
    Schema { column: String },

    /// A key field could not be cast to its required integer type.
    #[error("type coercion: column `{column}` value `{value}` is not an integer")]
    TypeCoercion { column: &'static str, value: String },

    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl PipelineError {
    pub fn missing_column(column: &str) -> Self {
        Self::Schema {
            column: column.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
