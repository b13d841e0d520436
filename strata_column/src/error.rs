use crate::DataType;

/// Result type alias for column and frame operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by column and frame operations.
///
/// Every error aborts the single operation that raised it; operands are left
/// untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Operation invoked on an incompatible logical type.
    #[error("type mismatch in {op}: expected {expected}, found {found:?}")]
    TypeMismatch {
        /// Operation that rejected the type.
        op: &'static str,
        /// What the operation accepts.
        expected: &'static str,
        /// Type that was supplied.
        found: DataType,
    },
    /// Incompatible column counts, row counts or positional types.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    /// Substring request longer than a row.
    #[error("row {row} has {len} bytes, {required} required")]
    BoundsViolation {
        /// First offending row.
        row: usize,
        /// Payload length of that row.
        len: u64,
        /// Length the operation needs.
        required: u64,
    },
    /// Name or ordinal that does not resolve against the schema.
    #[error("invalid column reference: {0}")]
    InvalidColumnReference(String),
    /// Row filter that does not fit the column.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    /// Text that does not follow the requested numeric or date/time layout.
    #[error("malformed value in row {row}: {reason}")]
    MalformedValue {
        /// First offending row.
        row: usize,
        /// What was wrong with it.
        reason: String,
    },
    /// The fallback worker pool could not be started.
    #[error("worker pool unavailable: {0}")]
    WorkerPool(String),
}

impl Error {
    pub(crate) fn type_mismatch(op: &'static str, expected: &'static str, found: DataType) -> Self {
        Self::TypeMismatch {
            op,
            expected,
            found,
        }
    }
}
