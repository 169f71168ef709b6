//! Error types for the graph store

/// Graph store errors
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Attribute key collides with a reserved snapshot field
    #[error("reserved attribute key: {0}")]
    ReservedKey(String),

    /// Core attribute carried a value of the wrong shape
    #[error("invalid value for attribute `{key}`: expected {expected}")]
    InvalidAttribute {
        /// Attribute key
        key: String,
        /// Expected shape
        expected: &'static str,
    },

    /// Snapshot could not be decoded
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// JSON encode/decode failure
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    /// Build an invalid-attribute error
    #[inline]
    pub fn invalid_attribute(key: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidAttribute {
            key: key.into(),
            expected,
        }
    }
}
