//! Error types for memory operations

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors raised by scratchpad updates
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Category name did not resolve to one of the five categories
    #[error("Unknown memory category: {0}")]
    UnknownCategory(String),

    /// `key_facts` payload was not of the form `key=value`
    #[error("Invalid key_facts payload (expected key=value): {0}")]
    InvalidFactFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MemoryError::UnknownCategory("plans".to_string());
        assert_eq!(err.to_string(), "Unknown memory category: plans");
    }
}
