//! Squadnet Core
//!
//! Shared building blocks for the orchestration engine: the validated
//! configuration structs handed in by front-ends, the core error type,
//! and the logging bootstrap.

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{
    AgentProfile, AgentRole, BreakerPolicy, CriteriaSpec, OrchestrationConfig, RetryPolicy,
    ToolServerSpec,
};
pub use error::{CoreError, Result};
pub use logging::init_logging;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_functionality() {
        let config = OrchestrationConfig::default();
        assert_eq!(config.max_history, 1000);
    }
}
