//! Error types for outline operations

use crate::NodeId;
use thiserror::Error;

/// Errors raised by the document collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Node not found: {id}")]
    NodeNotFound { id: NodeId },

    #[error("Invalid document structure at {id}: {reason}")]
    InvalidStructure { id: NodeId, reason: String },

    #[error("Transclusion of {target} rejected inside {site}: target is already in scope")]
    TransclusionRejected { site: NodeId, target: NodeId },

    #[error("Invalid outline at line {line}: {reason}")]
    InvalidOutline { line: usize, reason: String },
}

/// Evaluation errors.
///
/// These never escape the evaluator: they are converted into an undefined
/// value at the expression that produced them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("Missing argument {argument} for {function}")]
    MissingArgument { function: String, argument: String },

    #[error("Invalid argument {argument} for {function}: {reason}")]
    InvalidArgument {
        function: String,
        argument: String,
        reason: String,
    },

    #[error("Could not resolve {name}")]
    ResolutionFailure { name: String },

    #[error("Scope not found: {scope}")]
    ScopeNotFound { scope: String },

    #[error("Evaluation requires a running async runtime")]
    NoRuntime,
}

/// External data provider errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("No {provider} provider configured")]
    NotConfigured { provider: String },

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Formula generalization errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneralizeError {
    #[error("Scope {node} is not a single inline function call")]
    NotAFormula { node: NodeId },

    #[error("No anchor argument found for {function} at {node}")]
    NoAnchor { function: String, node: NodeId },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all outline errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OutlineError {
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Eval error: {0}")]
    Eval(#[from] EvalError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Generalize error: {0}")]
    Generalize(#[from] GeneralizeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for outline operations.
pub type OutlineResult<T> = Result<T, OutlineError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_error_display_not_found() {
        let err = DocumentError::NodeNotFound {
            id: NodeId::from("n-42"),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Node not found"));
        assert!(msg.contains("n-42"));
    }

    #[test]
    fn test_provider_error_display_rate_limited() {
        let err = ProviderError::RateLimited {
            provider: "osrm".to_string(),
            retry_after_ms: 1500,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Rate limited"));
        assert!(msg.contains("osrm"));
        assert!(msg.contains("1500"));
    }

    #[test]
    fn test_eval_error_display_missing_argument() {
        let err = EvalError::MissingArgument {
            function: "Weather".to_string(),
            argument: "date".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Weather"));
        assert!(msg.contains("date"));
    }

    #[test]
    fn test_generalize_error_display_no_anchor() {
        let err = GeneralizeError::NoAnchor {
            function: "Distance".to_string(),
            node: NodeId::from("c"),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("No anchor"));
        assert!(msg.contains("Distance"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "cache.max_entries".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("cache.max_entries"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_outline_error_from_variants() {
        let doc = OutlineError::from(DocumentError::NodeNotFound {
            id: NodeId::from("x"),
        });
        assert!(matches!(doc, OutlineError::Document(_)));

        let eval = OutlineError::from(EvalError::NoRuntime);
        assert!(matches!(eval, OutlineError::Eval(_)));

        let provider = OutlineError::from(ProviderError::NotConfigured {
            provider: "weather".to_string(),
        });
        assert!(matches!(provider, OutlineError::Provider(_)));

        let generalize = OutlineError::from(GeneralizeError::NotAFormula {
            node: NodeId::from("x"),
        });
        assert!(matches!(generalize, OutlineError::Generalize(_)));

        let config = OutlineError::from(ConfigError::MissingRequired {
            field: "providers.routing".to_string(),
        });
        assert!(matches!(config, OutlineError::Config(_)));
    }
}
