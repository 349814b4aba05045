//! Outline Core - Shared Types
//!
//! Pure data structures shared by every other crate in the workspace:
//! node and scope identifiers, the [`Value`] model produced by evaluation,
//! typed-value classification, the [`Document`] collaborator contract,
//! error taxonomy and engine configuration.
//!
//! This crate contains no evaluation logic. Parsing lives in `outline-dsl`,
//! scope construction and evaluation in `outline-engine`.

pub mod classify;
pub mod config;
pub mod document;
pub mod error;
pub mod identity;
pub mod value;

pub use classify::{classify_text, parse_date, parse_flight_number, parse_location};
pub use config::{
    CacheSettings, EngineConfig, EvaluationConfig, ProviderEndpoint, ProvidersConfig,
    SuggestionConfig,
};
pub use document::{Document, InMemoryDocument, Node};
pub use error::{
    ConfigError, DocumentError, EvalError, GeneralizeError, OutlineError, OutlineResult,
    ProviderError,
};
pub use identity::{new_node_id, NodeId, ScopeId};
pub use value::{BinaryOp, LatLng, Value, ValueType};
