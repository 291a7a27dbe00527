//! FinGraph Common Library
//!
//! Shared code for the FinGraph services including:
//! - Knowledge graph: concept store, rule base, inference, query engine
//! - Context assembly and the response pipeline
//! - Market data providers, rate limiting and the TTL quote cache
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod errors;
pub mod knowledge;
pub mod market;
pub mod metrics;

// Re-export commonly used types
pub use config::AppConfig;
pub use context::{ChatReply, ResponsePipeline};
pub use errors::{AppError, Result};
pub use knowledge::GraphQueryEngine;
pub use market::{MarketData, MarketDataService, MarketKind};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
