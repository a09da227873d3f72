//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → InterceptorConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AccessLogConfig, InterceptorConfig, ListenerConfig, LogFormat, LoggingConfig, MetricsConfig,
    TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
