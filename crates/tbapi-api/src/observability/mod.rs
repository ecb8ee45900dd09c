//! Observability for the tbapi binary.
//!
//! Structured logging via `tracing-subscriber`, JSON or pretty text.

mod logging;

pub use logging::{create_json_layer, init_logging, parse_log_level, LoggingConfig};
