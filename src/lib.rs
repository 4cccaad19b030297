//! llm-relay: resilient HTTP relay for OpenAI-compatible chat APIs
//!
//! Features:
//! - Retrying outbound dispatch with failure classification and backoff
//! - Per-model rate-limit tracking with a fallback chain of alternates
//! - Per-route usage telemetry with threshold alerts and hourly rollups
//! - Operator notifications via Telegram

pub mod clock;
pub mod config;
pub mod notify;
pub mod proxy;
pub mod routing;
pub mod telemetry;
pub mod upstream;

pub use config::AppConfig;
pub use proxy::{run_server, RelayState};
