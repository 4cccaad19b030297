//! Outbound provider calls: error taxonomy, one-attempt client, retry wrapper

mod client;
mod error;
mod retry;

pub use client::UpstreamClient;
pub use error::{DispatchError, UpstreamError};
pub use retry::{Dispatcher, RetryPolicy};
