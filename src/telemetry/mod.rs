//! Per-route usage counters, threshold alerts, and the hourly rollup

mod usage;
mod window;

pub use usage::{TelemetrySnapshot, UsageTelemetry};
pub use window::{HourWindow, Rollup, RouteStats};
