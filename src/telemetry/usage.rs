//! Telemetry facade wired to the notifier and the hourly schedule

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::window::{HourWindow, RouteStats};
use crate::clock::{delay_until, next_hour_boundary, Clock};
use crate::config::{AlertMetric, TelemetryConfig};
use crate::notify::Notifier;

/// Counts requests and errors per route and raises operator notifications
///
/// Constructed once at startup and shared by handle; all mutation happens
/// under one lock, and the hourly reset swaps the window wholesale so a
/// concurrent reader can never see a half-reset state.
pub struct UsageTelemetry {
    enabled: bool,
    thresholds: Vec<u64>,
    alert_on: AlertMetric,
    top_routes: usize,
    window: Mutex<HourWindow>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    started_at: DateTime<Utc>,
}

/// Current-window view served by /health and /dashboard
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    pub uptime_seconds: i64,
    pub routes: Vec<RouteStats>,
}

impl UsageTelemetry {
    pub fn new(config: &TelemetryConfig, notifier: Notifier, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            enabled: config.enabled,
            thresholds: config.thresholds.clone(),
            alert_on: config.alert_on,
            top_routes: config.top_routes,
            window: Mutex::new(HourWindow::default()),
            notifier,
            clock,
            started_at,
        }
    }

    /// Count one inbound request; alerts on first-time threshold crossings
    pub fn track_request(&self, route: &str) {
        if !self.enabled {
            return;
        }

        let crossed = self
            .lock_window()
            .observe_request(route, &self.thresholds, self.alert_on);

        if let Some(threshold) = crossed {
            tracing::info!(route = %route, threshold, "request volume threshold crossed");
            self.notifier.send(format!(
                "Request volume alert: {} reached {} requests this hour",
                route, threshold
            ));
        }
    }

    /// Count one terminal error response
    pub fn track_error(&self, route: &str, status: u16) {
        if !self.enabled {
            return;
        }

        let crossed =
            self.lock_window()
                .observe_error(route, status, &self.thresholds, self.alert_on);

        if let Some(threshold) = crossed {
            tracing::info!(route = %route, threshold, "error volume threshold crossed");
            self.notifier.send(format!(
                "Error volume alert: {} reached {} errors this hour",
                route, threshold
            ));
        }
    }

    /// Summarize and reset the window; called at each hour boundary
    pub fn rollup_and_reset(&self) {
        let window = {
            let mut guard = self.lock_window();
            std::mem::take(&mut *guard)
        };

        if window.is_empty() {
            tracing::debug!("hourly rollup skipped, empty window");
            return;
        }

        let rollup = window.rollup(self.top_routes);
        tracing::info!(
            total_requests = rollup.total_requests,
            total_errors = rollup.total_errors,
            rate_limit_hits = rollup.rate_limit_hits,
            "hourly telemetry rollup"
        );

        let hour_label = self.clock.now().format("%Y-%m-%d %H:00").to_string();
        self.notifier.send(rollup.format_summary(&hour_label));
    }

    /// Fire the rollup at the next wall-clock hour, then every 60 minutes
    pub fn spawn_hourly_rollup(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let telemetry = Arc::clone(self);
        tokio::spawn(async move {
            let now = telemetry.clock.now();
            let initial = delay_until(now, next_hour_boundary(now));
            tracing::debug!(
                initial_delay_secs = initial.as_secs(),
                "hourly rollup aligned to next hour boundary"
            );
            tokio::time::sleep(initial).await;

            loop {
                telemetry.rollup_and_reset();
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        })
    }

    /// Live view of the current window for the health endpoints
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let routes = self.lock_window().route_stats();
        TelemetrySnapshot {
            uptime_seconds: (self.clock.now() - self.started_at).num_seconds(),
            routes,
        }
    }

    fn lock_window(&self) -> MutexGuard<'_, HourWindow> {
        self.window.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
