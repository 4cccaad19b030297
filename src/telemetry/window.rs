//! One hour of per-route counters

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::config::AlertMetric;

/// Counter state for the current wall-clock hour
///
/// The notified-threshold set lives here so it resets together with the
/// counters: taking the whole window with `mem::take` is the atomic reset.
#[derive(Debug, Default)]
pub struct HourWindow {
    requests: HashMap<String, u64>,
    errors: HashMap<String, u64>,
    rate_limit_hits: u64,
    notified: HashSet<(String, u64)>,
}

impl HourWindow {
    /// Count one request; returns a threshold crossed for the first time
    pub fn observe_request(
        &mut self,
        route: &str,
        thresholds: &[u64],
        alert_on: AlertMetric,
    ) -> Option<u64> {
        let count = self.requests.entry(route.to_string()).or_insert(0);
        *count += 1;
        let count = *count;

        if alert_on == AlertMetric::Requests {
            self.crossed_threshold(route, count, thresholds)
        } else {
            None
        }
    }

    /// Count one error response; 429s also feed the rate-limit counter
    pub fn observe_error(
        &mut self,
        route: &str,
        status: u16,
        thresholds: &[u64],
        alert_on: AlertMetric,
    ) -> Option<u64> {
        let count = self.errors.entry(route.to_string()).or_insert(0);
        *count += 1;
        let count = *count;

        if status == 429 {
            self.rate_limit_hits += 1;
        }

        if alert_on == AlertMetric::Errors {
            self.crossed_threshold(route, count, thresholds)
        } else {
            None
        }
    }

    /// First crossing of a configured level for this (route, threshold) pair
    fn crossed_threshold(&mut self, route: &str, count: u64, thresholds: &[u64]) -> Option<u64> {
        for &threshold in thresholds {
            if count == threshold {
                let key = (route.to_string(), threshold);
                if self.notified.insert(key) {
                    return Some(threshold);
                }
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.errors.is_empty()
    }

    /// Summarize the window for the hourly notification
    pub fn rollup(&self, top_n: usize) -> Rollup {
        let total_requests = self.requests.values().sum();
        let total_errors = self.errors.values().sum();

        let mut routes: Vec<(String, u64)> = self
            .requests
            .iter()
            .map(|(route, count)| (route.clone(), *count))
            .collect();
        routes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        routes.truncate(top_n);

        Rollup {
            total_requests,
            total_errors,
            rate_limit_hits: self.rate_limit_hits,
            top_routes: routes,
        }
    }

    /// Per-route counts for the health endpoint
    pub fn route_stats(&self) -> Vec<RouteStats> {
        let mut stats: Vec<RouteStats> = self
            .requests
            .iter()
            .map(|(route, &requests)| {
                let errors = self.errors.get(route).copied().unwrap_or(0);
                RouteStats {
                    path: route.clone(),
                    requests,
                    errors,
                }
            })
            .collect();
        stats.sort_by(|a, b| a.path.cmp(&b.path));
        stats
    }
}

/// Counts for one route in the current window
#[derive(Debug, Clone, Serialize)]
pub struct RouteStats {
    pub path: String,
    pub requests: u64,
    pub errors: u64,
}

impl RouteStats {
    /// Percentage of requests that did not end in an error response
    pub fn success_rate(&self) -> Option<f64> {
        if self.requests == 0 {
            return None;
        }
        let ok = self.requests.saturating_sub(self.errors);
        Some(ok as f64 / self.requests as f64 * 100.0)
    }
}

/// Hourly summary sent to the notification sink
#[derive(Debug, Clone)]
pub struct Rollup {
    pub total_requests: u64,
    pub total_errors: u64,
    pub rate_limit_hits: u64,
    pub top_routes: Vec<(String, u64)>,
}

impl Rollup {
    pub fn format_summary(&self, hour_label: &str) -> String {
        let mut summary = format!(
            "Hourly stats ({}):\nTotal requests: {}\nTotal errors: {}\nRate limit hits: {}",
            hour_label, self.total_requests, self.total_errors, self.rate_limit_hits
        );
        for (route, count) in &self.top_routes {
            summary.push_str(&format!("\n- {}: {}", route, count));
        }
        summary
    }
}
