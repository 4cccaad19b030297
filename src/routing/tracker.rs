//! Rate-limit state per model and chain resolution

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::chain::FallbackChain;
use crate::clock::Clock;
use crate::config::ModelsConfig;

#[derive(Debug, Default)]
struct ModelState {
    is_limited: bool,
    last_limit_at: Option<DateTime<Utc>>,
}

/// Snapshot of one model's availability, as reported by /health
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    pub id: String,
    pub is_limited: bool,
    pub last_limit_at: Option<DateTime<Utc>>,
}

/// Tracks which models are rate-limited and resolves the fallback chain
///
/// State is process-local: in a multi-process deployment each instance keeps
/// its own view and makes its own fallback decisions.
pub struct ModelTracker {
    chain: FallbackChain,
    default_model: String,
    cooldown: ChronoDuration,
    states: Mutex<HashMap<String, ModelState>>,
    clock: Arc<dyn Clock>,
}

impl ModelTracker {
    pub fn new(
        chain: FallbackChain,
        default_model: String,
        cooldown: ChronoDuration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let states = chain
            .models()
            .iter()
            .map(|id| (id.clone(), ModelState::default()))
            .collect();

        Self {
            chain,
            default_model,
            cooldown,
            states: Mutex::new(states),
            clock,
        }
    }

    pub fn from_config(
        config: &ModelsConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let chain = FallbackChain::from_ordered(&config.chain)?;
        Ok(Self::new(
            chain,
            config.default_model.clone(),
            ChronoDuration::hours(config.cooldown_hours as i64),
            clock,
        ))
    }

    /// Resolve the model to actually use for a request
    ///
    /// Unknown ids get the configured default. Otherwise the chain is walked
    /// from `requested`, skipping limited models; when even the terminal model
    /// is limited it is returned anyway as a last-resort attempt.
    pub fn get_available_model(&self, requested: &str) -> String {
        let states = self.lock_states();

        if !self.chain.contains(requested) {
            return self.default_model.clone();
        }

        let mut current = requested;
        while states.get(current).map_or(false, |s| s.is_limited) {
            match self.chain.next(current) {
                Some(next) => current = next,
                None => break,
            }
        }

        current.to_string()
    }

    /// Mark a model rate-limited; idempotent, no-op for unknown ids
    pub fn record_rate_limit(&self, model: &str) {
        let mut states = self.lock_states();
        if let Some(state) = states.get_mut(model) {
            if !state.is_limited {
                tracing::warn!(model = %model, "rate limit hit, activating fallback chain");
            }
            state.is_limited = true;
            state.last_limit_at = Some(self.clock.now());
        }
    }

    /// Clear limits older than the cooldown window; returns how many cleared
    ///
    /// The only path that makes a limited model available again.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut cleared = 0;

        let mut states = self.lock_states();
        for (id, state) in states.iter_mut() {
            let expired = state
                .last_limit_at
                .map_or(false, |at| now - at > self.cooldown);
            if state.is_limited && expired {
                state.is_limited = false;
                state.last_limit_at = None;
                cleared += 1;
                tracing::info!(model = %id, "cooldown complete, model available again");
            }
        }

        cleared
    }

    /// Run the sweep on a fixed interval until process shutdown
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // interval fires immediately; consume the first tick
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let cleared = tracker.sweep_expired();
                tracing::debug!(cleared, "rate limit sweep completed");
            }
        })
    }

    /// Availability of every model, in chain order
    pub fn snapshot(&self) -> Vec<ModelStatus> {
        let states = self.lock_states();
        self.chain
            .models()
            .iter()
            .map(|id| {
                let state = states.get(id);
                ModelStatus {
                    id: id.clone(),
                    is_limited: state.map_or(false, |s| s.is_limited),
                    last_limit_at: state.and_then(|s| s.last_limit_at),
                }
            })
            .collect()
    }

    fn lock_states(&self) -> MutexGuard<'_, HashMap<String, ModelState>> {
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
