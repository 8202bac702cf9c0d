//! Client-side admission control.
//!
//! Two policies gate every outbound request and both must pass:
//!
//! 1. Minimum spacing: consecutive admissions are at least
//!    `min_spacing` apart, plus a uniform random jitter so bursts from
//!    independent processes desynchronize.
//! 2. Sliding window: at most `max_per_window` admissions within any
//!    trailing `window` interval.
//!
//! The gate only ever delays; it never rejects. Callers await
//! [`RateLimiter::admit`] and proceed when it returns.

use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use stockpile_core::RateLimitConfig;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Blocking admission gate shared by all provider workers.
///
/// State lives behind an async [`Mutex`] that is held across the waits,
/// so concurrent admitters queue up and each admission sees the window
/// exactly as the previous one left it.
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
    admitted: AtomicU64,
}

struct LimiterState {
    /// Admission instants still inside the trailing window, oldest first.
    window: VecDeque<Instant>,
    last_admit: Option<Instant>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let config = RateLimitConfig {
            max_per_window: config.max_per_window.max(1),
            ..config
        };
        Self {
            config,
            state: Mutex::new(LimiterState {
                window: VecDeque::new(),
                last_admit: None,
            }),
            admitted: AtomicU64::new(0),
        }
    }

    /// Wait until a request may be issued, then record the admission.
    pub async fn admit(&self) {
        let mut state = self.state.lock().await;

        loop {
            let now = Instant::now();
            while state
                .window
                .front()
                .is_some_and(|t| now.duration_since(*t) >= self.config.window())
            {
                state.window.pop_front();
            }
            if state.window.len() < self.config.max_per_window {
                break;
            }
            // Window full: the oldest entry leaves it first.
            let wake = state.window[0] + self.config.window();
            tracing::debug!(
                in_window = state.window.len(),
                cap = self.config.max_per_window,
                "Request window full, waiting for oldest admission to expire"
            );
            tokio::time::sleep_until(wake).await;
        }

        let spacing = self.config.min_spacing() + self.jitter();
        if let Some(last) = state.last_admit {
            let elapsed = Instant::now().duration_since(last);
            if elapsed < spacing {
                tokio::time::sleep(spacing - elapsed).await;
            }
        }

        let now = Instant::now();
        state.window.push_back(now);
        state.last_admit = Some(now);
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Total admissions since construction.
    pub fn admitted_total(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.config.max_jitter_ms;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}
