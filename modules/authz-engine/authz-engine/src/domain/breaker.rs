//! Circuit breaker guarding the remote evaluator.
//!
//! State and the open timestamp live in atomics so the open fast path
//! never locks. Outcome bookkeeping and state transitions happen under a
//! short `parking_lot` lock that is never held across an `.await`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::BreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

/// The breaker refused the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerOpen {
    pub retry_after_ms: u64,
}

struct Window {
    /// `(recorded at, failed)` for the most recent calls, oldest first.
    outcomes: VecDeque<(Instant, bool)>,
}

const NEVER: u64 = u64::MAX;

pub struct CircuitBreaker {
    config: BreakerConfig,
    /// Retry hint handed out while every half-open trial slot is taken.
    trial_hint: Duration,
    epoch: Instant,
    state: AtomicU8,
    opened_at_ms: AtomicU64,
    /// Bumped on every entry into half-open; trial permits carry the value
    /// they were issued under.
    half_open_cycle: AtomicU64,
    trials_in_flight: AtomicU32,
    last_reject_log_ms: AtomicU64,
    window: Mutex<Window>,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: BreakerConfig, trial_hint: Duration) -> Self {
        let capacity = config.window_size;
        Self {
            config,
            trial_hint,
            epoch: Instant::now(),
            state: AtomicU8::new(BreakerState::Closed.as_u8()),
            opened_at_ms: AtomicU64::new(0),
            half_open_cycle: AtomicU64::new(0),
            trials_in_flight: AtomicU32::new(0),
            last_reject_log_ms: AtomicU64::new(NEVER),
            window: Mutex::new(Window {
                outcomes: VecDeque::with_capacity(capacity),
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> BreakerState {
        BreakerState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn now_ms(&self) -> u64 {
        millis(Instant::now().duration_since(self.epoch))
    }

    /// Ask for permission to call the dependency.
    ///
    /// A disabled breaker admits every call and records nothing.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerOpen`] with a retry hint while the breaker is open,
    /// or while half-open with every trial slot taken.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, BreakerOpen> {
        if !self.config.enabled {
            return Ok(CallPermit::new(self, None));
        }
        match self.state() {
            BreakerState::Closed => Ok(CallPermit::new(self, None)),
            BreakerState::Open => {
                let now = self.now_ms();
                let elapsed = now.saturating_sub(self.opened_at_ms.load(Ordering::Acquire));
                let cooldown = millis(self.config.cooldown);
                if elapsed < cooldown {
                    let retry_after_ms = cooldown - elapsed;
                    self.log_rejection(now, retry_after_ms);
                    return Err(BreakerOpen { retry_after_ms });
                }
                self.enter_half_open();
                self.try_acquire_trial()
            }
            BreakerState::HalfOpen => self.try_acquire_trial(),
        }
    }

    /// Warn about open-state rejections at most once per cooldown.
    fn log_rejection(&self, now: u64, retry_after_ms: u64) {
        let last = self.last_reject_log_ms.load(Ordering::Acquire);
        if last != NEVER && now.saturating_sub(last) < millis(self.config.cooldown) {
            return;
        }
        if self
            .last_reject_log_ms
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            warn!(retry_after_ms, "circuit breaker rejecting requests");
        }
    }

    fn enter_half_open(&self) {
        let _guard = self.window.lock();
        if self
            .state
            .compare_exchange(
                BreakerState::Open.as_u8(),
                BreakerState::HalfOpen.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.half_open_cycle.fetch_add(1, Ordering::AcqRel);
            self.trials_in_flight.store(0, Ordering::Release);
            info!("circuit breaker half-open, admitting trial calls");
        }
    }

    fn try_acquire_trial(&self) -> Result<CallPermit<'_>, BreakerOpen> {
        let _guard = self.window.lock();
        match self.state() {
            BreakerState::Closed => return Ok(CallPermit::new(self, None)),
            BreakerState::Open => {
                return Err(BreakerOpen {
                    retry_after_ms: millis(self.trial_hint),
                });
            }
            BreakerState::HalfOpen => {}
        }
        let limit = self.config.half_open_trials;
        let acquired = self
            .trials_in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok();
        if acquired {
            let cycle = self.half_open_cycle.load(Ordering::Acquire);
            Ok(CallPermit::new(self, Some(cycle)))
        } else {
            Err(BreakerOpen {
                retry_after_ms: millis(self.trial_hint),
            })
        }
    }

    fn open(&self, window: &mut Window, reason: &str) {
        window.outcomes.clear();
        self.opened_at_ms.store(self.now_ms(), Ordering::Release);
        self.state
            .store(BreakerState::Open.as_u8(), Ordering::Release);
        warn!(
            cooldown_ms = millis(self.config.cooldown),
            reason, "circuit breaker opened"
        );
    }

    fn is_current_trial(&self, cycle: u64) -> bool {
        cycle == self.half_open_cycle.load(Ordering::Acquire)
    }

    fn record(&self, trial: Option<u64>, success: bool) {
        if !self.config.enabled {
            return;
        }
        let mut window = self.window.lock();
        let state = self.state();

        if let Some(cycle) = trial {
            // Outcomes of trials issued before the latest half-open entry are stale.
            if !self.is_current_trial(cycle) {
                return;
            }
            self.trials_in_flight.fetch_sub(1, Ordering::AcqRel);
            // A trial only counts while the breaker is still waiting on trials.
            if state != BreakerState::HalfOpen {
                return;
            }
            if success {
                window.outcomes.clear();
                self.state
                    .store(BreakerState::Closed.as_u8(), Ordering::Release);
                info!("circuit breaker closed after successful trial");
            } else {
                self.open(&mut window, "trial call failed");
            }
            return;
        }

        if state != BreakerState::Closed {
            return;
        }
        let now = Instant::now();
        window.outcomes.push_back((now, !success));
        while window.outcomes.len() > self.config.window_size {
            window.outcomes.pop_front();
        }
        while window
            .outcomes
            .front()
            .is_some_and(|(at, _)| now.duration_since(*at) > self.config.window)
        {
            window.outcomes.pop_front();
        }

        let failures = window.outcomes.iter().filter(|(_, failed)| *failed).count();
        if failures >= usize::try_from(self.config.failure_threshold).unwrap_or(usize::MAX) {
            self.open(&mut window, "failure threshold reached");
        }
    }

    fn release_trial(&self, cycle: u64) {
        let _guard = self.window.lock();
        if self.is_current_trial(cycle) {
            self.trials_in_flight.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// Permission to make one call. Report the outcome with
/// [`CallPermit::success`] or [`CallPermit::failure`]; a permit dropped
/// without an outcome (cancelled call) frees its trial slot and records nothing.
#[must_use = "report the call outcome through the permit"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    /// Half-open cycle the trial slot belongs to.
    trial: Option<u64>,
    settled: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: Option<u64>) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    #[must_use]
    pub fn is_trial(&self) -> bool {
        self.trial.is_some()
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record(self.trial, true);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record(self.trial, false);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if let Some(cycle) = self.trial
            && !self.settled
        {
            self.breaker.release_trial(cycle);
        }
    }
}
