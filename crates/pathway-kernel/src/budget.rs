//! Cost, time, and iteration accounting for a single request.
//!
//! A [`BudgetAccount`] is created per request and shared by every stage.
//! Counters only ever increase.  Cost and wall time are request-global;
//! the iteration limit applies per `do` loop instance, so loops pass their
//! own running count to [`charge`](BudgetAccount::charge).

use parking_lot::Mutex;
use std::fmt;
use std::time::Instant;

// ─────────────────────────────────────────────────────────────────────────────
// Limits
// ─────────────────────────────────────────────────────────────────────────────

/// Which budget dimension was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    Cost,
    Time,
    Iterations,
}

impl LimitKind {
    /// Stable lowercase name, used in the `X-Loop-Terminated` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::Cost => "cost",
            LimitKind::Time => "time",
            LimitKind::Iterations => "iterations",
        }
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request budget ceilings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetLimits {
    /// Maximum aggregate cost in cents.
    pub max_cost_cents: f64,
    /// Maximum wall time in milliseconds (also the request deadline).
    pub max_elapsed_ms: u64,
    /// Maximum iterations for a single `do` loop instance.
    pub max_loop_iterations: u32,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            max_cost_cents: 0.5,
            max_elapsed_ms: 500_000,
            max_loop_iterations: 500,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Account
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Charges {
    cost_cents: f64,
    total_iterations: u64,
}

/// Mutable per-request budget account.
///
/// Shared behind an `Arc` by the execution context; interior mutability is
/// a single short-lived lock, never held across an await point.
#[derive(Debug)]
pub struct BudgetAccount {
    limits: BudgetLimits,
    started: Instant,
    charges: Mutex<Charges>,
}

impl Default for BudgetAccount {
    fn default() -> Self {
        Self::new(BudgetLimits::default())
    }
}

impl BudgetAccount {
    /// Open an account with the given limits; the clock starts now.
    pub fn new(limits: BudgetLimits) -> Self {
        Self {
            limits,
            started: Instant::now(),
            charges: Mutex::new(Charges::default()),
        }
    }

    /// The configured ceilings.
    pub fn limits(&self) -> &BudgetLimits {
        &self.limits
    }

    /// Aggregate cost charged so far, in cents.
    pub fn cost_cents(&self) -> f64 {
        self.charges.lock().cost_cents
    }

    /// Wall time since the account was opened, in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Total loop iterations recorded across the whole request.
    pub fn total_iterations(&self) -> u64 {
        self.charges.lock().total_iterations
    }

    /// Record a charge and verify the limits.
    ///
    /// `cost_cents` is added to the aggregate.  `loop_iterations`, when
    /// present, is the calling loop instance's running count: it is checked
    /// against the per-loop ceiling and added to the monotonic total as one
    /// more iteration.  A no-op charge (`0.0`, `None`) is the idiom for
    /// "verify limits before dispatching a stage".
    pub fn charge(
        &self,
        cost_cents: f64,
        loop_iterations: Option<u32>,
    ) -> Result<(), LimitKind> {
        let mut charges = self.charges.lock();
        charges.cost_cents += cost_cents;
        if loop_iterations.is_some() {
            charges.total_iterations += 1;
        }
        let cost = charges.cost_cents;
        drop(charges);

        if let Some(count) = loop_iterations {
            if count >= self.limits.max_loop_iterations {
                return Err(LimitKind::Iterations);
            }
        }
        if self.elapsed_ms() >= self.limits.max_elapsed_ms {
            return Err(LimitKind::Time);
        }
        if cost >= self.limits.max_cost_cents {
            return Err(LimitKind::Cost);
        }
        Ok(())
    }

    /// Verify limits without charging anything.
    pub fn check(&self) -> Result<(), LimitKind> {
        self.charge(0.0, None)
    }
}
