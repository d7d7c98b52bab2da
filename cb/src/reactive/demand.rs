//! Demand accounting for a single subscription

use super::error::SubscriptionError;

/// Outstanding demand plus cumulative totals
///
/// `u64::MAX` outstanding means unbounded: consuming does not decrement it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Demand {
    outstanding: u64,
    requested: u64,
    delivered: u64,
}

impl Demand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` to outstanding demand
    ///
    /// `n == 0` is a protocol violation and leaves demand unchanged.
    pub fn add(&mut self, n: u64) -> Result<(), SubscriptionError> {
        if n == 0 {
            return Err(SubscriptionError::ProtocolViolation { requested: n });
        }
        self.outstanding = self.outstanding.saturating_add(n);
        self.requested = self.requested.saturating_add(n);
        Ok(())
    }

    /// Take one unit of demand for a delivery; false when none is outstanding
    pub fn try_consume(&mut self) -> bool {
        if self.outstanding == 0 {
            return false;
        }
        if !self.is_unbounded() {
            self.outstanding -= 1;
        }
        self.delivered += 1;
        true
    }

    /// Give back a unit taken by `try_consume` whose delivery did not happen
    pub fn restore(&mut self) {
        if self.delivered == 0 {
            return;
        }
        self.delivered -= 1;
        if !self.is_unbounded() {
            self.outstanding += 1;
        }
    }

    pub fn has_demand(&self) -> bool {
        self.outstanding > 0
    }

    pub fn is_unbounded(&self) -> bool {
        self.outstanding == u64::MAX
    }

    pub fn outstanding(&self) -> u64 {
        self.outstanding
    }

    /// Cumulative requested demand (saturating)
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Cumulative deliveries
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}
