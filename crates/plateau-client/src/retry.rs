//! Bounded tolerance for transient failures while polling a packaging job.
//!
//! Individual requests are never retried: every gateway call surfaces its
//! failure to the caller. The one place that absorbs failures is the
//! `await_completion` loop, which keeps polling through a limited run of
//! consecutive transient errors (transport failures, 5xx, 429). Any
//! non-transient error, or one transient error too many, ends the loop.

use crate::error::PlateauApiError;

/// Counts consecutive transient failures against a fixed limit.
#[derive(Debug)]
pub(crate) struct TransientBudget {
    limit: u32,
    consecutive: u32,
}

impl TransientBudget {
    pub(crate) fn new(limit: u32) -> Self {
        Self {
            limit,
            consecutive: 0,
        }
    }

    /// Record a failed poll.
    ///
    /// Returns `Ok(())` when the caller should keep polling, or gives the
    /// error back when it must be surfaced.
    pub(crate) fn absorb(&mut self, err: PlateauApiError) -> Result<(), PlateauApiError> {
        if !err.is_transient() || self.consecutive >= self.limit {
            return Err(err);
        }
        self.consecutive += 1;
        tracing::warn!(
            attempt = self.consecutive,
            limit = self.limit,
            "transient failure while polling pack job, continuing: {err}"
        );
        Ok(())
    }

    /// A poll succeeded; the next failure starts a new run.
    pub(crate) fn reset(&mut self) {
        self.consecutive = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error() -> PlateauApiError {
        PlateauApiError::ApiError {
            endpoint: "GET /citygml/pack/j/status".into(),
            status: 503,
            body: String::new(),
        }
    }

    #[test]
    fn absorbs_up_to_limit_then_surfaces() {
        let mut budget = TransientBudget::new(2);
        assert!(budget.absorb(server_error()).is_ok());
        assert!(budget.absorb(server_error()).is_ok());
        assert!(budget.absorb(server_error()).is_err());
    }

    #[test]
    fn reset_restores_budget() {
        let mut budget = TransientBudget::new(1);
        assert!(budget.absorb(server_error()).is_ok());
        budget.reset();
        assert!(budget.absorb(server_error()).is_ok());
    }

    #[test]
    fn non_transient_errors_surface_immediately() {
        let mut budget = TransientBudget::new(5);
        let err = budget
            .absorb(PlateauApiError::UnknownJob { id: "j".into() })
            .unwrap_err();
        assert!(matches!(err, PlateauApiError::UnknownJob { .. }));
    }

    #[test]
    fn zero_limit_tolerates_nothing() {
        let mut budget = TransientBudget::new(0);
        assert!(budget.absorb(server_error()).is_err());
    }
}
