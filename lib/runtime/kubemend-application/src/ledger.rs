use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kubemend_domain::AppliedFix;

/// Append-only audit log of applied fixes, shared between the monitoring
/// task and operator-initiated actions.
#[derive(Clone, Default)]
pub struct FixLedger {
    entries: Arc<Mutex<Vec<AppliedFix>>>,
}

impl FixLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, fix: AppliedFix) {
        self.lock().push(fix);
    }

    pub fn entries(&self) -> Vec<AppliedFix> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A writer that panicked mid-push leaves a valid Vec behind.
    fn lock(&self) -> MutexGuard<'_, Vec<AppliedFix>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
