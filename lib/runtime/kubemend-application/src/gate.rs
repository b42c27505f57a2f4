use tracing::info;

use kubemend_domain::{AppliedFix, Confidence, FixOrigin, Suggestion};

use crate::dispatcher::Dispatcher;
use crate::ledger::FixLedger;

/// Applies high-confidence suggestions without operator confirmation.
///
/// There is no deduplication: a suggestion that recurs is applied again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoApplyGate {
    enabled: bool,
}

impl AutoApplyGate {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn admits(&self, suggestion: &Suggestion) -> bool {
        self.enabled && suggestion.confidence == Confidence::High
    }

    /// Dispatch every admitted suggestion and record it in `ledger`.
    pub async fn run(
        &self,
        suggestions: &[Suggestion],
        dispatcher: &Dispatcher,
        ledger: &FixLedger,
    ) -> Vec<AppliedFix> {
        let mut applied = Vec::new();
        for suggestion in suggestions.iter().filter(|s| self.admits(s)) {
            info!(title = %suggestion.title, action = %suggestion.action.label(), "auto-applying suggestion");
            let fix = dispatcher
                .execute(
                    suggestion.action.clone(),
                    FixOrigin::Suggestion(suggestion.clone()),
                )
                .await;
            ledger.record(fix.clone());
            applied.push(fix);
        }
        applied
    }
}
