use tracing::info;

use super::{Hook, HookOutcome, Next, TerminateEvent};

pub struct TerminationLogHook;

impl Hook<TerminateEvent> for TerminationLogHook {
    fn name(&self) -> &'static str {
        "termination-log"
    }

    fn handle(&self, event: &mut TerminateEvent, next: Next<'_, TerminateEvent>) -> HookOutcome {
        info!(reason = event.reason, "orgdocs server terminated");
        next.run(event)
    }
}
