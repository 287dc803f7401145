use super::{GuardOutcome, GuardRecord};

pub(super) fn install_handlers() {}

/// Runs `body` directly since faults cannot be intercepted on this platform.
pub(super) fn call_with_checkpoint<F>(_record: &GuardRecord, body: F) -> GuardOutcome
where
    F: FnOnce(),
{
    body();
    GuardOutcome::Completed
}
