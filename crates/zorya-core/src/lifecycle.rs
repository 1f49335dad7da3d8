use crate::CoreError;
use zorya_schema::BagStatus;

/// Accept only claim (start -> in-progress), completion (in-progress -> end)
/// and rollback (in-progress -> start).
pub fn validate_transition(from: BagStatus, to: BagStatus) -> Result<(), CoreError> {
    let claim = to.is_in_progress() && to.rollback_target() == Some(from);
    let settle = from.is_in_progress()
        && (from.completion_target() == Some(to) || from.rollback_target() == Some(to));

    if claim || settle {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
