use std::cell::RefCell;
use std::fmt;

use crate::error::StoreError;
use crate::model::{CleanupOutcome, DetectionResult, DuplicateGroup, Record};
use crate::store::RecordStore;

/// Merge every group into its survivor, then commit once.
///
/// For each group, in order, `redirect_and_remove` is called with the
/// survivor (the first member) and returns how many records it removed.
/// A failing group is recorded in `errors` and the remaining groups still
/// run. `commit` is called exactly once at the end; its failure is appended
/// to `errors` while `cleaned` still reports what was processed.
pub fn reconcile<'a, R, E, F, C>(
    groups: impl IntoIterator<Item = &'a DuplicateGroup<R>>,
    mut redirect_and_remove: F,
    commit: C,
) -> CleanupOutcome
where
    R: 'a,
    E: fmt::Display,
    F: FnMut(&R, &DuplicateGroup<R>) -> Result<usize, E>,
    C: FnOnce() -> Result<(), E>,
{
    let mut outcome = CleanupOutcome::default();

    for group in groups {
        let Some(survivor) = group.survivor() else {
            continue;
        };
        match redirect_and_remove(survivor, group) {
            Ok(removed) => outcome.cleaned += removed,
            Err(e) => {
                log::warn!("cleanup of duplicate group '{}' failed: {e}", group.key);
                outcome
                    .errors
                    .push(format!("failed to clean up duplicates of '{}': {e}", group.key));
            }
        }
    }

    if let Err(e) = commit() {
        log::error!("saving duplicate cleanup failed: {e}");
        outcome.errors.push(format!("failed to save changes: {e}"));
    }

    outcome
}

/// [`reconcile`] driven by a [`RecordStore`].
///
/// Each group runs inside a store checkpoint; a group that fails part-way
/// is rolled back to it, so only whole groups reach the commit.
pub fn reconcile_in_store<S>(store: &mut S, result: &DetectionResult<Record>) -> CleanupOutcome
where
    S: RecordStore + ?Sized,
{
    let store = RefCell::new(store);
    reconcile(
        &result.duplicates,
        |survivor, group| merge_group(&mut **store.borrow_mut(), survivor, group),
        || store.borrow_mut().commit(),
    )
}

fn merge_group<S>(store: &mut S, survivor: &Record, group: &DuplicateGroup<Record>) -> Result<usize, StoreError>
where
    S: RecordStore + ?Sized,
{
    let checkpoint = store.checkpoint()?;
    let merged = redirect_and_remove(store, survivor, group).and_then(|removed| {
        store.release(checkpoint)?;
        Ok(removed)
    });
    if merged.is_err() {
        if let Err(rollback) = store.rollback_to(checkpoint) {
            log::error!("rollback of group '{}' failed: {rollback}", group.key);
        }
    }
    merged
}

fn redirect_and_remove<S>(store: &mut S, survivor: &Record, group: &DuplicateGroup<Record>) -> Result<usize, StoreError>
where
    S: RecordStore + ?Sized,
{
    let mut removed = 0;
    for duplicate in group.redundant() {
        if duplicate.id == survivor.id {
            continue;
        }
        for edge in store.edges(&duplicate.id)? {
            store.retarget(&edge, &duplicate.id, &survivor.id)?;
        }
        store.remove(&duplicate.id)?;
        removed += 1;
    }
    log::debug!("merged {removed} duplicate(s) of '{}' into {}", group.key, survivor.id);
    Ok(removed)
}
