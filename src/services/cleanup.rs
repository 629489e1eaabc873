use anyhow::{Context, Result};

use crate::core::state::AppState;
use crate::repositories;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ExamineePurge {
    pub(crate) rows_deleted: u64,
    pub(crate) folders_removed: usize,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PurgeAll {
    pub(crate) rows_deleted: u64,
    pub(crate) folders_removed: usize,
}

/// Deletes one submission: file first (missing file tolerated), then row.
/// A row that is already gone counts as success.
pub(crate) async fn delete_submission(state: &AppState, id: i64) -> Result<DeleteOutcome> {
    let Some(submission) = repositories::submissions::find_by_id(state.db(), id)
        .await
        .context("Failed to look up submission")?
    else {
        return Ok(DeleteOutcome::AlreadyAbsent);
    };

    let file_existed = state
        .storage()
        .delete_submission_file(&submission.pdf_path)
        .await
        .context("Failed to delete submission file")?;
    if !file_existed {
        tracing::warn!(
            submission_id = id,
            path = %submission.pdf_path,
            "Submission file already missing, deleting row anyway"
        );
    }

    repositories::submissions::delete_by_id(state.db(), id)
        .await
        .context("Failed to delete submission row")?;

    tracing::info!(submission_id = id, path = %submission.pdf_path, "Submission deleted");
    Ok(DeleteOutcome::Deleted)
}

/// Deletes every submission for one examinee id: rows first, then the
/// resolved folder trees. A crash mid-way leaves an orphaned folder that a
/// re-run removes, never a dangling database reference.
pub(crate) async fn delete_examinee(state: &AppState, examinee_id: &str) -> Result<ExamineePurge> {
    state.timers().cancel_for_examinee(examinee_id).await;

    let names = state
        .storage()
        .resolve_examinee_names(examinee_id)
        .await
        .context("Failed to scan storage root")?;

    let rows_deleted = repositories::submissions::delete_by_examinee(state.db(), examinee_id)
        .await
        .context("Failed to delete submission rows")?;

    if names.is_empty() {
        tracing::warn!(
            examinee_id = %examinee_id,
            rows_deleted,
            "No examinee folder resolved, skipping filesystem deletion"
        );
        return Ok(ExamineePurge { rows_deleted, folders_removed: 0 });
    }

    let mut folders_removed = 0usize;
    for name in &names {
        if state
            .storage()
            .delete_examinee_tree(name, examinee_id)
            .await
            .context("Failed to delete examinee folder")?
        {
            folders_removed += 1;
        }
    }

    tracing::info!(
        examinee_id = %examinee_id,
        rows_deleted,
        folders_removed,
        "Examinee submissions purged"
    );
    Ok(ExamineePurge { rows_deleted, folders_removed })
}

/// Deletes every submission row, then every examinee tree. The protected
/// asset folders stay.
pub(crate) async fn delete_all(state: &AppState) -> Result<PurgeAll> {
    state.timers().cancel_all().await;

    let rows_deleted = repositories::submissions::delete_all(state.db())
        .await
        .context("Failed to delete submission rows")?;
    let folders_removed = state
        .storage()
        .delete_all_examinee_trees()
        .await
        .context("Failed to delete examinee folders")?;

    tracing::info!(rows_deleted, folders_removed, "All submissions purged");
    Ok(PurgeAll { rows_deleted, folders_removed })
}
