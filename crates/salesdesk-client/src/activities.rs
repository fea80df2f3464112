//! Upcoming activities for the active project

use crate::api::{ActivityQuery, Backend};
use crate::error::StoreError;
use crate::store::{SessionStore, SessionStoreExt};
use salesdesk_core::activity::{LOAD_FAILED, NO_ACTIVE_PROJECT};
use salesdesk_core::{ActivityBoard, DateRange};
use thiserror::Error;
use tracing::{info, warn};

/// Why the activities view has nothing to show
#[derive(Error, Debug)]
pub enum ActivitiesError {
    /// No project bound to the view; nothing was requested
    #[error("{}", NO_ACTIVE_PROJECT)]
    NoActiveProject,

    /// The request failed
    #[error("{}", LOAD_FAILED)]
    LoadFailed,

    /// The active project could not be read
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Load activities for the project stored under `ACTIVE_PROJECT_ID`
///
/// # Errors
///
/// Returns [`ActivitiesError::NoActiveProject`] without a request when no
/// project is stored, or [`ActivitiesError::LoadFailed`] when the fetch fails.
pub async fn load_activities<B, S>(
    backend: &B,
    store: &S,
    range: DateRange,
) -> Result<ActivityBoard, ActivitiesError>
where
    B: Backend + ?Sized,
    S: SessionStore + ?Sized,
{
    let project_id = store
        .active_project()?
        .ok_or(ActivitiesError::NoActiveProject)?;
    load_project_activities(backend, &project_id, range).await
}

/// Load activities for an explicit project
///
/// # Errors
///
/// Returns [`ActivitiesError::NoActiveProject`] for a blank id, or
/// [`ActivitiesError::LoadFailed`] when the fetch fails.
pub async fn load_project_activities<B: Backend + ?Sized>(
    backend: &B,
    project_id: &str,
    range: DateRange,
) -> Result<ActivityBoard, ActivitiesError> {
    let project_id = project_id.trim();
    if project_id.is_empty() {
        return Err(ActivitiesError::NoActiveProject);
    }

    let query = ActivityQuery {
        project_id: project_id.to_string(),
        range,
    };
    let leads = backend.upcoming_activities(&query).await.map_err(|e| {
        warn!(error = %e, project_id, "Failed to load upcoming activities");
        ActivitiesError::LoadFailed
    })?;

    let board = ActivityBoard::split(leads);
    info!(
        project_id,
        leads = board.scheduled.len() + board.idle.len(),
        activities = board.activity_count(),
        "Upcoming activities loaded"
    );
    Ok(board)
}
