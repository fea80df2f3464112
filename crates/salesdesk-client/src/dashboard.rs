//! Dashboard load state machine
//!
//! Loading goes `Idle -> LoadingScope -> ScopeReady | ScopeError`, then
//! `LoadingMetrics -> MetricsReady | MetricsError` each time the filters or
//! the role change. Every metrics request is numbered; a response that is no
//! longer the latest is dropped instead of overwriting newer data.

use crate::api::{Backend, DashboardQuery};
use crate::pagination::{WalkOptions, count_channel_partners, tally_lead_status};
use crate::store::{SessionStore, SessionStoreExt};
use salesdesk_core::types::keys;
use salesdesk_core::utils::{projects_label, selected_projects_count};
use salesdesk_core::{
    DashboardMetrics, DashboardSummary, DateRange, LeadScans, Project, ProjectId, Role,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shown when the scope fetch fails without a backend message
pub const SCOPE_LOAD_FAILED: &str = "Unable to load project scope. Please try again.";

/// Shown when the metrics fetch fails without a backend message
pub const METRICS_LOAD_FAILED: &str = "Unable to load dashboard analytics. Please try again.";

/// Where the dashboard is in its load cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPhase {
    /// Nothing requested yet
    #[default]
    Idle,
    /// Scope request in flight
    LoadingScope,
    /// Projects known
    ScopeReady,
    /// Scope request failed
    ScopeError,
    /// Metrics request in flight
    LoadingMetrics,
    /// Latest metrics applied
    MetricsReady,
    /// Latest metrics request failed
    MetricsError,
}

/// Inline dashboard failures; the message is ready to display
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    /// Scope fetch failed
    #[error("{0}")]
    Scope(String),

    /// Metrics fetch failed
    #[error("{0}")]
    Metrics(String),
}

/// What happened to a metrics response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Response became the current metrics
    Applied,
    /// A newer request was issued meanwhile; response dropped
    Stale,
}

/// Mutable dashboard state
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    /// Load phase
    pub phase: LoadPhase,
    /// Role deciding the endpoint and partner counting
    pub role: Role,
    /// Projects from the last scope fetch
    pub projects: Vec<Project>,
    /// Selected project ids; empty means all
    pub selected: Vec<ProjectId>,
    /// Date filter
    pub range: DateRange,
    /// Latest applied metrics
    pub metrics: Option<DashboardMetrics>,
    /// Latest lead list scans
    pub scans: LeadScans,
    /// Scope failure message
    pub scope_error: Option<String>,
    /// Metrics failure message
    pub metrics_error: Option<String>,
}

impl DashboardState {
    fn query(&self) -> DashboardQuery {
        let all: Vec<ProjectId> = self.projects.iter().map(|p| p.id).collect();
        DashboardQuery::new(&all, &self.selected, self.range)
    }
}

/// Display-ready dashboard snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    /// Load phase
    pub phase: LoadPhase,
    /// Role
    pub role: Role,
    /// Project filter label
    pub projects_label: String,
    /// Date filter label
    pub date_label: String,
    /// Number of projects shown
    pub selected_projects: usize,
    /// Number of permitted projects
    pub total_projects: usize,
    /// Scope failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_error: Option<String>,
    /// Metrics failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_error: Option<String>,
    /// Derived values, once metrics have loaded
    pub summary: Option<DashboardSummary>,
}

/// Drives scope, metrics and lead scans for one dashboard
pub struct DashboardController<B: ?Sized, S: ?Sized> {
    backend: Arc<B>,
    store: Arc<S>,
    max_pages: u32,
    state: Mutex<DashboardState>,
    generation: AtomicU64,
    scans_cancel: Mutex<CancellationToken>,
}

impl<B: ?Sized, S: ?Sized> std::fmt::Debug for DashboardController<B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardController")
            .field("max_pages", &self.max_pages)
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B, S> DashboardController<B, S>
where
    B: Backend + ?Sized,
    S: SessionStore + ?Sized,
{
    /// Create an idle dashboard for `role`
    pub fn new(backend: Arc<B>, store: Arc<S>, role: Role) -> Self {
        Self {
            backend,
            store,
            max_pages: WalkOptions::default().max_pages,
            state: Mutex::new(DashboardState {
                role,
                ..DashboardState::default()
            }),
            generation: AtomicU64::new(0),
            scans_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Bound the lead list scans
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    fn state_mut(&self) -> MutexGuard<'_, DashboardState> {
        lock(&self.state)
    }

    /// Snapshot of the current state
    pub fn state(&self) -> DashboardState {
        self.state_mut().clone()
    }

    /// Current load phase
    pub fn phase(&self) -> LoadPhase {
        self.state_mut().phase
    }

    /// Fetch the permitted projects and select all of them
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Scope`] carrying the backend `detail` when
    /// present, otherwise [`SCOPE_LOAD_FAILED`].
    pub async fn load_scope(&self) -> Result<usize, DashboardError> {
        {
            let mut state = self.state_mut();
            state.phase = LoadPhase::LoadingScope;
            state.scope_error = None;
        }

        match self.backend.my_scope(false).await {
            Ok(scope) => {
                if let Err(e) = self.store.set(keys::SCOPE, &scope) {
                    warn!(error = %e, "Failed to persist scope");
                }

                let count = scope.projects.len();
                let mut state = self.state_mut();
                state.selected = scope.project_ids();
                state.projects = scope.projects;
                state.phase = LoadPhase::ScopeReady;
                info!(projects = count, "Project scope loaded");
                Ok(count)
            }
            Err(e) => {
                let message = e.user_message(SCOPE_LOAD_FAILED);
                warn!(error = %e, "Failed to load project scope");
                let mut state = self.state_mut();
                state.phase = LoadPhase::ScopeError;
                state.scope_error = Some(message.clone());
                Err(DashboardError::Scope(message))
            }
        }
    }

    /// Fetch metrics for the current filters and role
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Metrics`] carrying the backend `detail` when
    /// present, otherwise [`METRICS_LOAD_FAILED`]. A failure for a request
    /// that has since been superseded is reported as [`LoadOutcome::Stale`].
    pub async fn load_metrics(&self) -> Result<LoadOutcome, DashboardError> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let (kind, query) = {
            let mut state = self.state_mut();
            state.phase = LoadPhase::LoadingMetrics;
            state.metrics_error = None;
            (state.role.dashboard(), state.query())
        };
        debug!(generation, endpoint = kind.path(), ?query, "Requesting dashboard metrics");

        let result = self.backend.dashboard(kind, &query).await;

        let mut state = self.state_mut();
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(generation, "Discarding stale dashboard response");
            return Ok(LoadOutcome::Stale);
        }

        match result {
            Ok(metrics) => {
                state.metrics = metrics;
                state.phase = LoadPhase::MetricsReady;
                info!(generation, "Dashboard metrics loaded");
                Ok(LoadOutcome::Applied)
            }
            Err(e) => {
                let message = e.user_message(METRICS_LOAD_FAILED);
                warn!(error = %e, status = ?e.status_code(), "Failed to load dashboard metrics");
                state.phase = LoadPhase::MetricsError;
                state.metrics_error = Some(message.clone());
                Err(DashboardError::Metrics(message))
            }
        }
    }

    /// Walk the lead list for status counts and, for roles that scan, partners
    ///
    /// Both scans fail closed to zero.
    pub async fn load_scans(&self) -> LeadScans {
        let (role, cancel) = {
            let role = self.state_mut().role.clone();
            (role, lock(&self.scans_cancel).child_token())
        };
        let options = WalkOptions::new(self.max_pages).with_cancel(cancel.clone());

        let status = tally_lead_status(self.backend.as_ref(), &options).await;
        let partners = if role.scans_partner_leads() {
            count_channel_partners(self.backend.as_ref(), &options).await
        } else {
            0
        };

        let scans = LeadScans { status, partners };
        let mut state = self.state_mut();
        if cancel.is_cancelled() {
            debug!("Lead scans cancelled; result not applied");
        } else {
            state.scans = scans;
        }
        drop(state);
        scans
    }

    /// Cancel lead scans in flight; later scans start fresh
    pub fn cancel_scans(&self) {
        let mut cancel = lock(&self.scans_cancel);
        cancel.cancel();
        *cancel = CancellationToken::new();
    }

    /// Scope, then metrics and scans when the scope loaded
    ///
    /// # Errors
    ///
    /// Returns the scope or metrics failure; scans never fail.
    pub async fn refresh(&self) -> Result<LoadOutcome, DashboardError> {
        self.load_scope().await?;
        let (outcome, _) = tokio::join!(self.load_metrics(), self.load_scans());
        outcome
    }

    /// Flip one project in or out of the selection; returns whether it is now selected
    pub fn toggle_project(&self, id: ProjectId) -> bool {
        let mut state = self.state_mut();
        if let Some(pos) = state.selected.iter().position(|&p| p == id) {
            state.selected.remove(pos);
            false
        } else {
            state.selected.push(id);
            true
        }
    }

    /// Select every permitted project
    pub fn select_all(&self) {
        let mut state = self.state_mut();
        state.selected = state.projects.iter().map(|p| p.id).collect();
    }

    /// Clear the selection; the backend then reports on all projects
    pub fn clear_selection(&self) {
        self.state_mut().selected.clear();
    }

    /// Restrict the selection to `ids`, ignoring ids outside the scope
    ///
    /// Returns how many of the ids were in scope.
    pub fn select_projects(&self, ids: &[ProjectId]) -> usize {
        let mut state = self.state_mut();
        state.selected = state
            .projects
            .iter()
            .map(|p| p.id)
            .filter(|id| ids.contains(id))
            .collect();
        state.selected.len()
    }

    /// Replace the date filter
    pub fn set_date_range(&self, range: DateRange) {
        self.state_mut().range = range;
    }

    /// Switch role; scans from the previous role, finished or in flight, are discarded
    pub fn set_role(&self, role: Role) {
        if self.state_mut().role == role {
            return;
        }
        self.cancel_scans();

        let mut state = self.state_mut();
        state.role = role;
        state.scans = LeadScans::default();
    }

    /// Derived values for the latest metrics, recomputed on each call
    pub fn summary(&self) -> Option<DashboardSummary> {
        let state = self.state_mut();
        state
            .metrics
            .as_ref()
            .map(|metrics| DashboardSummary::assemble(metrics, &state.role, &state.scans))
    }

    /// Display-ready snapshot
    pub fn view(&self) -> DashboardView {
        let summary = self.summary();
        let state = self.state_mut();
        DashboardView {
            phase: state.phase,
            role: state.role.clone(),
            projects_label: projects_label(&state.projects, &state.selected),
            date_label: state.range.label(),
            selected_projects: selected_projects_count(state.projects.len(), state.selected.len()),
            total_projects: state.projects.len(),
            scope_error: state.scope_error.clone(),
            metrics_error: state.metrics_error.clone(),
            summary,
        }
    }
}
