//! Backend client and session flows for salesdesk
//!
//! This crate talks to the CRM backend over HTTP and drives the stateful
//! flows on top of it: login with post-login scope fetch, the dashboard load
//! state machine with its client-side lead aggregation, and the upcoming
//! activities view. Every flow is generic over [`Backend`] and
//! [`SessionStore`] so it can be exercised without a network.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    missing_docs
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::struct_excessive_bools,
    clippy::significant_drop_tightening,
    clippy::unused_async,
    clippy::return_self_not_must_use
)]

pub mod activities;
pub mod api;
pub mod dashboard;
pub mod error;
pub mod login;
pub mod pagination;
pub mod store;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use activities::{ActivitiesError, load_activities, load_project_activities};
pub use api::{ActivityQuery, ApiClient, Backend, DashboardQuery};
pub use dashboard::{
    DashboardController, DashboardError, DashboardState, DashboardView, LoadOutcome, LoadPhase,
};
pub use error::{ApiError, ApiResult, StoreError, StoreResult};
pub use login::{LoginError, LoginFlow, LoginForm, LoginMode, LoginOutcome, resume_session};
pub use pagination::{WalkError, WalkOptions};
pub use store::{FileStore, MemoryStore, SessionStore, SessionStoreExt};
