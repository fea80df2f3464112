//! Core types, configuration and dashboard derivations for salesdesk
//!
//! Everything in this crate is synchronous and side-effect free apart from
//! configuration loading and logging setup. The HTTP flows live in
//! `salesdesk-client`.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]
#![allow(clippy::cast_precision_loss)]

pub mod activity;
pub mod config;
pub mod error;
pub mod lead;
pub mod metrics;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use activity::{ActivityBoard, ActivityItem, LeadActivities};
pub use config::Config;
pub use error::{Error, Result};
pub use lead::{LeadRecord, LeadStatus, Page, StatusTally};
pub use metrics::{DashboardMetrics, DashboardSummary, LeadScans};
pub use types::{BrandTheme, DashboardKind, DateRange, Project, ProjectId, Role, Scope, Session, User};

/// Install the global tracing subscriber, writing to stderr
///
/// `RUST_LOG` wins over `level`. `format` is `json` or anything else for the
/// human-readable layer.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(level: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    installed.map_err(|e| Error::Logging(e.to_string()))
}
