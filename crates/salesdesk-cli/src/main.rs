//! salesdesk command line client
//!
//! Logs in against the CRM backend, keeps the session on disk and renders the
//! dashboard and upcoming activities as text or JSON.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use salesdesk_client::activities::{load_activities, load_project_activities};
use salesdesk_client::dashboard::SCOPE_LOAD_FAILED;
use salesdesk_client::{
    ApiClient, Backend, DashboardController, DashboardView, FileStore, LoginFlow, LoginMode,
    SessionStoreExt, resume_session,
};
use salesdesk_core::types::keys;
use salesdesk_core::utils::format_inr;
use salesdesk_core::{ActivityBoard, Config, DateRange, LeadScans, ProjectId, Session};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// Command line interface for the salesdesk CRM client
#[derive(Parser)]
#[command(
    name = "salesdesk",
    version = env!("CARGO_PKG_VERSION"),
    about = "Command line client for the real-estate CRM backend"
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log format (json, pretty); overrides the config file
    #[arg(long)]
    log_format: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Log in with a password or a one-time code
    Login {
        /// Username, or email address for one-time codes
        identifier: String,

        /// Password
        #[arg(long, env = "SALESDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Log in with a one-time code instead of a password
        #[arg(long, requires = "code")]
        otp: bool,

        /// One-time code received by email
        #[arg(long)]
        code: Option<String>,

        /// Path originally requested before being asked to log in
        #[arg(long, value_name = "PATH")]
        next: Option<String>,
    },

    /// Send a one-time code to an email address
    SendCode {
        /// Email address
        email: String,
    },

    /// Forget the stored session
    Logout,

    /// Show the stored session
    Whoami,

    /// List the projects the session may see
    Scope {
        /// Include unit details
        #[arg(long)]
        units: bool,
    },

    /// Bind the activities view to a project
    UseProject {
        /// Project id
        project: String,
    },

    /// Show dashboard analytics
    Dashboard {
        /// Restrict to these projects (repeatable)
        #[arg(short, long = "project", value_name = "ID")]
        projects: Vec<ProjectId>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show upcoming activities
    Activities {
        /// Project id; defaults to the active project
        #[arg(short, long)]
        project: Option<String>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Inspect configuration
    Config {
        /// Show resolved configuration
        #[arg(short, long)]
        show: bool,

        /// Validate configuration
        #[arg(short, long)]
        validate: bool,
    },
}

/// Main entry point
///
/// # Errors
///
/// Returns error if configuration, the backend or the session store fails
#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&cli, &config)?;

    let store = Arc::new(FileStore::new(&config.session.store_dir));
    let client = ApiClient::new(&config.api).context("Failed to build HTTP client")?;
    resume_session(&client, store.as_ref()).context("Failed to read stored session")?;
    let client = Arc::new(client);

    match cli.command {
        Commands::Login {
            identifier,
            password,
            otp,
            code,
            next,
        } => {
            let flow = LoginFlow::new(client, store)
                .with_default_destination(config.navigation.default_destination.clone());
            login(&flow, identifier, password, otp.then_some(code).flatten(), next).await
        }
        Commands::SendCode { email } => {
            let flow = LoginFlow::new(client, store);
            flow.switch_mode(LoginMode::OneTimeCode);
            flow.set_identifier(email.as_str());
            flow.send_code().await?;
            println!("Code sent to {email}");
            Ok(())
        }
        Commands::Logout => {
            LoginFlow::new(client, store).logout()?;
            println!("Logged out");
            Ok(())
        }
        Commands::Whoami => whoami(store.as_ref()),
        Commands::Scope { units } => show_scope(client.as_ref(), store.as_ref(), units).await,
        Commands::UseProject { project } => {
            store.set_active_project(&project)?;
            println!("Active project set to {project}");
            Ok(())
        }
        Commands::Dashboard {
            projects,
            from,
            to,
            json,
        } => {
            let session = require_session(store.as_ref())?;
            let dashboard = DashboardController::new(client, store, session.role().clone())
                .with_max_pages(config.pagination.max_pages);
            let view = load_dashboard(&dashboard, &projects, DateRange::new(from, to)).await?;
            if json {
                print_json(&view)
            } else {
                print_dashboard(&view);
                Ok(())
            }
        }
        Commands::Activities {
            project,
            from,
            to,
            json,
        } => {
            require_session(store.as_ref())?;
            let range = DateRange::new(from, to);
            let board = match project {
                Some(project) => load_project_activities(client.as_ref(), &project, range).await?,
                None => load_activities(client.as_ref(), store.as_ref(), range).await?,
            };
            if json {
                print_json(&board)
            } else {
                print_activities(&board);
                Ok(())
            }
        }
        Commands::Config { show, validate } => handle_config_command(&config, show, validate),
    }
}

/// Load configuration from file or the default search path
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("Failed to load config file {}", path.display())),
        None => Config::load().context("Failed to load configuration"),
    }
}

/// Initialize logging system
fn init_logging(cli: &Cli, config: &Config) -> Result<()> {
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let format = cli.log_format.as_deref().unwrap_or(&config.logging.format);

    salesdesk_core::init_logging(level, format)?;

    info!(version = env!("CARGO_PKG_VERSION"), log_level = level, "salesdesk starting");
    Ok(())
}

fn require_session(store: &FileStore) -> Result<Session> {
    match store.session()? {
        Some(session) => Ok(session),
        None => bail!("Not logged in. Run `salesdesk login` first."),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn login(
    flow: &LoginFlow<ApiClient, FileStore>,
    identifier: String,
    password: Option<String>,
    code: Option<String>,
    next: Option<String>,
) -> Result<()> {
    flow.open();
    if let Some(next) = next {
        flow.record_requested_path(next);
    }
    if let Some(code) = code {
        flow.switch_mode(LoginMode::OneTimeCode);
        flow.set_code(code);
    } else {
        flow.set_secret(password.unwrap_or_default());
    }
    flow.set_identifier(identifier);

    let outcome = flow.submit().await?;
    let user = &outcome.session.user;
    println!(
        "Logged in as {} ({})",
        user.username.as_deref().or(user.email.as_deref()).unwrap_or("unknown"),
        outcome.session.role()
    );
    match &outcome.scope {
        Some(scope) => println!("Projects in scope: {}", scope.projects.len()),
        None => println!("Project scope unavailable; the dashboard will retry"),
    }
    println!("Next: {}", outcome.destination);
    Ok(())
}

fn whoami(store: &FileStore) -> Result<()> {
    let session = require_session(store)?;
    let user = &session.user;
    println!("User:     {}", user.username.as_deref().unwrap_or("-"));
    println!("Email:    {}", user.email.as_deref().unwrap_or("-"));
    println!("Role:     {}", session.role());
    println!("Company:  {}", store.brand_theme()?.display_name());
    println!(
        "Project:  {}",
        store.active_project()?.as_deref().unwrap_or("none selected")
    );
    Ok(())
}

async fn show_scope(client: &ApiClient, store: &FileStore, units: bool) -> Result<()> {
    require_session(store)?;
    let scope = client
        .my_scope(units)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message(SCOPE_LOAD_FAILED)))?;
    store.set(keys::SCOPE, &scope)?;

    if scope.projects.is_empty() {
        println!("No projects");
    }
    for project in &scope.projects {
        println!("{:>6}  {}", project.id, project.name);
    }
    Ok(())
}

async fn load_dashboard(
    dashboard: &DashboardController<ApiClient, FileStore>,
    projects: &[ProjectId],
    range: DateRange,
) -> Result<DashboardView> {
    dashboard.load_scope().await?;
    if !projects.is_empty() {
        let in_scope = dashboard.select_projects(projects);
        check_project_filter(projects, in_scope)?;
    }
    dashboard.set_date_range(range);

    let scans = async {
        tokio::select! {
            scans = dashboard.load_scans() => scans,
            _ = signal::ctrl_c() => {
                warn!("Interrupted; lead scans skipped");
                dashboard.cancel_scans();
                LeadScans::default()
            }
        }
    };
    let (metrics, _) = tokio::join!(dashboard.load_metrics(), scans);
    metrics?;

    Ok(dashboard.view())
}

/// Reject a project filter that matched nothing, warn when it matched only part
fn check_project_filter(requested: &[ProjectId], in_scope: usize) -> Result<()> {
    if in_scope == 0 {
        let ids: Vec<String> = requested.iter().map(ToString::to_string).collect();
        bail!("None of the requested projects are in scope: {}", ids.join(", "));
    }
    if in_scope < requested.len() {
        warn!(
            requested = requested.len(),
            in_scope, "Some requested projects are outside the scope and were ignored"
        );
    }
    Ok(())
}

fn print_dashboard(view: &DashboardView) {
    println!(
        "Dashboard ({}) | {} ({} of {}) | {}",
        view.role, view.projects_label, view.selected_projects, view.total_projects, view.date_label
    );

    let Some(summary) = &view.summary else {
        println!("No analytics available");
        return;
    };

    println!();
    println!("Total leads        {}", summary.total_leads);
    println!("New leads          {} ({})", summary.new_leads, summary.new_leads_caption);
    println!("Channel partners   {}", summary.channel_partners);
    println!("Lead quality       {}%", summary.lead_quality);

    println!();
    println!("Lead status");
    for share in &summary.status_breakdown {
        println!(
            "  {:<6} {:>6}  {:>3}%",
            share.status.to_string(),
            share.count,
            share.percent
        );
    }

    if !summary.lead_sources.is_empty() {
        println!();
        println!("Lead sources");
        for source in &summary.lead_sources {
            println!("  {:<24} {:>6}  {:>5.1}%", source.name, source.count, source.width_percent);
        }
    }

    println!();
    println!("Tasks ({} total)", summary.total_tasks);
    println!("  Completed  {}", summary.tasks.completed);
    println!("  Upcoming   {}", summary.tasks.upcoming);
    println!("  Due today  {}", summary.tasks.due_today);
    println!("  Overdue    {}", summary.tasks.overdue);

    println!();
    println!("Pipeline");
    for stage in &summary.pipeline {
        println!("  {:<24} {:>6}  {:>6.1}%", stage.name, stage.count, stage.width_percent);
    }

    let bookings = &summary.bookings;
    println!();
    println!("Bookings           {}", bookings.bookings);
    println!("Agreement value    Rs {}", format_inr(bookings.agreement_value));
    println!("Cost sheets        {}", bookings.cost_sheets);
    println!("KYC pending        {}", bookings.kyc_pending);
}

fn print_activities(board: &ActivityBoard) {
    println!("{}", board.summary());

    for lead in &board.scheduled {
        println!();
        println!("{} | {}", lead.display_name(), lead.project_label());
        for item in &lead.items {
            println!(
                "  - {:<12} {} {:>8}  {}  {}",
                item.kind_label(),
                item.date_label(),
                item.time_label(),
                item.status.as_deref().unwrap_or("-"),
                item.title.as_deref().unwrap_or_default()
            );
        }
    }

    if !board.idle.is_empty() {
        println!();
        println!("Leads with nothing scheduled: {}", board.idle.len());
    }
}

/// Handle configuration commands
fn handle_config_command(config: &Config, show: bool, validate: bool) -> Result<()> {
    if validate {
        config.check()?;
        println!("Configuration is valid");
    }

    if show {
        let rendered =
            toml::to_string_pretty(config).context("Failed to serialize configuration")?;
        println!("{rendered}");
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_dashboard_args() {
        let cli = Cli::try_parse_from([
            "salesdesk", "dashboard", "-p", "3", "--project", "5", "--from", "2024-01-01", "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Dashboard {
                projects,
                from,
                to,
                json,
            } => {
                assert_eq!(projects, vec![3, 5]);
                assert_eq!(from, NaiveDate::from_ymd_opt(2024, 1, 1));
                assert_eq!(to, None);
                assert!(json);
            }
            _ => panic!("expected dashboard command"),
        }
    }

    #[test]
    fn test_otp_login_requires_code() {
        assert!(Cli::try_parse_from(["salesdesk", "login", "a@b.test", "--otp"]).is_err());
        assert!(
            Cli::try_parse_from(["salesdesk", "login", "a@b.test", "--otp", "--code", "123456"])
                .is_ok()
        );
    }

    #[test]
    fn test_project_filter_outside_scope_is_rejected() {
        let err = check_project_filter(&[99, 100], 0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "None of the requested projects are in scope: 99, 100"
        );

        assert!(check_project_filter(&[1, 99], 1).is_ok());
        assert!(check_project_filter(&[1, 2], 2).is_ok());
    }

    #[test]
    fn test_bad_date_is_rejected() {
        assert!(Cli::try_parse_from(["salesdesk", "activities", "--from", "01/02/2024"]).is_err());
    }
}
