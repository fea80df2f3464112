//! HTTP client for the CRM backend

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder};
use salesdesk_core::config::ApiConfig;
use salesdesk_core::{
    DashboardKind, DashboardMetrics, DateRange, LeadActivities, LeadRecord, Page, ProjectId,
    Scope, Session,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, instrument};

/// Endpoint paths, relative to the configured base URL
pub mod paths {
    /// Password login
    pub const LOGIN: &str = "/accounts/login/";
    /// Send a one-time code
    pub const OTP_START: &str = "/accounts/login/otp/start/";
    /// Exchange a one-time code for a session
    pub const OTP_VERIFY: &str = "/accounts/login/otp/verify/";
    /// Permitted projects
    pub const MY_SCOPE: &str = "/client/my-scope/";
    /// Paginated lead list
    pub const SALES_LEADS: &str = "/sales/sales-leads/";
    /// Upcoming activities per lead
    pub const UPCOMING_ACTIVITY: &str = "/sales/upcoming-activity/";
}

/// Operations the flows need from the backend
///
/// Implemented over HTTP by [`ApiClient`] and in memory by the scripted mock
/// used in tests.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Install or drop the bearer token sent with authenticated calls
    fn set_token(&self, token: Option<String>);

    /// Exchange username and password for a session
    async fn login(&self, username: &str, password: &str) -> ApiResult<Session>;

    /// Send a one-time code to an email address
    async fn start_otp(&self, email: &str) -> ApiResult<()>;

    /// Exchange email and one-time code for a session
    async fn verify_otp(&self, email: &str, otp: &str) -> ApiResult<Session>;

    /// Fetch the projects the current identity may see
    async fn my_scope(&self, include_units: bool) -> ApiResult<Scope>;

    /// Fetch role-specific dashboard metrics; `None` for an empty body
    async fn dashboard(
        &self,
        kind: DashboardKind,
        query: &DashboardQuery,
    ) -> ApiResult<Option<DashboardMetrics>>;

    /// Fetch one page of the lead list (1-based)
    async fn sales_leads(&self, page: u32) -> ApiResult<Page<LeadRecord>>;

    /// Fetch upcoming activities for a project
    async fn upcoming_activities(&self, query: &ActivityQuery) -> ApiResult<Vec<LeadActivities>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Query parameters for the dashboard endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardQuery {
    /// Comma-joined project ids; `None` means all projects
    pub projects: Option<String>,
    /// `from_date`
    pub from_date: Option<NaiveDate>,
    /// `to_date`
    pub to_date: Option<NaiveDate>,
}

impl DashboardQuery {
    /// Build the query for a project selection and date window
    ///
    /// `projects` is sent only for a non-empty selection smaller than the
    /// full project list.
    pub fn new(all: &[ProjectId], selected: &[ProjectId], range: DateRange) -> Self {
        let partial = !selected.is_empty() && selected.len() != all.len();
        let projects = partial.then(|| {
            selected
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        });

        Self {
            projects,
            from_date: range.from,
            to_date: range.to,
        }
    }

    /// Parameters in request order
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(projects) = &self.projects {
            params.push(("projects", projects.clone()));
        }
        if let Some(from) = self.from_date {
            params.push(("from_date", from.to_string()));
        }
        if let Some(to) = self.to_date {
            params.push(("to_date", to.to_string()));
        }
        params
    }
}

/// Query parameters for the upcoming activities endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityQuery {
    /// Active project id
    pub project_id: String,
    /// Optional date window
    pub range: DateRange,
}

impl ActivityQuery {
    /// Parameters in request order
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("project_id", self.project_id.clone())];
        if let Some(from) = self.range.from {
            params.push(("date_from", from.to_string()));
        }
        if let Some(to) = self.range.to {
            params.push(("date_to", to.to_string()));
        }
        params
    }
}

/// API client for the CRM backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    /// Create a client with the configured base URL and timeouts
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Set the bearer token for authenticated calls
    #[must_use]
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.set_token(Some(token.into()));
        self
    }

    /// Base URL every path is joined onto
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Dashboard endpoint path for a dashboard family
    pub const fn dashboard_path(kind: DashboardKind) -> &'static str {
        kind.path()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn current_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn authorized(&self, request: RequestBuilder) -> ApiResult<RequestBuilder> {
        self.current_token()
            .map(|token| request.bearer_auth(token))
            .ok_or(ApiError::Unauthenticated)
    }

    /// Send a request and decode the body; an empty body decodes as `null`
    async fn send<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> ApiResult<T> {
        let body = self.send_raw(path, request).await?;
        serde_json::from_value(body).map_err(|e| ApiError::decode(path, e))
    }

    async fn send_raw(&self, path: &str, request: RequestBuilder) -> ApiResult<Value> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        let body = if bytes.is_empty() {
            Value::Null
        } else if status.is_success() {
            serde_json::from_slice(&bytes).map_err(|e| ApiError::decode(path, e))?
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        if !status.is_success() {
            let detail = body
                .get("detail")
                .and_then(Value::as_str)
                .map(ToString::to_string);
            debug!(path, status = status.as_u16(), ?detail, "Backend returned error status");
            return Err(ApiError::status(status.as_u16(), detail));
        }

        Ok(body)
    }
}

#[async_trait]
impl Backend for ApiClient {
    fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    #[instrument(skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> ApiResult<Session> {
        let request = self
            .client
            .post(self.url(paths::LOGIN))
            .json(&json!({ "username": username, "password": password }));
        self.send(paths::LOGIN, request).await
    }

    #[instrument(skip(self))]
    async fn start_otp(&self, email: &str) -> ApiResult<()> {
        let request = self
            .client
            .post(self.url(paths::OTP_START))
            .json(&json!({ "email": email }));
        self.send_raw(paths::OTP_START, request).await.map(|_| ())
    }

    #[instrument(skip(self, otp))]
    async fn verify_otp(&self, email: &str, otp: &str) -> ApiResult<Session> {
        let request = self
            .client
            .post(self.url(paths::OTP_VERIFY))
            .json(&json!({ "email": email, "otp": otp }));
        self.send(paths::OTP_VERIFY, request).await
    }

    #[instrument(skip(self))]
    async fn my_scope(&self, include_units: bool) -> ApiResult<Scope> {
        let mut request = self.client.get(self.url(paths::MY_SCOPE));
        if include_units {
            request = request.query(&[("include_units", "true")]);
        }
        let request = self.authorized(request)?;
        let scope: Option<Scope> = self.send(paths::MY_SCOPE, request).await?;
        Ok(scope.unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn dashboard(
        &self,
        kind: DashboardKind,
        query: &DashboardQuery,
    ) -> ApiResult<Option<DashboardMetrics>> {
        let path = Self::dashboard_path(kind);
        let request = self.client.get(self.url(path)).query(&query.params());
        let request = self.authorized(request)?;
        let body = self.send_raw(path, request).await?;
        DashboardMetrics::from_response(body).map_err(|e| ApiError::decode(path, e))
    }

    #[instrument(skip(self))]
    async fn sales_leads(&self, page: u32) -> ApiResult<Page<LeadRecord>> {
        let request = self
            .client
            .get(self.url(paths::SALES_LEADS))
            .query(&[("page", page)]);
        let request = self.authorized(request)?;
        let page: Option<Page<LeadRecord>> = self.send(paths::SALES_LEADS, request).await?;
        Ok(page.unwrap_or(Page {
            results: Vec::new(),
            next: None,
            count: None,
        }))
    }

    #[instrument(skip(self))]
    async fn upcoming_activities(&self, query: &ActivityQuery) -> ApiResult<Vec<LeadActivities>> {
        let request = self
            .client
            .get(self.url(paths::UPCOMING_ACTIVITY))
            .query(&query.params());
        let request = self.authorized(request)?;
        let leads: Option<Vec<LeadActivities>> =
            self.send(paths::UPCOMING_ACTIVITY, request).await?;
        Ok(leads.unwrap_or_default())
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_dashboard_query_omits_projects_for_all_or_none() {
        let all = [1, 2, 3];

        assert_eq!(DashboardQuery::new(&all, &[], DateRange::default()).projects, None);
        assert_eq!(DashboardQuery::new(&all, &[3, 1, 2], DateRange::default()).projects, None);
        assert_eq!(
            DashboardQuery::new(&all, &[3, 1], DateRange::default()).projects.as_deref(),
            Some("3,1")
        );
    }

    #[test]
    fn test_dashboard_query_params() {
        let query = DashboardQuery::new(&[1, 2], &[2], DateRange::new(date(2024, 1, 1), None));
        assert_eq!(
            query.params(),
            vec![
                ("projects", "2".to_string()),
                ("from_date", "2024-01-01".to_string())
            ]
        );

        assert!(DashboardQuery::default().params().is_empty());
    }

    #[test]
    fn test_activity_query_params() {
        let query = ActivityQuery {
            project_id: "7".to_string(),
            range: DateRange::new(None, date(2024, 2, 29)),
        };
        assert_eq!(
            query.params(),
            vec![
                ("project_id", "7".to_string()),
                ("date_to", "2024-02-29".to_string())
            ]
        );
    }

    #[test]
    fn test_client_trims_base_url_and_tracks_token() {
        let config = ApiConfig {
            base_url: "https://crm.example.com/api/".to_string(),
            ..ApiConfig::default()
        };
        let client = ApiClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "https://crm.example.com/api");
        assert_eq!(client.url(paths::LOGIN), "https://crm.example.com/api/accounts/login/");

        assert!(client.current_token().is_none());
        let client = client.with_token("tok");
        assert_eq!(client.current_token().as_deref(), Some("tok"));
        client.set_token(None);
        assert!(client.current_token().is_none());
    }
}
