//! Scripted in-memory backend for testing

use crate::api::{ActivityQuery, Backend, DashboardQuery};
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use salesdesk_core::{
    DashboardKind, DashboardMetrics, LeadActivities, LeadRecord, Page, Scope, Session,
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::sleep;

/// Scripted outcome: a JSON body or an error status with optional `detail`
type Scripted = Result<Value, (u16, Option<String>)>;

/// Calls observed by the mock, in arrival order
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    /// Endpoint names in call order
    pub events: Vec<&'static str>,
    /// Password logins as `(username, password)`
    pub logins: Vec<(String, String)>,
    /// Emails that were sent a code
    pub otp_starts: Vec<String>,
    /// Code verifications as `(email, otp)`
    pub otp_verifies: Vec<(String, String)>,
    /// `include_units` flag per scope fetch
    pub scope_fetches: Vec<bool>,
    /// Dashboard requests
    pub dashboards: Vec<(DashboardKind, DashboardQuery)>,
    /// Lead pages requested
    pub lead_pages: Vec<u32>,
    /// Activity requests
    pub activities: Vec<ActivityQuery>,
    /// Token installed before each authenticated call
    pub tokens: Vec<Option<String>>,
}

/// Mock backend with scripted responses and call tracking
#[derive(Debug, Clone)]
pub struct MockBackend {
    session: Scripted,
    otp_start: Scripted,
    scope: Scripted,
    dashboard_default: Scripted,
    dashboards: Arc<Mutex<VecDeque<(Duration, Scripted)>>>,
    lead_pages: Vec<Value>,
    lead_failure: Option<(u32, u16)>,
    endless_leads: bool,
    lead_delay: Duration,
    activities: Scripted,
    login_delay: Duration,
    token: Arc<Mutex<Option<String>>>,
    calls: Arc<Mutex<CallLog>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn decode<T: DeserializeOwned>(endpoint: &str, scripted: &Scripted) -> ApiResult<T> {
    match scripted {
        Ok(body) => serde_json::from_value(body.clone()).map_err(|e| ApiError::decode(endpoint, e)),
        Err((status, detail)) => Err(ApiError::status(*status, detail.clone())),
    }
}

impl MockBackend {
    /// Create a mock that accepts any login as a `SALES` user
    pub fn new() -> Self {
        Self {
            session: Ok(json!({
                "token": "mock-token",
                "user": {"id": 1, "username": "mock", "role": "SALES"}
            })),
            otp_start: Ok(Value::Null),
            scope: Ok(json!({"projects": []})),
            dashboard_default: Ok(Value::Null),
            dashboards: Arc::new(Mutex::new(VecDeque::new())),
            lead_pages: Vec::new(),
            lead_failure: None,
            endless_leads: false,
            lead_delay: Duration::ZERO,
            activities: Ok(json!([])),
            login_delay: Duration::ZERO,
            token: Arc::new(Mutex::new(None)),
            calls: Arc::new(Mutex::new(CallLog::default())),
        }
    }

    /// Log in as a user with `role`
    pub fn with_role(mut self, role: &str) -> Self {
        self.session = Ok(json!({
            "token": "mock-token",
            "user": {"id": 1, "username": "mock", "role": role}
        }));
        self
    }

    /// Answer both login endpoints with `body`
    pub fn with_session(mut self, body: Value) -> Self {
        self.session = Ok(body);
        self
    }

    /// Reject both login endpoints with `status`
    pub fn with_login_failure(mut self, status: u16) -> Self {
        self.session = Err((status, None));
        self
    }

    /// Hold login responses for `delay`
    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = delay;
        self
    }

    /// Reject code sending with `status`
    pub fn with_otp_start_failure(mut self, status: u16) -> Self {
        self.otp_start = Err((status, None));
        self
    }

    /// Answer scope fetches with `body`
    pub fn with_scope(mut self, body: Value) -> Self {
        self.scope = Ok(body);
        self
    }

    /// Reject scope fetches with `status`
    pub fn with_scope_failure(mut self, status: u16) -> Self {
        self.scope = Err((status, None));
        self
    }

    /// Answer every dashboard request with `body`
    pub fn with_dashboard(mut self, body: Value) -> Self {
        self.dashboard_default = Ok(body);
        self
    }

    /// Reject every dashboard request with `status` and an optional `detail`
    pub fn with_dashboard_failure(mut self, status: u16, detail: Option<&str>) -> Self {
        self.dashboard_default = Err((status, detail.map(ToString::to_string)));
        self
    }

    /// Answer the next dashboard request with `body` after `delay`
    pub fn push_dashboard(&self, delay: Duration, body: Value) {
        lock(&self.dashboards).push_back((delay, Ok(body)));
    }

    /// Append a lead page; every page but the last links to the next one
    pub fn with_lead_page(mut self, results: Value) -> Self {
        self.lead_pages.push(results);
        self
    }

    /// Fail lead page `page` with `status`
    pub fn with_lead_page_failure(mut self, page: u32, status: u16) -> Self {
        self.lead_failure = Some((page, status));
        self
    }

    /// Every lead page links to another, forever
    pub fn with_endless_lead_pages(mut self) -> Self {
        self.endless_leads = true;
        self
    }

    /// Hold every lead page for `delay`
    pub fn with_lead_page_delay(mut self, delay: Duration) -> Self {
        self.lead_delay = delay;
        self
    }

    /// Answer activity requests with `body`
    pub fn with_activities(mut self, body: Value) -> Self {
        self.activities = Ok(body);
        self
    }

    /// Reject activity requests with `status`
    pub fn with_activities_failure(mut self, status: u16) -> Self {
        self.activities = Err((status, None));
        self
    }

    /// Snapshot of the calls made so far
    pub fn calls(&self) -> CallLog {
        lock(&self.calls).clone()
    }

    /// Lead pages requested so far
    pub fn lead_pages_requested(&self) -> Vec<u32> {
        lock(&self.calls).lead_pages.clone()
    }

    /// Token currently installed
    pub fn token(&self) -> Option<String> {
        lock(&self.token).clone()
    }

    fn record(&self, event: &'static str, authenticated: bool, f: impl FnOnce(&mut CallLog)) {
        let token = self.token();
        let mut calls = lock(&self.calls);
        calls.events.push(event);
        if authenticated {
            calls.tokens.push(token);
        }
        f(&mut calls);
    }

    fn lead_page(&self, page: u32) -> ApiResult<Page<LeadRecord>> {
        if let Some((failing, status)) = self.lead_failure
            && failing == page
        {
            return Err(ApiError::status(status, None));
        }

        if self.endless_leads {
            return Ok(Page {
                results: Vec::new(),
                next: Some(format!("/sales/sales-leads/?page={}", page + 1)),
                count: None,
            });
        }

        let index = usize::try_from(page.saturating_sub(1)).unwrap_or(usize::MAX);
        let results = match self.lead_pages.get(index) {
            Some(body) => decode("/sales/sales-leads/", &Ok(body.clone()))?,
            None => Vec::new(),
        };
        let next = (index < self.lead_pages.len().saturating_sub(1))
            .then(|| format!("/sales/sales-leads/?page={}", page + 1));

        Ok(Page {
            results,
            next,
            count: None,
        })
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn set_token(&self, token: Option<String>) {
        *lock(&self.token) = token;
    }

    async fn login(&self, username: &str, password: &str) -> ApiResult<Session> {
        self.record("login", false, |c| {
            c.logins.push((username.to_string(), password.to_string()));
        });
        sleep(self.login_delay).await;
        decode("/accounts/login/", &self.session)
    }

    async fn start_otp(&self, email: &str) -> ApiResult<()> {
        self.record("otp_start", false, |c| c.otp_starts.push(email.to_string()));
        decode::<Value>("/accounts/login/otp/start/", &self.otp_start).map(|_| ())
    }

    async fn verify_otp(&self, email: &str, otp: &str) -> ApiResult<Session> {
        self.record("otp_verify", false, |c| {
            c.otp_verifies.push((email.to_string(), otp.to_string()));
        });
        sleep(self.login_delay).await;
        decode("/accounts/login/otp/verify/", &self.session)
    }

    async fn my_scope(&self, include_units: bool) -> ApiResult<Scope> {
        self.record("scope", true, |c| c.scope_fetches.push(include_units));
        let scope: Option<Scope> = decode("/client/my-scope/", &self.scope)?;
        Ok(scope.unwrap_or_default())
    }

    async fn dashboard(
        &self,
        kind: DashboardKind,
        query: &DashboardQuery,
    ) -> ApiResult<Option<DashboardMetrics>> {
        self.record("dashboard", true, |c| c.dashboards.push((kind, query.clone())));

        let (delay, scripted) = lock(&self.dashboards)
            .pop_front()
            .unwrap_or_else(|| (Duration::ZERO, self.dashboard_default.clone()));
        sleep(delay).await;

        match scripted {
            Ok(body) => DashboardMetrics::from_response(body)
                .map_err(|e| ApiError::decode(kind.path(), e)),
            Err((status, detail)) => Err(ApiError::status(status, detail)),
        }
    }

    async fn sales_leads(&self, page: u32) -> ApiResult<Page<LeadRecord>> {
        self.record("sales_leads", true, |c| c.lead_pages.push(page));
        sleep(self.lead_delay).await;
        self.lead_page(page)
    }

    async fn upcoming_activities(&self, query: &ActivityQuery) -> ApiResult<Vec<LeadActivities>> {
        self.record("activities", true, |c| c.activities.push(query.clone()));
        let leads: Option<Vec<LeadActivities>> =
            decode("/sales/upcoming-activity/", &self.activities)?;
        Ok(leads.unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
