//! Login flow: password or one-time code, then scope fetch and navigation
//!
//! Form state lives behind a mutex so the flow can be driven through `&self`
//! from several tasks; submissions and code sends each carry a pending flag
//! that rejects overlapping attempts.

use crate::api::Backend;
use crate::error::StoreResult;
use crate::store::{SessionStore, SessionStoreExt};
use salesdesk_core::types::keys;
use salesdesk_core::{Role, Scope, Session};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

/// Landing path when nothing else applies
pub const DEFAULT_DESTINATION: &str = "/dashboard";

/// Authentication mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginMode {
    /// Identifier and password
    #[default]
    Password,
    /// Email and a one-time code
    OneTimeCode,
}

/// Which step was missing the identifier; each has its own prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierPrompt {
    /// Password submission
    Password,
    /// Sending a code
    SendCode,
    /// Verifying a code
    VerifyCode,
}

impl IdentifierPrompt {
    /// User-facing prompt
    pub const fn message(self) -> &'static str {
        match self {
            Self::Password => "Please enter your username or email.",
            Self::SendCode => "Please enter your email address to receive OTP.",
            Self::VerifyCode => "Please enter your email address.",
        }
    }
}

/// Login failures, one user-facing message each
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// Identifier left empty
    #[error("{}", .0.message())]
    MissingIdentifier(IdentifierPrompt),

    /// Password left empty
    #[error("Please enter your password.")]
    MissingSecret,

    /// Code left empty
    #[error("Please enter the OTP you received.")]
    MissingCode,

    /// Backend refused to send a code
    #[error("Failed to send OTP. Please check your email and try again.")]
    OtpSendFailed,

    /// Backend rejected the password login
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Backend rejected the code
    #[error("Invalid email or OTP")]
    InvalidOtp,

    /// Another submission or send is still in flight
    #[error("A request is already in progress. Please wait.")]
    Busy,

    /// Session could not be persisted
    #[error("Could not save the session: {0}")]
    Storage(String),
}

impl LoginError {
    /// Whether the failure was caught before any request was sent
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingIdentifier(_) | Self::MissingSecret | Self::MissingCode
        )
    }
}

/// Snapshot of the login surface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    /// Current mode
    pub mode: LoginMode,
    /// Username or email; survives mode switches
    pub identifier: String,
    /// Password
    pub secret: String,
    /// One-time code
    pub code: String,
    /// A code was sent; further sends act as resend
    pub code_sent: bool,
    /// Password shown in clear text
    pub show_secret: bool,
    /// Login surface visible
    pub is_open: bool,
    /// A code send is in flight
    pub sending_code: bool,
    /// A submission is in flight
    pub submitting: bool,
    /// Error shown under the form
    pub error: Option<LoginError>,
}

impl LoginForm {
    /// Label of the code send button
    pub const fn send_code_label(&self) -> &'static str {
        if self.sending_code {
            "Sending..."
        } else if self.code_sent {
            "Resend OTP"
        } else {
            "Send OTP"
        }
    }
}

/// Result of a successful login
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    /// Persisted session
    pub session: Session,
    /// Scope, when the post-login fetch succeeded
    pub scope: Option<Scope>,
    /// Where to navigate next
    pub destination: String,
}

/// Where to land after login
///
/// `SALES` always lands on the default; other roles return to the path they
/// originally asked for.
pub fn post_login_destination(role: &Role, requested: Option<&str>, default: &str) -> String {
    if role.ignores_requested_path() {
        return default.to_string();
    }
    requested
        .filter(|p| !p.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Reinstall a persisted session's token on the backend
///
/// # Errors
///
/// Returns an error if the stored session cannot be read.
pub fn resume_session<B, S>(backend: &B, store: &S) -> StoreResult<Option<Session>>
where
    B: Backend + ?Sized,
    S: SessionStore + ?Sized,
{
    let session = store.session()?;
    backend.set_token(session.as_ref().map(|s| s.token.clone()));
    Ok(session)
}

/// Clears a pending flag when dropped, including on cancellation
struct Pending<'a>(&'a AtomicBool);

impl<'a> Pending<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Login flow controller
pub struct LoginFlow<B: ?Sized, S: ?Sized> {
    backend: Arc<B>,
    store: Arc<S>,
    default_destination: String,
    requested_path: Mutex<Option<String>>,
    form: Mutex<LoginForm>,
    submitting: AtomicBool,
    sending_code: AtomicBool,
}

impl<B: ?Sized, S: ?Sized> std::fmt::Debug for LoginFlow<B, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginFlow")
            .field("default_destination", &self.default_destination)
            .field("form", &self.form())
            .finish_non_exhaustive()
    }
}

impl<B, S> LoginFlow<B, S>
where
    B: Backend + ?Sized,
    S: SessionStore + ?Sized,
{
    /// Create a flow landing on [`DEFAULT_DESTINATION`]
    pub fn new(backend: Arc<B>, store: Arc<S>) -> Self {
        Self {
            backend,
            store,
            default_destination: DEFAULT_DESTINATION.to_string(),
            requested_path: Mutex::new(None),
            form: Mutex::new(LoginForm::default()),
            submitting: AtomicBool::new(false),
            sending_code: AtomicBool::new(false),
        }
    }

    /// Override the default landing path
    #[must_use]
    pub fn with_default_destination(mut self, destination: impl Into<String>) -> Self {
        self.default_destination = destination.into();
        self
    }

    /// Remember the protected path the user was sent away from
    pub fn record_requested_path(&self, path: impl Into<String>) {
        *lock(&self.requested_path) = Some(path.into());
    }

    fn form_mut(&self) -> MutexGuard<'_, LoginForm> {
        lock(&self.form)
    }
}

impl<B: ?Sized, S: ?Sized> LoginFlow<B, S> {
    /// Current form state
    pub fn form(&self) -> LoginForm {
        let mut form = lock(&self.form).clone();
        form.submitting = self.submitting.load(Ordering::Acquire);
        form.sending_code = self.sending_code.load(Ordering::Acquire);
        form
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B, S> LoginFlow<B, S>
where
    B: Backend + ?Sized,
    S: SessionStore + ?Sized,
{
    /// Show the login surface with a blank password form
    pub fn open(&self) {
        *self.form_mut() = LoginForm {
            is_open: true,
            ..LoginForm::default()
        };
    }

    /// Hide the login surface, keeping its contents
    pub fn close(&self) {
        self.form_mut().is_open = false;
    }

    /// Switch mode, clearing password, code, sent flag and error
    pub fn switch_mode(&self, mode: LoginMode) {
        let mut form = self.form_mut();
        form.mode = mode;
        form.secret.clear();
        form.code.clear();
        form.code_sent = false;
        form.show_secret = false;
        form.error = None;
    }

    /// Edit the identifier
    pub fn set_identifier(&self, value: impl Into<String>) {
        let mut form = self.form_mut();
        form.identifier = value.into();
        form.error = None;
    }

    /// Edit the password
    pub fn set_secret(&self, value: impl Into<String>) {
        let mut form = self.form_mut();
        form.secret = value.into();
        form.error = None;
    }

    /// Edit the one-time code
    pub fn set_code(&self, value: impl Into<String>) {
        let mut form = self.form_mut();
        form.code = value.into();
        form.error = None;
    }

    /// Toggle clear-text password display
    pub fn toggle_secret_visibility(&self) {
        let mut form = self.form_mut();
        form.show_secret = !form.show_secret;
    }

    fn fail<T>(&self, error: LoginError) -> Result<T, LoginError> {
        self.form_mut().error = Some(error.clone());
        Err(error)
    }

    /// Send (or resend) a one-time code to the identifier
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Busy`] while a send is in flight,
    /// [`LoginError::MissingIdentifier`] for an empty identifier and
    /// [`LoginError::OtpSendFailed`] when the backend refuses.
    pub async fn send_code(&self) -> Result<(), LoginError> {
        let Some(_pending) = Pending::acquire(&self.sending_code) else {
            return Err(LoginError::Busy);
        };

        let email = {
            let mut form = self.form_mut();
            form.error = None;
            form.identifier.trim().to_string()
        };
        if email.is_empty() {
            return self.fail(LoginError::MissingIdentifier(IdentifierPrompt::SendCode));
        }

        match self.backend.start_otp(&email).await {
            Ok(()) => {
                info!(backend = self.backend.name(), "One-time code sent");
                self.form_mut().code_sent = true;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to send one-time code");
                self.fail(LoginError::OtpSendFailed)
            }
        }
    }

    /// Submit the form in its current mode
    ///
    /// On success the session is persisted, the scope fetch is attempted once
    /// and the destination is chosen. A failed scope fetch is logged and
    /// does not fail the login.
    ///
    /// # Errors
    ///
    /// Returns [`LoginError::Busy`] while a submission is in flight, a
    /// validation error for missing fields, or the mode's rejection error.
    pub async fn submit(&self) -> Result<LoginOutcome, LoginError> {
        let Some(_pending) = Pending::acquire(&self.submitting) else {
            return Err(LoginError::Busy);
        };

        let form = {
            let mut form = self.form_mut();
            form.error = None;
            form.clone()
        };

        let session = match form.mode {
            LoginMode::Password => self.password_login(&form).await,
            LoginMode::OneTimeCode => self.code_login(&form).await,
        };
        match session {
            Ok(session) => self.after_login(session).await,
            Err(e) => self.fail(e),
        }
    }

    async fn password_login(&self, form: &LoginForm) -> Result<Session, LoginError> {
        let identifier = form.identifier.trim();
        if identifier.is_empty() {
            return Err(LoginError::MissingIdentifier(IdentifierPrompt::Password));
        }
        if form.secret.is_empty() {
            return Err(LoginError::MissingSecret);
        }

        self.backend
            .login(identifier, &form.secret)
            .await
            .map_err(|e| {
                warn!(error = %e, unauthorized = e.is_unauthorized(), "Password login rejected");
                LoginError::InvalidCredentials
            })
    }

    async fn code_login(&self, form: &LoginForm) -> Result<Session, LoginError> {
        let email = form.identifier.trim();
        if email.is_empty() {
            return Err(LoginError::MissingIdentifier(IdentifierPrompt::VerifyCode));
        }
        let code = form.code.trim();
        if code.is_empty() {
            return Err(LoginError::MissingCode);
        }

        self.backend.verify_otp(email, code).await.map_err(|e| {
            warn!(error = %e, unauthorized = e.is_unauthorized(), "One-time code login rejected");
            LoginError::InvalidOtp
        })
    }

    async fn after_login(&self, session: Session) -> Result<LoginOutcome, LoginError> {
        self.store
            .set(keys::SESSION, &session)
            .map_err(|e| LoginError::Storage(e.to_string()))?;
        self.backend.set_token(Some(session.token.clone()));

        if let Some(brand) = &session.brand
            && let Err(e) = self.store.set(keys::BRAND_THEME, brand)
        {
            warn!(error = %e, "Failed to persist brand theme");
        }

        let scope = match self.backend.my_scope(true).await {
            Ok(scope) => {
                if let Err(e) = self.store.set(keys::SCOPE, &scope) {
                    warn!(error = %e, "Failed to persist scope");
                }
                Some(scope)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load scope after login");
                None
            }
        };

        self.close();

        let requested = lock(&self.requested_path).take();
        let destination =
            post_login_destination(session.role(), requested.as_deref(), &self.default_destination);
        info!(role = %session.role(), destination, "Login succeeded");

        Ok(LoginOutcome {
            session,
            scope,
            destination,
        })
    }

    /// Drop the session, scope and active project and forget the token
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be cleared.
    pub fn logout(&self) -> StoreResult<()> {
        self.store.clear_session()?;
        self.backend.set_token(None);
        *self.form_mut() = LoginForm::default();
        info!("Logged out");
        Ok(())
    }
}
