//! Browser-driven login and session cookies.
//!
//! The platform has no public auth API, so a [`Session`] is obtained by
//! driving a real login page through a [`BrowserLauncher`]. Progress through
//! the page is modelled explicitly as a [`LoginState`] machine fed by
//! [`LoginEvent`]s; waiting is done by polling an explicit condition until a
//! deadline, never by sleeping a fixed amount.

use crate::config::{Config, LoginPage};
use crate::error::AuthError;
use crate::traits::{BrowserLauncher, BrowserOptions, BrowserPage};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Login credentials. Never persisted; the password is redacted from `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Reads `NOTE_EMAIL` and `NOTE_PASSWORD`.
    pub fn from_env() -> Option<Self> {
        let email = std::env::var("NOTE_EMAIL").ok()?;
        let password = std::env::var("NOTE_PASSWORD").ok()?;
        Some(Self::new(email, password))
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    pub fn is_complete(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Cookies captured after a successful login.
///
/// Deliberately not `Clone`: a session belongs to the single publish call
/// that created it.
#[derive(Default, PartialEq, Eq)]
pub struct Session {
    cookies: BTreeMap<String, String>,
}

impl Session {
    pub fn from_cookies<I, K, V>(cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            cookies: cookies
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Renders the cookies as a `Cookie` header value.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cookies", &self.cookies.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Why a login attempt ended without a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    Timeout,
    InvalidCredentials(String),
}

/// Where a login attempt currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    NotStarted,
    FormSubmitted,
    Success,
    Failed(LoginFailure),
}

/// What the page looked like at one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageObservation {
    pub url: String,
    pub error_visible: bool,
    pub success_visible: bool,
}

/// Input to [`LoginState::transition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginEvent {
    Submitted,
    Observed(PageObservation),
    TimedOut,
}

impl LoginState {
    /// Advances the state machine. Terminal states absorb every event.
    pub fn transition(self, event: LoginEvent, page: &LoginPage) -> LoginState {
        match (self, event) {
            (state @ (LoginState::Success | LoginState::Failed(_)), _) => state,
            (LoginState::NotStarted, LoginEvent::Submitted) => LoginState::FormSubmitted,
            (_, LoginEvent::TimedOut) => LoginState::Failed(LoginFailure::Timeout),
            (LoginState::FormSubmitted, LoginEvent::Observed(observation)) => {
                if observation.error_visible {
                    LoginState::Failed(LoginFailure::InvalidCredentials(format!(
                        "login page reported an error at {}",
                        observation.url
                    )))
                } else if observation.success_visible || page.is_success_url(&observation.url) {
                    LoginState::Success
                } else {
                    LoginState::FormSubmitted
                }
            }
            (state, _) => state,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoginState::Success | LoginState::Failed(_))
    }
}

/// Obtains a [`Session`] by logging in through a browser.
#[derive(Debug, Clone)]
pub struct Authenticator {
    launcher: Arc<dyn BrowserLauncher>,
    page: LoginPage,
    options: BrowserOptions,
    timeout: Duration,
}

impl Authenticator {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, config: &Config) -> Self {
        let mut args = config.browser_args.clone();
        args.push(format!("--user-agent={}", config.user_agent));

        Self {
            launcher,
            page: config.login.clone(),
            options: BrowserOptions {
                headless: config.headless,
                args,
                user_agent: config.user_agent.clone(),
                command_timeout: config.timeout(),
            },
            timeout: config.timeout(),
        }
    }

    /// Logs in and returns the cookies of the resulting browser context.
    ///
    /// The browser is closed on every exit path before this returns.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        info!("Launching browser for login as {}", credentials.email());
        let browser = self.launcher.launch(&self.options).await?;

        let result = self.login(browser.as_ref(), credentials).await;

        if let Err(err) = browser.close().await {
            warn!("Failed to close login browser: {err}");
        }

        match &result {
            Ok(session) => info!("Login succeeded with {} cookies", session.len()),
            Err(err) => warn!("Login failed: {err}"),
        }
        result
    }

    /// Runs the whole login sequence, browser commands included, under one
    /// deadline.
    async fn login(
        &self,
        browser: &dyn BrowserPage,
        credentials: &Credentials,
    ) -> Result<Session, AuthError> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        let waited = tokio::time::timeout_at(deadline, self.drive_login(browser, credentials)).await;

        match waited {
            Ok(result) => result,
            Err(_) => Err(AuthError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    async fn drive_login(
        &self,
        browser: &dyn BrowserPage,
        credentials: &Credentials,
    ) -> Result<Session, AuthError> {
        debug!("Opening {}", self.page.url);
        browser.goto(&self.page.url).await?;

        // Wait for the form to render
        while !browser.has_element(&self.page.email_selector).await? {
            tokio::time::sleep(self.page.poll_interval()).await;
        }

        browser
            .fill(&self.page.email_selector, credentials.email())
            .await?;
        browser
            .fill(&self.page.password_selector, credentials.password())
            .await?;
        browser.click(&self.page.submit_selector).await?;

        let mut state = LoginState::NotStarted.transition(LoginEvent::Submitted, &self.page);
        debug!("Login form submitted");

        // Poll until the page reports success or an error
        while !state.is_terminal() {
            tokio::time::sleep(self.page.poll_interval()).await;
            let observation = self.observe(browser).await?;
            state = state.transition(LoginEvent::Observed(observation), &self.page);
        }

        if let LoginState::Failed(LoginFailure::InvalidCredentials(reason)) = state {
            return Err(AuthError::InvalidCredentials { reason });
        }

        let session = Session::from_cookies(browser.cookies().await?);
        if session.is_empty() {
            return Err(AuthError::NoCookies);
        }
        Ok(session)
    }

    async fn observe(&self, browser: &dyn BrowserPage) -> Result<PageObservation, AuthError> {
        let url = browser.current_url().await?;
        let error_visible = match &self.page.error_selector {
            Some(selector) => browser.has_element(selector).await?,
            None => false,
        };
        let success_visible = match &self.page.success_selector {
            Some(selector) => browser.has_element(selector).await?,
            None => false,
        };

        Ok(PageObservation {
            url,
            error_visible,
            success_visible,
        })
    }
}
