//! In-memory fakes for the collaborator traits, shared by unit tests.

use crate::auth::Session;
use crate::error::AuthError;
use crate::http::{ApiRequest, ApiResponse, TransportError};
use crate::traits::{BrowserLauncher, BrowserOptions, BrowserPage, HttpTransport};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

const LOGIN_URL: &str = "https://note.com/login";

pub fn session() -> Session {
    Session::from_cookies(default_cookies())
}

fn default_cookies() -> Vec<(String, String)> {
    vec![
        ("_note_session_v5".to_string(), "abc".to_string()),
        ("note_gql_auth_token".to_string(), "def".to_string()),
    ]
}

/// Replays scripted responses in order and records every request.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Result<ApiResponse, TransportError>>>,
    requests: Mutex<Vec<(Instant, ApiRequest)>>,
}

impl MockTransport {
    pub fn new(script: Vec<Result<ApiResponse, TransportError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_statuses(statuses: &[u16]) -> Self {
        Self::new(
            statuses
                .iter()
                .map(|status| Ok(ApiResponse::new(*status, "{}")))
                .collect(),
        )
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(at, _)| *at)
            .collect()
    }

    /// Number of requests whose URL ends with `suffix`.
    pub fn calls_to(&self, suffix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, request)| request.url.ends_with(suffix))
            .count()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        self.requests.lock().unwrap().push((Instant::now(), request));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::fatal("no scripted response left")))
    }
}

#[derive(Debug, Default)]
struct BrowserState {
    closed: AtomicBool,
    submitted: AtomicBool,
    polls: AtomicUsize,
    filled: Mutex<Vec<(String, String)>>,
}

/// Scripted login page. Clones share their recorded state.
#[derive(Debug, Clone)]
pub struct MockBrowser {
    polls_until_login: Option<usize>,
    reject: bool,
    fail_navigation: bool,
    stall_navigation: bool,
    cookies: Vec<(String, String)>,
    state: Arc<BrowserState>,
}

impl MockBrowser {
    /// Reports the login page for `polls` polls after submission, then the home page.
    pub fn logging_in_after(polls: usize) -> Self {
        Self {
            polls_until_login: Some(polls),
            reject: false,
            fail_navigation: false,
            stall_navigation: false,
            cookies: default_cookies(),
            state: Arc::default(),
        }
    }

    pub fn never_logging_in() -> Self {
        Self {
            polls_until_login: None,
            ..Self::logging_in_after(0)
        }
    }

    pub fn rejecting_credentials() -> Self {
        Self {
            reject: true,
            ..Self::never_logging_in()
        }
    }

    pub fn without_cookies(mut self) -> Self {
        self.cookies.clear();
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    /// Navigation never completes.
    pub fn stalling_navigation(mut self) -> Self {
        self.stall_navigation = true;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn filled(&self) -> Vec<(String, String)> {
        self.state.filled.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserPage for MockBrowser {
    async fn goto(&self, url: &str) -> Result<(), AuthError> {
        if self.fail_navigation {
            return Err(AuthError::browser(format!("net::ERR_NAME_NOT_RESOLVED at {url}")));
        }
        if self.stall_navigation {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), AuthError> {
        self.state
            .filled
            .lock()
            .unwrap()
            .push((selector.to_string(), value.to_string()));
        Ok(())
    }

    async fn click(&self, _selector: &str) -> Result<(), AuthError> {
        self.state.submitted.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AuthError> {
        if !self.state.submitted.load(Ordering::SeqCst) || self.reject {
            return Ok(LOGIN_URL.to_string());
        }
        let polls = self.state.polls.fetch_add(1, Ordering::SeqCst);
        match self.polls_until_login {
            Some(limit) if polls >= limit => Ok("https://note.com/".to_string()),
            _ => Ok(LOGIN_URL.to_string()),
        }
    }

    async fn has_element(&self, selector: &str) -> Result<bool, AuthError> {
        if selector.contains("alert") {
            return Ok(self.reject && self.state.submitted.load(Ordering::SeqCst));
        }
        Ok(true)
    }

    async fn cookies(&self) -> Result<Vec<(String, String)>, AuthError> {
        Ok(self.cookies.clone())
    }

    async fn close(self: Box<Self>) -> Result<(), AuthError> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out clones of one [`MockBrowser`] and counts launches.
#[derive(Debug)]
pub struct MockLauncher {
    browser: MockBrowser,
    launches: AtomicUsize,
}

impl MockLauncher {
    pub fn new(browser: MockBrowser) -> Self {
        Self {
            browser,
            launches: AtomicUsize::new(0),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self, _options: &BrowserOptions) -> Result<Box<dyn BrowserPage>, AuthError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.browser.clone()))
    }
}
