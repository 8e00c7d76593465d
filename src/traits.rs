//! Seams between the workflow and its external collaborators.
//!
//! Production code plugs in [`crate::http::ReqwestTransport`] and
//! [`crate::browser::ChromeLauncher`]; tests substitute in-memory fakes.

use crate::error::AuthError;
use crate::http::{ApiRequest, ApiResponse, TransportError};
use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;

/// Sends one HTTP request, without retrying.
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// How a browser process should be started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    pub headless: bool,
    pub args: Vec<String>,
    pub user_agent: String,
    /// Upper bound for individual browser commands.
    pub command_timeout: Duration,
}

/// Starts a browser and opens a blank page in it.
#[async_trait]
pub trait BrowserLauncher: Send + Sync + Debug {
    async fn launch(&self, options: &BrowserOptions) -> Result<Box<dyn BrowserPage>, AuthError>;
}

/// A single page of a running browser.
///
/// The page owns its browser process; [`BrowserPage::close`] must be called
/// exactly once to release it.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), AuthError>;

    /// Types `value` into the element matching `selector`.
    async fn fill(&self, selector: &str, value: &str) -> Result<(), AuthError>;

    async fn click(&self, selector: &str) -> Result<(), AuthError>;

    async fn current_url(&self) -> Result<String, AuthError>;

    /// Whether at least one element matches `selector` right now.
    async fn has_element(&self, selector: &str) -> Result<bool, AuthError>;

    /// All cookies visible to the browser context as (name, value) pairs.
    async fn cookies(&self) -> Result<Vec<(String, String)>, AuthError>;

    async fn close(self: Box<Self>) -> Result<(), AuthError>;
}
