//! Runtime configuration.
//!
//! A [`Config`] value is built once (defaults, optional TOML file, then
//! environment overrides) and handed to each component's constructor.

use crate::error::{PublishError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Browser arguments used for every login unless overridden.
const DEFAULT_BROWSER_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--window-size=1920,1080",
];

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Top-level configuration for the publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-request HTTP timeout and overall login timeout, in seconds.
    pub timeout_seconds: u64,
    /// Maximum number of attempts for one HTTP call (including the first).
    pub max_retries: u32,
    /// Unit of the linear backoff applied after a 429 response.
    pub base_wait_seconds: u64,
    /// Fixed delay before retrying a 5xx response or transport failure.
    pub retry_delay_seconds: u64,
    /// Run the browser without a visible window.
    pub headless: bool,
    /// Extra command-line flags passed to the browser.
    pub browser_args: Vec<String>,
    /// User agent sent by both the browser and the HTTP client.
    pub user_agent: String,
    pub login: LoginPage,
    pub api: ApiEndpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            max_retries: 3,
            base_wait_seconds: 2,
            retry_delay_seconds: 2,
            headless: true,
            browser_args: DEFAULT_BROWSER_ARGS.iter().map(|s| s.to_string()).collect(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            login: LoginPage::default(),
            api: ApiEndpoints::default(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PublishError::config_error(format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&raw).map_err(|e| {
            PublishError::config_error(format!("invalid config {}: {e}", path.display()))
        })
    }

    /// Applies `NOTE_*` environment overrides on top of the current values.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup("NOTE_TIMEOUT_SECONDS") {
            self.timeout_seconds = parse_var("NOTE_TIMEOUT_SECONDS", &value)?;
        }
        if let Some(value) = lookup("NOTE_MAX_RETRIES") {
            self.max_retries = parse_var("NOTE_MAX_RETRIES", &value)?;
        }
        if let Some(value) = lookup("NOTE_BASE_WAIT_SECONDS") {
            self.base_wait_seconds = parse_var("NOTE_BASE_WAIT_SECONDS", &value)?;
        }
        if let Some(value) = lookup("NOTE_RETRY_DELAY_SECONDS") {
            self.retry_delay_seconds = parse_var("NOTE_RETRY_DELAY_SECONDS", &value)?;
        }
        if let Some(value) = lookup("NOTE_HEADLESS") {
            self.headless = parse_var("NOTE_HEADLESS", &value)?;
        }
        Ok(self)
    }

    /// Rejects values that would make the workflow unusable.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(PublishError::config_error("timeout_seconds must be positive"));
        }
        if self.max_retries == 0 {
            return Err(PublishError::config_error("max_retries must be at least 1"));
        }
        if self.login.poll_interval_millis == 0 {
            return Err(PublishError::config_error(
                "login.poll_interval_millis must be positive",
            ));
        }
        if !self.api.draft_update_path.contains("{id}") {
            return Err(PublishError::config_error(
                "api.draft_update_path must contain an {id} placeholder",
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| PublishError::config_error(format!("{key}={value:?}: {e}")))
}

/// Where and how the interactive login happens.
///
/// The target site controls its markup, so every selector is configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginPage {
    pub url: String,
    pub email_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
    /// The post-login URL must contain this fragment.
    pub success_url_contains: String,
    /// Element whose presence also signals a successful login.
    pub success_selector: Option<String>,
    /// Element whose presence signals rejected credentials.
    pub error_selector: Option<String>,
    pub poll_interval_millis: u64,
}

impl Default for LoginPage {
    fn default() -> Self {
        Self {
            url: "https://note.com/login".to_string(),
            email_selector: "input[name=\"email\"]".to_string(),
            password_selector: "input[name=\"password\"]".to_string(),
            submit_selector: "button[type=\"submit\"]".to_string(),
            success_url_contains: "note.com".to_string(),
            success_selector: None,
            error_selector: Some("[role=\"alert\"]".to_string()),
            poll_interval_millis: 250,
        }
    }
}

impl LoginPage {
    /// True when `url` shows the browser has left the login page for the site.
    pub fn is_success_url(&self, url: &str) -> bool {
        url.contains(&self.success_url_contains) && !url.starts_with(&self.url)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }
}

/// Private API endpoints of the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEndpoints {
    pub base_url: String,
    pub draft_create_path: String,
    /// Path template; `{id}` is replaced with the draft id.
    pub draft_update_path: String,
    pub upload_image_path: String,
    /// Public site root used to build article URLs.
    pub article_url_base: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            base_url: "https://note.com/api".to_string(),
            draft_create_path: "/v1/text_notes".to_string(),
            draft_update_path: "/v1/text_notes/{id}".to_string(),
            upload_image_path: "/v1/upload_image".to_string(),
            article_url_base: "https://note.com".to_string(),
        }
    }
}

impl ApiEndpoints {
    pub fn draft_create_url(&self) -> String {
        join_url(&self.base_url, &self.draft_create_path)
    }

    pub fn draft_update_url(&self, draft_id: &str) -> String {
        join_url(&self.base_url, &self.draft_update_path.replace("{id}", draft_id))
    }

    pub fn upload_image_url(&self) -> String {
        join_url(&self.base_url, &self.upload_image_path)
    }

    /// Public URL of an article identified by its key.
    pub fn article_url(&self, key: &str) -> String {
        format!("{}/n/{}", self.article_url_base.trim_end_matches('/'), key)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_platform() {
        let config = Config::default();

        assert_eq!(config.timeout_seconds, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_wait_seconds, 2);
        assert!(config.headless);
        assert!(config.login.url.starts_with("https://"));
        assert!(config.api.base_url.starts_with("https://"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_endpoint_urls() {
        let api = ApiEndpoints::default();

        assert_eq!(api.draft_create_url(), "https://note.com/api/v1/text_notes");
        assert_eq!(
            api.draft_update_url("42"),
            "https://note.com/api/v1/text_notes/42"
        );
        assert_eq!(api.upload_image_url(), "https://note.com/api/v1/upload_image");
        assert_eq!(api.article_url("n1a2b3"), "https://note.com/n/n1a2b3");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
max_retries = 5
headless = false

[login]
poll_interval_millis = 100
"#,
        )
        .unwrap();

        assert_eq!(config.max_retries, 5);
        assert!(!config.headless);
        assert_eq!(config.login.poll_interval_millis, 100);
        assert_eq!(config.login.url, "https://note.com/login");
        assert_eq!(config.timeout_seconds, 10);
    }

    #[test]
    fn test_from_file() {
        let file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        std::fs::write(file.path(), "timeout_seconds = 30\n").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.timeout_seconds, 30);

        let missing = Config::from_file("/definitely/not/here.toml");
        assert!(matches!(missing, Err(PublishError::Config { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("NOTE_MAX_RETRIES", "7"),
            ("NOTE_BASE_WAIT_SECONDS", " 4 "),
            ("NOTE_HEADLESS", "false"),
        ]
        .into_iter()
        .collect();

        let config = Config::default()
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.max_retries, 7);
        assert_eq!(config.base_wait_seconds, 4);
        assert!(!config.headless);
        assert_eq!(config.timeout_seconds, 10);

        let bad = Config::default().apply_overrides(|key| {
            (key == "NOTE_TIMEOUT_SECONDS").then(|| "soon".to_string())
        });
        assert!(bad.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let config = Config {
            max_retries: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_retries"));
    }

    #[test]
    fn test_success_url() {
        let login = LoginPage::default();

        assert!(!login.is_success_url("https://note.com/login"));
        assert!(!login.is_success_url("https://note.com/login?redirect=/"));
        assert!(login.is_success_url("https://note.com/"));
        assert!(!login.is_success_url("about:blank"));
    }
}
