//! Headless Chrome implementation of the browser seams, via chromiumoxide.

use crate::error::AuthError;
use crate::traits::{BrowserLauncher, BrowserOptions, BrowserPage};
use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::debug;

impl From<CdpError> for AuthError {
    fn from(err: CdpError) -> Self {
        AuthError::browser(err.to_string())
    }
}

/// Launches a local Chrome/Chromium process per login.
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher;

impl ChromeLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, options: &BrowserOptions) -> Result<Box<dyn BrowserPage>, AuthError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(options.command_timeout)
            .args(options.args.clone());
        if !options.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(AuthError::browser)?;

        let (mut browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        debug!("Browser launched (headless: {})", options.headless);

        match browser.new_page("about:blank").await {
            Ok(page) => Ok(Box::new(ChromePage {
                browser,
                page,
                handler_task,
            })),
            Err(err) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                Err(err.into())
            }
        }
    }
}

/// A page together with the browser process that owns it.
struct ChromePage {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn goto(&self, url: &str) -> Result<(), AuthError> {
        self.page.goto(url).await?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), AuthError> {
        self.page
            .find_element(selector)
            .await?
            .click()
            .await?
            .type_str(value)
            .await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), AuthError> {
        self.page.find_element(selector).await?.click().await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AuthError> {
        Ok(self.page.url().await?.unwrap_or_default())
    }

    async fn has_element(&self, selector: &str) -> Result<bool, AuthError> {
        Ok(!self.page.find_elements(selector).await?.is_empty())
    }

    async fn cookies(&self) -> Result<Vec<(String, String)>, AuthError> {
        Ok(self
            .page
            .get_cookies()
            .await?
            .into_iter()
            .map(|cookie| (cookie.name, cookie.value))
            .collect())
    }

    async fn close(self: Box<Self>) -> Result<(), AuthError> {
        let ChromePage {
            mut browser,
            handler_task,
            ..
        } = *self;

        let closed = browser.close().await;
        let _ = browser.wait().await;
        handler_task.abort();
        debug!("Browser closed");

        closed.map(|_| ()).map_err(AuthError::from)
    }
}
