//! Main note publishing client.

use tracing::{error, info, warn};

use crate::auth::{Authenticator, Credentials, Session};
use crate::browser::ChromeLauncher;
use crate::config::Config;
use crate::error::{PublishError, RequestError, Result};
use crate::http::{ReqwestTransport, RetryClient};
use crate::markdown::{MarkdownDocument, MarkdownRenderer};
use crate::retry::RetryPolicy;
use crate::traits::{BrowserLauncher, HttpTransport};
use crate::upload::{Article, ArticleRef, DraftManager, ImageUploader, UploadResult};
use crate::utils;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Publishes Markdown articles as drafts on note.
///
/// Each call logs in afresh, so concurrent calls never share a [`Session`].
#[derive(Debug, Clone)]
pub struct NotePublisher {
    authenticator: Authenticator,
    renderer: MarkdownRenderer,
    image_uploader: ImageUploader,
    draft_manager: DraftManager,
}

impl NotePublisher {
    /// Creates a publisher backed by reqwest and a local Chrome.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::with_collaborators(
            &config,
            transport,
            Arc::new(ChromeLauncher::new()),
        ))
    }

    /// Creates a publisher on top of the given transport and browser launcher.
    pub fn with_collaborators(
        config: &Config,
        transport: Arc<dyn HttpTransport>,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Self {
        // Create the retrying HTTP client shared by uploads and drafts
        let client = Arc::new(RetryClient::new(
            transport,
            RetryPolicy::from_config(config),
        ));

        Self {
            authenticator: Authenticator::new(launcher, config),
            renderer: MarkdownRenderer::new(),
            image_uploader: ImageUploader::new(Arc::clone(&client), config.api.clone()),
            draft_manager: DraftManager::new(client, config.api.clone()),
        }
    }

    /// Renders Markdown exactly as `publish` would.
    pub fn render(&self, markdown: &str) -> String {
        self.renderer.render(markdown)
    }

    /// Publishes an article as a new draft.
    ///
    /// The workflow is strictly sequential:
    /// 1. Validate title and image (no browser or network before this passes)
    /// 2. Log in and capture session cookies
    /// 3. Render Markdown to HTML
    /// 4. Upload the eyecatch image, if any
    /// 5. Create the draft
    ///
    /// If step 5 fails after step 4 succeeded, the uploaded image stays on
    /// the platform unreferenced.
    pub async fn publish(
        &self,
        credentials: &Credentials,
        title: &str,
        markdown: &str,
        image_path: Option<&Path>,
    ) -> Result<ArticleRef> {
        let result = self
            .publish_inner(credentials, title, markdown, image_path)
            .await;
        log_outcome("publish", title, &result);
        result
    }

    async fn publish_inner(
        &self,
        credentials: &Credentials,
        title: &str,
        markdown: &str,
        image_path: Option<&Path>,
    ) -> Result<ArticleRef> {
        validate_input(credentials, title, image_path).await?;

        info!("Publishing \"{title}\"");
        let session = self.login(credentials).await?;

        // Render content
        let article = Article::new(title, self.renderer.render(markdown));

        // Upload eyecatch image
        let upload = self.upload_image(image_path, &session).await?;
        let article = match &upload {
            Some(upload) => article.with_image(upload),
            None => article,
        };

        // Create draft
        match self.draft_manager.create_draft(&article, &session).await {
            Ok(created) => Ok(created),
            Err(err) => {
                if let Some(upload) = &upload {
                    warn!(
                        "Uploaded image {} is orphaned because draft creation failed",
                        upload.media_id
                    );
                }
                Err(PublishError::CreateFailed(err))
            }
        }
    }

    /// Publishes a parsed document, taking the title and image from its
    /// front matter unless `overrides` names them.
    ///
    /// A relative front matter image path is resolved against `base_dir`.
    pub async fn publish_document(
        &self,
        credentials: &Credentials,
        document: &MarkdownDocument,
        base_dir: &Path,
        overrides: &ArticleOverrides,
    ) -> Result<ArticleRef> {
        let (title, image) = overrides.resolve(document, base_dir)?;
        self.publish(credentials, &title, &document.body, image.as_deref())
            .await
    }

    /// Like [`publish_document`](Self::publish_document), but saves into an
    /// existing draft.
    pub async fn update_document(
        &self,
        credentials: &Credentials,
        draft_id: &str,
        document: &MarkdownDocument,
        base_dir: &Path,
        overrides: &ArticleOverrides,
    ) -> Result<()> {
        let (title, image) = overrides.resolve(document, base_dir)?;
        self.update_draft(credentials, draft_id, &title, &document.body, image.as_deref())
            .await
    }

    /// Replaces the content of an existing draft.
    pub async fn update_draft(
        &self,
        credentials: &Credentials,
        draft_id: &str,
        title: &str,
        markdown: &str,
        image_path: Option<&Path>,
    ) -> Result<()> {
        let result = self
            .update_inner(credentials, draft_id, title, markdown, image_path)
            .await;
        log_outcome("update", title, &result);
        result
    }

    async fn update_inner(
        &self,
        credentials: &Credentials,
        draft_id: &str,
        title: &str,
        markdown: &str,
        image_path: Option<&Path>,
    ) -> Result<()> {
        if draft_id.trim().is_empty() {
            return Err(PublishError::invalid_input("draft id must not be empty"));
        }
        validate_input(credentials, title, image_path).await?;

        info!("Updating draft {draft_id} with \"{title}\"");
        let session = self.login(credentials).await?;

        // Render and attach the image before saving
        let article = Article::new(title, self.renderer.render(markdown));
        let article = match self.upload_image(image_path, &session).await? {
            Some(upload) => article.with_image(&upload),
            None => article,
        };

        self.draft_manager
            .update_draft(draft_id, &article, &session)
            .await
            .map_err(PublishError::UpdateFailed)
    }

    async fn login(&self, credentials: &Credentials) -> Result<Session> {
        self.authenticator
            .authenticate(credentials)
            .await
            .map_err(PublishError::AuthFailed)
    }

    async fn upload_image(
        &self,
        image_path: Option<&Path>,
        session: &Session,
    ) -> Result<Option<UploadResult>> {
        let Some(path) = image_path else {
            return Ok(None);
        };

        info!("Uploading eyecatch image {}", path.display());
        self.image_uploader
            .upload(path, session)
            .await
            .map(Some)
            .map_err(PublishError::UploadFailed)
    }
}

/// Title and image chosen by the caller, taking precedence over front matter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleOverrides {
    pub title: Option<String>,
    /// Used as-is, not resolved against the document directory.
    pub image: Option<PathBuf>,
    /// Title used when neither `title` nor front matter provides one.
    pub fallback_title: Option<String>,
}

impl ArticleOverrides {
    /// Picks the title and image path for `document`.
    pub fn resolve(
        &self,
        document: &MarkdownDocument,
        base_dir: &Path,
    ) -> Result<(String, Option<PathBuf>)> {
        let title = self
            .title
            .as_deref()
            .or(document.front_matter.title.as_deref())
            .or(self.fallback_title.as_deref())
            .ok_or_else(|| {
                PublishError::invalid_input("no title given and none in front matter")
            })?;

        let image = match &self.image {
            Some(image) => Some(image.clone()),
            None => document
                .front_matter
                .image
                .as_deref()
                .map(|image| resolve_path(base_dir, image)),
        };

        Ok((title.to_string(), image))
    }
}

async fn validate_input(
    credentials: &Credentials,
    title: &str,
    image_path: Option<&Path>,
) -> Result<()> {
    utils::validate_title(title)?;
    if !credentials.is_complete() {
        return Err(PublishError::invalid_input("email and password are required"));
    }
    if let Some(path) = image_path {
        utils::validate_image(path).await?;
    }
    Ok(())
}

fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn log_outcome<T>(operation: &str, title: &str, result: &Result<T>) {
    if let Err(err) = result {
        let attempts = match err {
            PublishError::UploadFailed(cause)
            | PublishError::CreateFailed(cause)
            | PublishError::UpdateFailed(cause) => match cause {
                RequestError::Exhausted { attempts, .. } => Some(*attempts),
                _ => Some(1),
            },
            _ => None,
        };
        error!(
            operation,
            title,
            stage = err.stage(),
            attempts,
            "{operation} failed: {err}"
        );
    }
}
