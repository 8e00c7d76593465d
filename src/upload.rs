//! Image upload and draft management against the note API.

use crate::auth::Session;
use crate::config::ApiEndpoints;
use crate::error::RequestError;
use crate::http::{FilePart, Method, Payload, RetryClient};
use crate::utils;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Successful API responses are wrapped in a `data` envelope.
#[derive(Debug, Deserialize)]
pub struct NoteResponse<T> {
    pub data: T,
}

/// Result of uploading an eyecatch image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    /// Reference used as `eyecatch_image_key` when saving a draft.
    pub media_id: String,
    pub url: Option<String>,
}

/// Upload response as sent: `key`, `id` or both.
#[derive(Debug, Deserialize)]
struct UploadedImage {
    #[serde(default)]
    key: Option<String>,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

impl TryFrom<UploadedImage> for UploadResult {
    type Error = RequestError;

    fn try_from(image: UploadedImage) -> Result<Self, Self::Error> {
        let media_id = image.key.or(image.id).ok_or_else(|| RequestError::Decode {
            message: "upload response has neither `key` nor `id`".to_string(),
        })?;
        Ok(Self {
            media_id,
            url: image.url,
        })
    }
}

/// Article content ready to be saved as a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub html_body: String,
    pub image_id: Option<String>,
}

impl Article {
    pub fn new(title: impl Into<String>, html_body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            html_body: html_body.into(),
            image_id: None,
        }
    }

    pub fn with_image(mut self, upload: &UploadResult) -> Self {
        self.image_id = Some(upload.media_id.clone());
        self
    }
}

/// Handle to a created draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleRef {
    pub draft_id: String,
    pub key: Option<String>,
    pub url: String,
}

#[derive(Debug, Serialize)]
struct DraftBody<'a> {
    name: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    eyecatch_image_key: Option<&'a str>,
    template_key: Option<&'a str>,
}

impl<'a> DraftBody<'a> {
    fn new(article: &'a Article, status: Option<&'a str>) -> Self {
        Self {
            name: &article.title,
            body: &article.html_body,
            status,
            eyecatch_image_key: article.image_id.as_deref(),
            template_key: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DraftCreated {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    edit_url: Option<String>,
    #[serde(default, rename = "editUrl")]
    edit_url_camel: Option<String>,
}

/// Uploads eyecatch images.
#[derive(Debug, Clone)]
pub struct ImageUploader {
    client: Arc<RetryClient>,
    endpoints: ApiEndpoints,
}

impl ImageUploader {
    pub fn new(client: Arc<RetryClient>, endpoints: ApiEndpoints) -> Self {
        Self { client, endpoints }
    }

    /// Uploads the image at `path` as a multipart `file` field.
    pub async fn upload(&self, path: &Path, session: &Session) -> Result<UploadResult, RequestError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RequestError::Transport {
                message: format!("cannot read {}: {e}", path.display()),
            })?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image")
            .to_string();
        debug!("Uploading {} ({} bytes)", file_name, bytes.len());

        let part = FilePart {
            field: "file".to_string(),
            content_type: utils::content_type_of(path),
            file_name,
            bytes: Bytes::from(bytes),
        };
        let response = self
            .client
            .send(
                Method::POST,
                &self.endpoints.upload_image_url(),
                session,
                Payload::Multipart(part),
            )
            .await?;

        let upload = UploadResult::try_from(response.json::<NoteResponse<UploadedImage>>()?.data)?;
        info!("Uploaded image, key: {}", upload.media_id);
        Ok(upload)
    }
}

/// Creates and updates drafts.
#[derive(Debug, Clone)]
pub struct DraftManager {
    client: Arc<RetryClient>,
    endpoints: ApiEndpoints,
}

impl DraftManager {
    pub fn new(client: Arc<RetryClient>, endpoints: ApiEndpoints) -> Self {
        Self { client, endpoints }
    }

    /// Creates a new draft and returns its id and URL.
    pub async fn create_draft(
        &self,
        article: &Article,
        session: &Session,
    ) -> Result<ArticleRef, RequestError> {
        let body = serde_json::to_value(DraftBody::new(article, None)).map_err(|e| {
            RequestError::Transport {
                message: format!("cannot encode draft: {e}"),
            }
        })?;

        let response = self
            .client
            .send(
                Method::POST,
                &self.endpoints.draft_create_url(),
                session,
                Payload::Json(body),
            )
            .await?;

        let created = response.json::<NoteResponse<DraftCreated>>()?.data;
        let edit_url = created.edit_url.or(created.edit_url_camel);
        let url = match (&created.key, edit_url) {
            (Some(key), _) => self.endpoints.article_url(key),
            (None, Some(edit_url)) => edit_url,
            (None, None) => {
                return Err(RequestError::Decode {
                    message: format!("draft {} was created without a key or URL", created.id),
                })
            }
        };

        info!("Created draft {}", created.id);
        Ok(ArticleRef {
            draft_id: created.id,
            key: created.key,
            url,
        })
    }

    /// Saves new content into an existing draft.
    pub async fn update_draft(
        &self,
        draft_id: &str,
        article: &Article,
        session: &Session,
    ) -> Result<(), RequestError> {
        let body = serde_json::to_value(DraftBody::new(article, Some("draft"))).map_err(|e| {
            RequestError::Transport {
                message: format!("cannot encode draft: {e}"),
            }
        })?;

        self.client
            .send(
                Method::PUT,
                &self.endpoints.draft_update_url(draft_id),
                session,
                Payload::Json(body),
            )
            .await?;

        info!("Saved draft {draft_id}");
        Ok(())
    }
}

/// Accepts ids the API sends either as JSON numbers or strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapped(#[serde(deserialize_with = "string_or_number")] String);

    Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(id)| id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ApiResponse;
    use crate::retry::RetryPolicy;
    use crate::testing::{session, MockTransport};
    use serde_json::json;

    fn client(transport: &Arc<MockTransport>) -> Arc<RetryClient> {
        Arc::new(RetryClient::new(transport.clone(), RetryPolicy::default()))
    }

    fn decode_upload(value: serde_json::Value) -> Result<UploadResult, RequestError> {
        let response: NoteResponse<UploadedImage> = serde_json::from_value(value).unwrap();
        UploadResult::try_from(response.data)
    }

    #[test]
    fn test_deserialize_upload_result() {
        let upload = decode_upload(json!({
            "data": {"key": "img_123", "url": "https://assets.note.test/img_123.png"}
        }))
        .unwrap();
        assert_eq!(upload.media_id, "img_123");

        let upload = decode_upload(json!({"data": {"id": 987}})).unwrap();
        assert_eq!(upload.media_id, "987");
        assert_eq!(upload.url, None);
    }

    #[test]
    fn test_upload_result_with_key_and_id_prefers_key() {
        let upload = decode_upload(json!({
            "data": {"id": 42, "key": "img_abc", "url": "https://assets.note.test/abc.png"}
        }))
        .unwrap();

        assert_eq!(upload.media_id, "img_abc");
        assert_eq!(upload.url.as_deref(), Some("https://assets.note.test/abc.png"));
    }

    #[test]
    fn test_upload_result_without_reference() {
        let err = decode_upload(json!({"data": {"url": "https://assets.note.test/x.png"}}))
            .unwrap_err();
        assert!(matches!(err, RequestError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_create_draft_with_both_url_spellings() {
        let transport = Arc::new(MockTransport::new(vec![Ok(ApiResponse::new(
            200,
            json!({"data": {
                "id": 7,
                "edit_url": "https://note.com/notes/7/edit",
                "editUrl": "https://note.com/notes/7/edit?legacy"
            }})
            .to_string(),
        ))]));
        let drafts = DraftManager::new(client(&transport), ApiEndpoints::default());

        let created = drafts
            .create_draft(&Article::new("Hello", "<p>hi</p>"), &session())
            .await
            .unwrap();

        assert_eq!(created.draft_id, "7");
        assert_eq!(created.url, "https://note.com/notes/7/edit");
    }

    #[test]
    fn test_draft_body_shape() {
        let article = Article::new("Hello", "<p>hi</p>").with_image(&UploadResult {
            media_id: "img_1".to_string(),
            url: None,
        });

        let body = serde_json::to_value(DraftBody::new(&article, Some("draft"))).unwrap();
        assert_eq!(
            body,
            json!({
                "name": "Hello",
                "body": "<p>hi</p>",
                "status": "draft",
                "eyecatch_image_key": "img_1",
                "template_key": null
            })
        );

        let body = serde_json::to_value(DraftBody::new(&Article::new("t", "b"), None)).unwrap();
        assert!(body.get("eyecatch_image_key").is_none());
        assert!(body.get("status").is_none());
    }

    #[tokio::test]
    async fn test_create_draft_builds_article_url() {
        let transport = Arc::new(MockTransport::new(vec![Ok(ApiResponse::new(
            200,
            json!({"data": {"id": 1234, "key": "n0abc"}}).to_string(),
        ))]));
        let drafts = DraftManager::new(client(&transport), ApiEndpoints::default());

        let created = drafts
            .create_draft(&Article::new("Hello", "<p>hi</p>"), &session())
            .await
            .unwrap();

        assert_eq!(created.draft_id, "1234");
        assert_eq!(created.url, "https://note.com/n/n0abc");
        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, "https://note.com/api/v1/text_notes");
    }

    #[tokio::test]
    async fn test_create_draft_accepts_edit_url() {
        let transport = Arc::new(MockTransport::new(vec![Ok(ApiResponse::new(
            201,
            json!({"data": {"id": "d-1", "editUrl": "https://note.com/notes/d-1/edit"}}).to_string(),
        ))]));
        let drafts = DraftManager::new(client(&transport), ApiEndpoints::default());

        let created = drafts
            .create_draft(&Article::new("Hello", "<p>hi</p>"), &session())
            .await
            .unwrap();

        assert_eq!(created.url, "https://note.com/notes/d-1/edit");
        assert_eq!(created.key, None);
    }

    #[tokio::test]
    async fn test_create_draft_with_unexpected_body() {
        let transport = Arc::new(MockTransport::new(vec![Ok(ApiResponse::new(
            200,
            json!({"error": "maintenance"}).to_string(),
        ))]));
        let drafts = DraftManager::new(client(&transport), ApiEndpoints::default());

        let err = drafts
            .create_draft(&Article::new("Hello", "<p>hi</p>"), &session())
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_update_draft_uses_put() {
        let transport = Arc::new(MockTransport::with_statuses(&[200]));
        let drafts = DraftManager::new(client(&transport), ApiEndpoints::default());

        drafts
            .update_draft("1234", &Article::new("Hello", "<p>hi</p>"), &session())
            .await
            .unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::PUT);
        assert_eq!(request.url, "https://note.com/api/v1/text_notes/1234");
        match &request.payload {
            Payload::Json(body) => assert_eq!(body["status"], "draft"),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upload_sends_multipart_file() {
        let image = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        std::fs::write(image.path(), b"png-bytes").unwrap();
        let transport = Arc::new(MockTransport::new(vec![Ok(ApiResponse::new(
            200,
            json!({"data": {"key": "img_9", "url": "https://assets.note.test/9.png"}}).to_string(),
        ))]));
        let uploader = ImageUploader::new(client(&transport), ApiEndpoints::default());

        let upload = uploader.upload(image.path(), &session()).await.unwrap();

        assert_eq!(upload.media_id, "img_9");
        let request = &transport.requests()[0];
        assert_eq!(request.url, "https://note.com/api/v1/upload_image");
        match &request.payload {
            Payload::Multipart(part) => {
                assert_eq!(part.field, "file");
                assert_eq!(part.content_type, "image/png");
                assert_eq!(part.bytes.as_ref(), b"png-bytes");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
