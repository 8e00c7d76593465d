//! # note Publishing SDK
//!
//! Publishes Markdown articles, with an optional eyecatch image, as drafts on
//! [note](https://note.com) through its private web API.
//!
//! The platform offers no token-based authentication, so every publish call
//! logs in through a real browser to obtain session cookies, then talks to
//! the API directly over HTTP.
//!
//! ## Features
//!
//! - **One call per article**: `publisher.publish(&credentials, title, markdown, image)`
//! - **Fail fast**: titles and images are validated before any browser or network activity
//! - **Robust**: bounded retries, linear backoff on HTTP 429, fixed delay on 5xx
//! - **Standards-compliant Markdown**: CommonMark with tables via pulldown-cmark
//! - **Front matter**: `title` and `image` can live at the top of the article
//!
//! ## Architecture
//!
//! - [`NotePublisher`] - orchestrates the whole workflow
//! - [`auth`] - browser login state machine and session cookies
//! - [`http`] - retrying HTTP client over a pluggable transport
//! - [`retry`] - the pure retry/backoff policy
//! - [`markdown`] - Markdown rendering and front matter parsing
//! - [`upload`] - image upload and draft management
//! - [`error`] - error taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use note_pub_rs::{Config, Credentials, NotePublisher, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let publisher = NotePublisher::new(Config::default().apply_env()?)?;
//!     let credentials = Credentials::new("you@example.com", "password");
//!
//!     let article = publisher
//!         .publish(&credentials, "Hello", "# Hi\n\nBody.", None)
//!         .await?;
//!
//!     println!("Draft {} saved: {}", article.draft_id, article.url);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! ```rust,no_run
//! use note_pub_rs::{Config, Credentials, NotePublisher, PublishError};
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> note_pub_rs::Result<()> {
//! let publisher = NotePublisher::new(Config::default())?;
//! let credentials = Credentials::new("you@example.com", "password");
//!
//! match publisher
//!     .publish(&credentials, "Hello", "Body", Some(Path::new("cover.png")))
//!     .await
//! {
//!     Ok(article) => println!("Saved: {}", article.url),
//!     Err(PublishError::InvalidInput { reason }) => eprintln!("Bad input: {reason}"),
//!     Err(PublishError::AuthFailed(err)) => eprintln!("Login failed: {err}"),
//!     Err(err) => eprintln!("Failed during {}: {err}", err.stage()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod browser;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod markdown;
pub mod retry;
pub mod traits;
pub mod upload;
pub mod utils;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use auth::{Credentials, Session};
pub use client::{ArticleOverrides, NotePublisher};
pub use config::Config;
pub use error::{AuthError, PublishError, RequestError, Result};
pub use markdown::MarkdownRenderer;
pub use upload::ArticleRef;
