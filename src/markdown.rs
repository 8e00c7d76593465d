//! Markdown to HTML rendering and front matter handling.
//!
//! Rendering delegates to pulldown-cmark (CommonMark plus tables,
//! strikethrough and task lists). Single newlines inside a paragraph are
//! rendered as `<br />`, matching how the editor on the platform displays
//! line breaks. Rendering is pure and never fails: anything that is not valid
//! Markdown syntax ends up as escaped text inside a paragraph.
//!
//! # Example
//!
//! ```
//! use note_pub_rs::markdown::MarkdownRenderer;
//!
//! let html = MarkdownRenderer::new().render("# Hi\n\nBody.");
//! assert!(html.contains("<h1>Hi</h1>"));
//! assert!(html.contains("<p>Body.</p>"));
//! ```

use pulldown_cmark::{html, Event, Options, Parser};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Stateless Markdown renderer.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
    hard_breaks: bool,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        Self {
            options,
            hard_breaks: true,
        }
    }

    /// Keeps single newlines as soft breaks instead of `<br />`.
    pub fn with_soft_breaks(mut self) -> Self {
        self.hard_breaks = false;
        self
    }

    /// Renders Markdown text to an HTML fragment.
    pub fn render(&self, markdown: &str) -> String {
        let hard_breaks = self.hard_breaks;
        let events = Parser::new_ext(markdown, self.options).map(|event| match event {
            Event::SoftBreak if hard_breaks => Event::HardBreak,
            other => other,
        });

        let mut output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut output, events);
        output
    }
}

/// Renders with the default renderer.
pub fn render(markdown: &str) -> String {
    MarkdownRenderer::new().render(markdown)
}

/// Metadata block at the top of an article.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FrontMatter {
    pub title: Option<String>,
    /// Eyecatch image path, relative to the article file.
    pub image: Option<String>,
    /// Any other keys, kept for callers that want them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// An article split into front matter and Markdown body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkdownDocument {
    pub front_matter: FrontMatter,
    pub body: String,
}

/// Splits an optional leading `---` YAML block from the body.
///
/// Text without a well-formed block is returned unchanged as the body.
pub fn parse_document(text: &str) -> MarkdownDocument {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let whole = || MarkdownDocument {
        front_matter: FrontMatter::default(),
        body: text.to_string(),
    };

    let Some(rest) = strip_fence_line(text) else {
        return whole();
    };
    let Some((yaml, body)) = split_at_closing_fence(rest) else {
        return whole();
    };

    if yaml.trim().is_empty() {
        return MarkdownDocument {
            front_matter: FrontMatter::default(),
            body: body.to_string(),
        };
    }

    match serde_yaml::from_str::<FrontMatter>(yaml) {
        Ok(front_matter) => MarkdownDocument {
            front_matter,
            body: body.to_string(),
        },
        Err(err) => {
            warn!("Ignoring malformed front matter: {err}");
            whole()
        }
    }
}

fn strip_fence_line(text: &str) -> Option<&str> {
    text.strip_prefix("---\r\n")
        .or_else(|| text.strip_prefix("---\n"))
}

/// Returns (yaml, body) around the first line consisting of `---`.
fn split_at_closing_fence(rest: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}
