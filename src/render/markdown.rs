//! Markdown and math to HTML

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

use super::Render;
use crate::config::RenderConfig;

/// Renders answer text as HTML
///
/// Parser options are fixed at construction; every call is a pure function
/// of its input. Raw HTML in the input is escaped rather than passed through,
/// and link or image targets outside http, https, mailto and relative URLs
/// are replaced with `#`.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    options: Options,
    markdown: bool,
}

impl MarkdownRenderer {
    pub fn new(config: &RenderConfig) -> Self {
        let mut options = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS;
        if config.math {
            options |= Options::ENABLE_MATH;
        }

        Self {
            options,
            markdown: config.markdown,
        }
    }

    fn render_markdown(&self, text: &str) -> String {
        let parser = Parser::new_ext(text, self.options).map(sanitize);
        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new(&RenderConfig::default())
    }
}

impl Render for MarkdownRenderer {
    fn render(&self, text: &str) -> String {
        if self.markdown {
            self.render_markdown(text)
        } else {
            render_plain(text)
        }
    }
}

/// Neutralize raw HTML and unsafe URLs, and give math spans their markup
fn sanitize(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: safe_url(dest_url),
            title,
            id,
        }),
        Event::InlineMath(math) => Event::InlineHtml(CowStr::from(format!(
            r#"<span class="math math-inline">{}</span>"#,
            escape_html(&math)
        ))),
        Event::DisplayMath(math) => Event::InlineHtml(CowStr::from(format!(
            r#"<span class="math math-display">{}</span>"#,
            escape_html(&math)
        ))),
        other => other,
    }
}

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Keep relative URLs and allowed schemes; anything else becomes `#`
fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    // Browsers ignore whitespace and control characters inside a scheme
    let compact: String = url
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .take_while(|c| !matches!(c, '/' | '?' | '#'))
        .collect();

    match compact.split_once(':') {
        Some((scheme, _)) if !ALLOWED_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) => {
            tracing::debug!(scheme = %scheme, "Dropping link with disallowed scheme");
            CowStr::Borrowed("#")
        }
        _ => url,
    }
}

fn render_plain(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    format!("<p>{}</p>\n", escape_html(text).replace('\n', "<br />\n"))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
