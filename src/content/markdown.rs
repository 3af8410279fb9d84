use regex::Regex;
use std::sync::LazyLock;

/// HTML → markdown conversion as consumed by the persistence service.
///
/// Implementations must be pure: same input, same output, no I/O.
pub trait MarkdownConverter: Send + Sync {
    fn to_markdown(&self, html: &str) -> String;
}

/// `htmd`-backed converter with one extra rule: inline math spans
/// (`<span class="math">…</span>`) pass through as their literal text
/// instead of being markdown-escaped, so TeX like `\frac{a}{b}` survives.
pub struct HtmdConverter {
    converter: htmd::HtmlToMarkdown,
}

static MATH_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<span\b[^>]*class\s*=\s*["'][^"']*\bmath\b[^"']*["'][^>]*>(.*?)</span>"#)
        .expect("static regex")
});
static INNER_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"));

/// Sentinel wrapping protected math text across the conversion. Private-use
/// codepoint, so it cannot collide with real content or markdown syntax.
const GUARD: char = '\u{E000}';

impl HtmdConverter {
    pub fn new() -> Self {
        let converter = htmd::HtmlToMarkdown::builder()
            .skip_tags(vec!["script", "style"])
            .build();
        Self { converter }
    }
}

impl Default for HtmdConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownConverter for HtmdConverter {
    fn to_markdown(&self, html: &str) -> String {
        // Lift math spans out before conversion, splice the raw text back in
        // after, so the converter never gets a chance to escape them.
        let mut protected: Vec<String> = Vec::new();
        let guarded = MATH_SPAN.replace_all(html, |caps: &regex::Captures| {
            let text = INNER_TAG.replace_all(&caps[1], "").into_owned();
            let idx = protected.len();
            protected.push(text);
            format!("{GUARD}{idx}{GUARD}")
        });

        let mut markdown = match self.converter.convert(&guarded) {
            Ok(md) => md,
            Err(e) => {
                tracing::warn!(error = %e, "HTML to markdown conversion failed");
                return String::new();
            }
        };

        for (idx, text) in protected.iter().enumerate() {
            markdown = markdown.replace(&format!("{GUARD}{idx}{GUARD}"), text);
        }
        markdown
    }
}
