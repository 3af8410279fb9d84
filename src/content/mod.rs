mod extract;
mod html;
mod markdown;

pub use extract::{default_fallback_rules, ContentExtractor, FallbackRule, ReadabilityFn};
pub use html::{clean_html, rewrite_urls, select_first, visible_text, Selector};
pub use markdown::{HtmdConverter, MarkdownConverter};
