//! String-level HTML surgery for the extraction pipeline: block removal,
//! structural selector lookup, and URL absolutization.
//!
//! This is deliberately not a full DOM — the pipeline only needs to locate
//! one content-bearing element, drop obvious chrome, and rewrite attribute
//! URLs. Tag balancing is tracked per tag name; pathological markup falls
//! back to leaving the input untouched rather than failing.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

// ============================================================================
// Selectors
// ============================================================================

/// Minimal structural selector: a tag name, a class token, or a tag with a
/// required attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Tag(&'static str),
    Class(&'static str),
    TagAttr(&'static str, &'static str, &'static str),
}

/// Outer HTML of the first element matching `selector`, if any.
pub fn select_first(html: &str, selector: Selector) -> Option<String> {
    let (start, end) = find_element(html, selector)?;
    Some(html[start..end].to_string())
}

fn find_element(html: &str, selector: Selector) -> Option<(usize, usize)> {
    match selector {
        Selector::Tag(tag) => {
            let re = start_tag_re(tag);
            let m = re.find(html)?;
            Some((m.start(), element_end(html, tag, m)?))
        }
        Selector::Class(class) => {
            static ANY_START: LazyLock<Regex> = LazyLock::new(|| {
                Regex::new(r"(?is)<([a-zA-Z][a-zA-Z0-9]*)\b[^>]*>").expect("static regex")
            });
            for caps in ANY_START.captures_iter(html) {
                let m = caps.get(0).expect("whole match");
                if has_class_token(m.as_str(), class) {
                    let tag = caps.get(1).expect("tag capture").as_str().to_ascii_lowercase();
                    if let Some(end) = element_end(html, &tag, m) {
                        return Some((m.start(), end));
                    }
                }
            }
            None
        }
        Selector::TagAttr(tag, attr, value) => {
            let re = start_tag_re(tag);
            for m in re.find_iter(html) {
                if attr_value(m.as_str(), attr).is_some_and(|v| v == value) {
                    if let Some(end) = element_end(html, tag, m) {
                        return Some((m.start(), end));
                    }
                }
            }
            None
        }
    }
}

fn start_tag_re(tag: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{}\b[^>]*>", regex::escape(tag))).expect("tag regex")
}

fn element_end(html: &str, tag: &str, open: regex::Match<'_>) -> Option<usize> {
    if open.as_str().ends_with("/>") {
        return Some(open.end());
    }
    balanced_end(html, tag, open.end())
}

/// Position just past the close tag matching an open tag of `tag` whose
/// start tag ends at `from`. Nested same-tag elements are balanced;
/// self-closing occurrences don't change depth.
fn balanced_end(html: &str, tag: &str, from: usize) -> Option<usize> {
    let re = Regex::new(&format!(r"(?is)<(/?){}\b[^>]*>", regex::escape(tag))).expect("tag regex");
    let mut depth = 1usize;
    for m in re.find_iter(&html[from..]) {
        let text = m.as_str();
        if text.as_bytes().get(1) == Some(&b'/') {
            depth -= 1;
            if depth == 0 {
                return Some(from + m.end());
            }
        } else if !text.ends_with("/>") {
            depth += 1;
        }
    }
    None
}

fn attr_value(start_tag: &str, attr: &str) -> Option<String> {
    let re = Regex::new(&format!(
        r#"(?is)\b{}\s*=\s*["']([^"']*)["']"#,
        regex::escape(attr)
    ))
    .expect("attr regex");
    re.captures(start_tag).map(|c| c[1].to_string())
}

fn has_class_token(start_tag: &str, token: &str) -> bool {
    attr_value(start_tag, "class")
        .is_some_and(|classes| classes.split_whitespace().any(|c| c == token))
}

// ============================================================================
// Chrome removal
// ============================================================================

/// Strip scripts, styles, iframes, SVG, and ad containers from a fragment.
///
/// Mirrors the cleanup applied before markdown conversion: `<script>`,
/// `<style>`, `<iframe>`, and `<svg>` blocks go entirely; `<div>` elements
/// whose class or id marks them as advertising are removed with their
/// contents.
pub fn clean_html(html: &str) -> String {
    let mut out = html.to_string();
    for tag in ["script", "style", "iframe", "svg"] {
        out = remove_blocks(&out, tag);
    }
    strip_ad_containers(&out)
}

fn remove_blocks(html: &str, tag: &str) -> String {
    let block = Regex::new(&format!(
        r"(?is)<{t}\b[^>]*>.*?</{t}\s*>",
        t = regex::escape(tag)
    ))
    .expect("block regex");
    let lone = Regex::new(&format!(r"(?is)<{}\b[^>]*/>", regex::escape(tag))).expect("lone regex");
    let out = block.replace_all(html, "");
    lone.replace_all(&out, "").into_owned()
}

fn is_ad_container(start_tag: &str) -> bool {
    if let Some(classes) = attr_value(start_tag, "class") {
        let lowered = classes.to_ascii_lowercase();
        if lowered
            .split_whitespace()
            .any(|c| c == "ad" || c == "ads" || c == "advertisement")
            || lowered.contains("ad-")
            || lowered.contains("ads-")
        {
            return true;
        }
    }
    if let Some(id) = attr_value(start_tag, "id") {
        let lowered = id.to_ascii_lowercase();
        if lowered.contains("ad-") || lowered.contains("ads-") {
            return true;
        }
    }
    false
}

fn strip_ad_containers(html: &str) -> String {
    static DIV_START: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?is)<div\b[^>]*>").expect("static regex"));

    let mut out = html.to_string();
    loop {
        let target = DIV_START.find_iter(&out).find_map(|m| {
            if !is_ad_container(m.as_str()) {
                return None;
            }
            let end = balanced_end(&out, "div", m.end()).unwrap_or(m.end());
            Some((m.start(), end))
        });
        match target {
            Some((start, end)) => out.replace_range(start..end, ""),
            None => break,
        }
    }
    out
}

// ============================================================================
// Visible text
// ============================================================================

/// Text content of a document with markup removed — what a reader would see.
/// Used for the error-indicator scan, so fidelity beyond "words survive" is
/// not required.
pub fn visible_text(html: &str) -> String {
    static ANY_TAG: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"));
    let mut out = remove_blocks(html, "script");
    out = remove_blocks(&out, "style");
    let out = ANY_TAG.replace_all(&out, " ");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// URL rewriting
// ============================================================================

/// Absolutize attribute URLs in an extracted fragment against the page URL.
///
/// - A leftover internal `app://` scheme prefix becomes `https://`.
/// - `<img src>` and `<source srcset>` entries resolve against the base and
///   are forced onto the page's own host (https) when resolution would point
///   cross-host — broken relative paths otherwise resolve to the wrong CDN.
/// - `<a href>` entries are absolutized without host forcing.
///
/// An unparseable base URL leaves the content unchanged; individually
/// unresolvable URLs are left as they were.
pub fn rewrite_urls(content: &str, base_url: &str) -> String {
    let Ok(base) = Url::parse(base_url) else {
        return content.to_string();
    };

    static IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?is)<img([^>]+)src=["']([^"']+)["']"#).expect("static regex")
    });
    static SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?is)<source([^>]+)srcset=["']([^"']+)["']"#).expect("static regex")
    });
    static A_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"(?is)<a([^>]+)href=["']([^"']+)["']"#).expect("static regex")
    });
    static SRCSET_PART: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(\S+)(\s+\d+w)?$").expect("static regex"));

    let mut out = content.replace("app://", "https://");

    out = IMG_RE
        .replace_all(&out, |caps: &regex::Captures| {
            match absolutize_forcing_host(&caps[2], &base) {
                Some(abs) => format!(r#"<img{}src="{}""#, &caps[1], abs),
                None => caps[0].to_string(),
            }
        })
        .into_owned();

    out = SOURCE_RE
        .replace_all(&out, |caps: &regex::Captures| {
            let rewritten = caps[2]
                .split(',')
                .map(|part| {
                    let trimmed = part.trim();
                    match SRCSET_PART.captures(trimmed) {
                        Some(p) => {
                            let descriptor = p.get(2).map_or("", |d| d.as_str());
                            match absolutize_forcing_host(&p[1], &base) {
                                Some(abs) => format!("{abs}{descriptor}"),
                                None => trimmed.to_string(),
                            }
                        }
                        None => trimmed.to_string(),
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!(r#"<source{}srcset="{}""#, &caps[1], rewritten)
        })
        .into_owned();

    out = A_RE
        .replace_all(&out, |caps: &regex::Captures| {
            format!(r#"<a{}href="{}""#, &caps[1], to_absolute(&caps[2], &base))
        })
        .into_owned();

    out
}

/// Resolve `src` against `base` and force the result onto the base host with
/// an https scheme when it would land cross-host. Returns `None` when the URL
/// cannot be resolved or re-hosted (e.g. `data:` URIs), leaving the original
/// attribute in place.
fn absolutize_forcing_host(src: &str, base: &Url) -> Option<String> {
    let mut resolved = base.join(src).ok()?;
    if resolved.host_str() != base.host_str() {
        resolved.set_host(base.host_str()).ok()?;
        resolved.set_scheme("https").ok()?;
    }
    Some(resolved.to_string())
}

/// Plain absolutization for link hrefs: scheme fixes, protocol-relative, and
/// base-relative resolution. Unresolvable input comes back unchanged.
fn to_absolute(url: &str, base: &Url) -> String {
    if let Some(rest) = url.strip_prefix("app://") {
        return format!("https://{rest}");
    }
    if let Some(rest) = url.strip_prefix("//") {
        return format!("https://{rest}");
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    match base.join(url) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => url.to_string(),
    }
}
