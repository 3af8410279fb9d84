//! Rendering of saved-article documents: filename derivation, the
//! frontmatter/body placeholder grammar, and YAML-safe quoting.
//!
//! Placeholders not in the grammar are left literal; substituted values are
//! quote-escaped only where the template puts them inside double quotes
//! (frontmatter string fields).

use crate::model::{Item, MediaType};
use crate::store::normalize_path;
use chrono::{DateTime, SecondsFormat, Utc};

/// Frontmatter used when the configuration doesn't supply one.
pub const DEFAULT_FRONTMATTER_TEMPLATE: &str = r#"---
title: "{{title}}"
date: {{date}}
tags: [{{tags}}]
source: "{{source}}"
link: {{link}}
author: "{{author}}"
feedTitle: "{{feedTitle}}"
guid: "{{guid}}"
---"#;

/// Derive a store filename from an item title.
///
/// Filesystem-illegal characters are stripped, whitespace collapses to
/// single spaces, at most the first five words are kept, and the result is
/// capped at 50 characters.
pub fn sanitize_filename(title: &str) -> String {
    let stripped: String = title
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();
    let shortened = stripped
        .split_whitespace()
        .take(5)
        .collect::<Vec<_>>()
        .join(" ");
    shortened.chars().take(50).collect()
}

/// The deterministic path an item with `title` saves to under `folder`.
///
/// This single convention is shared by save, verify, and adopt — they must
/// agree for out-of-band files to be recognized.
pub fn derived_path(folder: &str, title: &str) -> String {
    let folder = normalize_path(folder);
    let filename = sanitize_filename(title);
    if folder.is_empty() {
        format!("{filename}.md")
    } else {
        format!("{folder}/{filename}.md")
    }
}

/// Comma-joined tag names for `{{tags}}`, with the saved marker injected
/// when configured and not already present in the list.
fn tags_string(item: &Item, add_saved_tag: bool) -> String {
    let mut joined = item
        .tags
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    if add_saved_tag && !joined.to_lowercase().contains("saved") {
        if joined.is_empty() {
            joined = "saved".to_string();
        } else {
            joined = format!("{joined}, saved");
        }
    }
    joined
}

fn escape_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}

/// Render the frontmatter block for an item. `saved_at` stamps `{{date}}`.
///
/// Video and podcast items get their media fields injected directly after
/// the opening `---` so downstream tooling can dispatch on them.
pub fn render_frontmatter(
    item: &Item,
    template: &str,
    add_saved_tag: bool,
    saved_at: DateTime<Utc>,
) -> String {
    let mut out = template
        .replace("{{title}}", &escape_quotes(&item.title))
        .replace(
            "{{date}}",
            &saved_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
        .replace("{{tags}}", &tags_string(item, add_saved_tag))
        .replace("{{source}}", &escape_quotes(&item.feed_title))
        .replace("{{link}}", &item.link)
        .replace(
            "{{author}}",
            &escape_quotes(item.author.as_deref().unwrap_or("")),
        )
        .replace("{{feedTitle}}", &escape_quotes(&item.feed_title))
        .replace("{{guid}}", &escape_quotes(&item.guid));

    match item.media_type {
        MediaType::Video => {
            if let Some(video_id) = &item.video_id {
                out = out.replacen(
                    "---\n",
                    &format!("---\nmediaType: video\nvideoId: \"{video_id}\"\n"),
                    1,
                );
            }
        }
        MediaType::Podcast => {
            if let Some(audio_url) = &item.audio_url {
                out = out.replacen(
                    "---\n",
                    &format!("---\nmediaType: podcast\naudioUrl: \"{audio_url}\"\n"),
                    1,
                );
            }
        }
        MediaType::Article => {}
    }

    out.push('\n');
    out
}

/// Render the body template for an item, substituting `content_markdown` for
/// `{{content}}`.
pub fn render_body(
    item: &Item,
    template: &str,
    content_markdown: &str,
    add_saved_tag: bool,
) -> String {
    let formatted_date = item
        .pub_date
        .map(|d| d.format("%B %-d, %Y").to_string())
        .unwrap_or_default();
    let iso_date = item
        .pub_date
        .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default();

    template
        .replace("{{title}}", &item.title)
        .replace("{{date}}", &formatted_date)
        .replace("{{isoDate}}", &iso_date)
        .replace("{{link}}", &item.link)
        .replace("{{author}}", item.author.as_deref().unwrap_or(""))
        .replace("{{source}}", &item.feed_title)
        .replace("{{feedTitle}}", &item.feed_title)
        .replace("{{summary}}", item.summary.as_deref().unwrap_or(""))
        .replace("{{content}}", content_markdown)
        .replace("{{tags}}", &tags_string(item, add_saved_tag))
        .replace("{{guid}}", &item.guid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Tag;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn item() -> Item {
        Item {
            guid: "guid-1".into(),
            feed_url: "https://example.com/feed".into(),
            feed_title: "Example \"Quoted\" Blog".into(),
            title: "A Title".into(),
            link: "https://example.com/a".into(),
            description: "<p>desc</p>".into(),
            summary: Some("short summary".into()),
            author: Some("Jo Writer".into()),
            pub_date: Some(Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap()),
            media_type: crate::model::MediaType::Article,
            video_id: None,
            audio_url: None,
            read: false,
            starred: false,
            saved: false,
            saved_file_path: None,
            tags: vec![Tag::new("research", "#123456")],
        }
    }

    #[test]
    fn sanitize_strips_collapses_and_truncates() {
        let title =
            "A: Very/Long\\Title: With * Many? Illegal<>| Chars and seven or more words here";
        let name = sanitize_filename(title);
        assert_eq!(name, "A VeryLongTitle With Many Illegal");
        assert!(name.chars().count() <= 50);
        assert!(name.split(' ').count() <= 5);
    }

    #[test]
    fn sanitize_caps_at_fifty_characters() {
        let title = "Supercalifragilisticexpialidocious Pneumonoultramicroscopicsilicovolcanoconiosis words";
        let name = sanitize_filename(title);
        assert!(name.chars().count() <= 50);
    }

    #[test]
    fn derived_path_joins_folder_and_filename() {
        assert_eq!(derived_path("Articles/", "Post"), "Articles/Post.md");
        assert_eq!(derived_path("", "Post"), "Post.md");
        assert_eq!(derived_path("/a/b/", "Post"), "a/b/Post.md");
    }

    #[test]
    fn frontmatter_escapes_quotes_and_injects_saved_tag() {
        let fm = render_frontmatter(
            &item(),
            DEFAULT_FRONTMATTER_TEMPLATE,
            true,
            Utc.with_ymd_and_hms(2024, 3, 6, 9, 30, 0).unwrap(),
        );
        assert!(fm.contains(r#"source: "Example \"Quoted\" Blog""#));
        assert!(fm.contains("tags: [research, saved]"));
        assert!(fm.contains("date: 2024-03-06T09:30:00.000Z"));
        assert!(fm.ends_with("---\n"));
    }

    #[test]
    fn frontmatter_does_not_duplicate_saved_tag() {
        let mut it = item();
        it.tags.push(Tag::new("Saved", "#fff"));
        let fm = render_frontmatter(&it, DEFAULT_FRONTMATTER_TEMPLATE, true, Utc::now());
        assert!(fm.contains("tags: [research, Saved]"));
    }

    #[test]
    fn frontmatter_injects_video_fields() {
        let mut it = item();
        it.media_type = crate::model::MediaType::Video;
        it.video_id = Some("abc123".into());
        let fm = render_frontmatter(&it, DEFAULT_FRONTMATTER_TEMPLATE, false, Utc::now());
        assert!(fm.starts_with("---\nmediaType: video\nvideoId: \"abc123\"\n"));
    }

    #[test]
    fn frontmatter_injects_podcast_fields() {
        let mut it = item();
        it.media_type = crate::model::MediaType::Podcast;
        it.audio_url = Some("https://cdn.example/ep1.mp3".into());
        let fm = render_frontmatter(&it, DEFAULT_FRONTMATTER_TEMPLATE, false, Utc::now());
        assert!(fm.contains("mediaType: podcast"));
        assert!(fm.contains("audioUrl: \"https://cdn.example/ep1.mp3\""));
    }

    #[test]
    fn body_template_substitutes_grammar() {
        let body = render_body(
            &item(),
            "# {{title}}\n{{date}} / {{isoDate}}\nby {{author}} via {{source}}\n\n{{content}}\n\n[Source]({{link}})",
            "converted *markdown*",
            false,
        );
        assert!(body.contains("# A Title"));
        assert!(body.contains("March 5, 2024"));
        assert!(body.contains("2024-03-05T12:00:00.000Z"));
        assert!(body.contains("by Jo Writer via Example \"Quoted\" Blog"));
        assert!(body.contains("converted *markdown*"));
    }

    #[test]
    fn unresolved_placeholders_stay_literal() {
        let body = render_body(&item(), "{{title}} {{custom}}", "", false);
        assert_eq!(body, "A Title {{custom}}");
    }

    #[test]
    fn body_without_pub_date_renders_empty_dates() {
        let mut it = item();
        it.pub_date = None;
        let body = render_body(&it, "{{date}}|{{isoDate}}", "", false);
        assert_eq!(body, "|");
    }

    proptest! {
        #[test]
        fn sanitize_never_emits_illegal_chars(title in ".{0,200}") {
            let name = sanitize_filename(&title);
            prop_assert!(name.chars().count() <= 50);
            prop_assert!(!name.chars().any(|c| matches!(
                c,
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'
            )));
            prop_assert!(name.split_whitespace().count() <= 5);
        }

        #[test]
        fn sanitize_is_deterministic(title in ".{0,100}") {
            prop_assert_eq!(sanitize_filename(&title), sanitize_filename(&title));
        }
    }
}
