//! Markdown note normalizer.
//!
//! Splits off YAML frontmatter and pulls out the bits the classifiers and the
//! store care about: a title, tags, and `[[wiki links]]`. Malformed
//! frontmatter is treated as absent, never as an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::Path;

use crate::classify::Metadata;

static INLINE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[\s(])#([A-Za-z][\w/-]*)").expect("static regex")
});
static WIKI_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\]|#]+)(?:#[^\]|]*)?(?:\|[^\]]*)?\]\]").expect("static regex"));

/// A normalized note.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedNote {
    pub title: String,
    /// Body with the frontmatter block removed.
    pub content: String,
    pub frontmatter: Metadata,
    /// Lowercased, deduplicated, in order of first appearance.
    pub tags: Vec<String>,
    pub wiki_links: Vec<String>,
}

/// Parse a raw markdown file. `path` supplies the fallback title.
pub fn parse(raw: &str, path: &Path) -> ParsedNote {
    let (frontmatter, body) = split_frontmatter(raw);

    let title = frontmatter
        .get("title")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| first_heading(body))
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

    let mut tags = Vec::new();
    if let Some(value) = frontmatter.get("tags") {
        for tag in frontmatter_tags(value) {
            push_unique(&mut tags, normalize_tag(&tag));
        }
    }
    for line in prose_lines(body) {
        for caps in INLINE_TAG.captures_iter(line) {
            push_unique(&mut tags, normalize_tag(&caps[1]));
        }
    }

    let mut wiki_links = Vec::new();
    for caps in WIKI_LINK.captures_iter(body) {
        push_unique(&mut wiki_links, caps[1].trim().to_string());
    }

    ParsedNote {
        title,
        content: body.to_string(),
        frontmatter,
        tags,
        wiki_links,
    }
}

/// Split `---`-delimited frontmatter from the body. Returns an empty map and
/// the whole input when there is no well-formed mapping.
fn split_frontmatter(raw: &str) -> (Metadata, &str) {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (Metadata::new(), raw);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return match parse_yaml_mapping(yaml) {
                Some(map) => (map, body.trim_start_matches(['\r', '\n'])),
                None => {
                    tracing::debug!("ignoring malformed frontmatter");
                    (Metadata::new(), raw)
                }
            };
        }
        offset += line.len();
    }
    (Metadata::new(), raw)
}

fn parse_yaml_mapping(yaml: &str) -> Option<Metadata> {
    if yaml.trim().is_empty() {
        return Some(Metadata::new());
    }
    let value: serde_yaml::Value = serde_yaml::from_str(yaml).ok()?;
    match serde_json::to_value(value).ok()? {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    }
}

fn frontmatter_tags(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect(),
        serde_json::Value::String(s) => s
            .split([',', ' '])
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.trim().to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_start_matches('#').to_lowercase()
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

fn first_heading(body: &str) -> Option<String> {
    prose_lines(body)
        .find_map(|line| line.strip_prefix("# "))
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

/// Lines outside fenced code blocks.
fn prose_lines(body: &str) -> impl Iterator<Item = &str> {
    let mut in_fence = false;
    body.lines().filter(move |line| {
        let t = line.trim_start();
        if t.starts_with("```") || t.starts_with("~~~") {
            in_fence = !in_fence;
            return false;
        }
        !in_fence
    })
}
