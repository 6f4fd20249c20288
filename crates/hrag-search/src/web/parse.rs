//! Headline extraction from a search results page.
//!
//! Headlines are the visible text of `<a>` elements in document order.
//! Markup inside an anchor is dropped, entities are decoded and whitespace
//! is collapsed. Anchors with no text are skipped.

use std::sync::LazyLock;

use hrag_core::RetrievalError;
use regex::Regex;

static ANCHOR_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b[^>]*>(.*?)</a\s*>").ok());

static HIDDEN_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").ok());

static TAG_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").ok());

static MARKUP_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)<\s*(!doctype|html|head|body|div|a)\b").ok());

fn pattern(re: &LazyLock<Option<Regex>>) -> Result<&Regex, RetrievalError> {
    re.as_ref()
        .ok_or_else(|| RetrievalError::Failed("headline pattern failed to compile".into()))
}

/// Up to `max` headlines from `html`.
///
/// A well-formed page with no anchors yields an empty list.
///
/// # Errors
///
/// [`RetrievalError::Parse`] when the body is not HTML at all.
pub fn extract_headlines(html: &str, max: usize) -> Result<Vec<String>, RetrievalError> {
    if !pattern(&MARKUP_RE)?.is_match(html) {
        let preview: String = html.trim().chars().take(40).collect();
        return Err(RetrievalError::Parse(format!(
            "response is not an HTML document (starts with {preview:?})"
        )));
    }

    let visible = pattern(&HIDDEN_RE)?.replace_all(html, " ");
    let tags = pattern(&TAG_RE)?;

    let headlines = pattern(&ANCHOR_RE)?
        .captures_iter(&visible)
        .filter_map(|caps| caps.get(1))
        .map(|inner| normalize_text(&tags.replace_all(inner.as_str(), " ")))
        .filter(|text| !text.is_empty())
        .take(max)
        .collect();
    Ok(headlines)
}

fn normalize_text(raw: &str) -> String {
    decode_entities(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode the named entities search pages actually use plus numeric
/// references. Unknown entities are left as written.
fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}
