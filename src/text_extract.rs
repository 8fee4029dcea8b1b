//! Link recovery from free text, used when a provider ignores the requested JSON shape.

use crate::types::{ProcessedTopic, RawLink, Topic};
use regex::Regex;
use std::sync::LazyLock;

/// Characters of trailing text kept as a description.
const DESCRIPTION_CHARS: usize = 150;

static URL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s<>"'`\]\[]+"#).expect("url regex is valid"));

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\((https?://[^)\s]+)\)").expect("markdown link regex is valid")
});

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["“]([^"”]{3,120})["”]"#).expect("quoted regex is valid"));

static CAPITALIZED_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-zA-Z'’]+(?:\s+(?:(?:of|the|and|for|in|on|to|a)\b|[A-Z][a-zA-Z'’]+))*\s+[A-Z][a-zA-Z'’]+\b")
        .expect("capitalized regex is valid")
});

/// Every `http(s)://` token in `text`, trailing punctuation removed, in order of appearance.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    URL_TOKEN
        .find_iter(text)
        .map(|m| strip_trailing_punctuation(m.as_str()).to_string())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Recovers per-topic links from an unstructured answer.
///
/// The text is split into paragraphs; a URL belongs to the topic named in its
/// paragraph, or to the last topic named before it. With a single requested
/// topic, every URL belongs to it.
pub fn extract_topic_links(text: &str, topics: &[Topic]) -> Vec<ProcessedTopic> {
    let mut grouped: Vec<ProcessedTopic> = topics
        .iter()
        .map(|t| ProcessedTopic {
            topic: t.topic.clone(),
            context: (!t.context.is_empty()).then(|| t.context.clone()),
            links: Vec::new(),
        })
        .collect();

    let mut current: Option<usize> = (topics.len() == 1).then_some(0);

    for paragraph in paragraphs(text) {
        if let Some(named) = named_topic(paragraph, topics) {
            current = Some(named);
        }
        let Some(index) = current else {
            continue;
        };

        for url in extract_urls(paragraph) {
            let links = &mut grouped[index].links;
            if links.iter().any(|l| l.url == url) {
                continue;
            }
            links.push(RawLink {
                title: derive_title(paragraph, &url),
                description: derive_description(paragraph, &url),
                url,
            });
        }
    }

    grouped.retain(|t| !t.links.is_empty());
    grouped
}

fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n").map(str::trim).filter(|p| !p.is_empty())
}

/// The index of the topic named in `paragraph`, preferring the longest name.
fn named_topic(paragraph: &str, topics: &[Topic]) -> Option<usize> {
    let lowered = paragraph.to_lowercase();
    topics
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.topic.trim().is_empty() && lowered.contains(&t.topic.trim().to_lowercase()))
        .max_by_key(|(_, t)| t.topic.len())
        .map(|(i, _)| i)
}

/// Picks a title for `url`: its markdown label, else a quoted phrase on its line,
/// else a run of capitalized words on its line, else the host name.
pub fn derive_title(paragraph: &str, url: &str) -> String {
    if let Some(label) = MARKDOWN_LINK
        .captures_iter(paragraph)
        .find(|caps| strip_trailing_punctuation(&caps[2]) == url)
        .map(|caps| caps[1].trim().to_string())
    {
        return label;
    }

    let line = line_containing(paragraph, url).unwrap_or(paragraph);
    let without_urls = URL_TOKEN.replace_all(line, " ");

    if let Some(caps) = QUOTED.captures(&without_urls) {
        return caps[1].trim().to_string();
    }

    if let Some(m) = CAPITALIZED_RUN.find(&without_urls) {
        return m.as_str().trim().to_string();
    }

    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_default()
}

/// Picks a description for `url`: the text following it on its line (up to
/// 150 characters), else the line before it.
pub fn derive_description(paragraph: &str, url: &str) -> String {
    if let Some(position) = paragraph.find(url) {
        let after = &paragraph[position + url.len()..];
        let trailing = after.lines().next().unwrap_or_default();
        let cleaned = clean_fragment(trailing);
        if !cleaned.is_empty() {
            return truncate_chars(&cleaned, DESCRIPTION_CHARS);
        }
    }

    let lines: Vec<&str> = paragraph.lines().collect();
    lines
        .iter()
        .position(|line| line.contains(url))
        .filter(|&i| i > 0)
        .map(|i| clean_fragment(lines[i - 1]))
        .map(|line| truncate_chars(&line, DESCRIPTION_CHARS))
        .unwrap_or_default()
}

fn line_containing<'a>(paragraph: &'a str, url: &str) -> Option<&'a str> {
    paragraph.lines().find(|line| line.contains(url))
}

/// Strips markdown decoration and separators left around a URL.
fn clean_fragment(text: &str) -> String {
    let stripped = URL_TOKEN.replace_all(text, " ");
    let trimmed = stripped
        .trim()
        .trim_start_matches([')', ']', '>', '-', ':', '—', '–', '*', '|', ',', '.'])
        .trim()
        .trim_start_matches(['-', '*', '#'])
        .trim();
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trims sentence punctuation after a URL. A closing parenthesis is only
/// trimmed while it is unbalanced, so `.../Mercury_(planet)` keeps its own.
fn strip_trailing_punctuation(s: &str) -> &str {
    let mut s = s;
    loop {
        let trimmed = s.trim_end_matches(['.', ',', ';', ':', '!', '?', '*', '_']);
        match trimmed.strip_suffix(')') {
            Some(rest) if trimmed.matches(')').count() > trimmed.matches('(').count() => s = rest,
            _ => return trimmed,
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}…", cut.trim_end())
}
