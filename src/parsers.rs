//! Normalization of provider answers into topics and links.
//!
//! Providers are asked for `{"topics": [...]}` but answer in several shapes.
//! Each shape is handled by one entry of an ordered strategy table; the first
//! strategy whose predicate holds and whose parser yields something wins.

use crate::text_extract;
use crate::types::{ProcessedTopic, RawLink, Topic};
use serde_json::{Map, Value};
use tracing::debug;

const TOPIC_KEYS: &[&str] = &["topic", "name", "title"];
const CONTEXT_KEYS: &[&str] = &["context", "reason", "rationale", "description"];
const LINK_LIST_KEYS: &[&str] = &["links", "sources", "urls", "references"];
const URL_KEYS: &[&str] = &["url", "link", "href", "uri"];
const TITLE_KEYS: &[&str] = &["title", "name", "label"];
const DESCRIPTION_KEYS: &[&str] = &["description", "summary", "snippet", "context"];

/// A provider answer, decoded as JSON when possible.
pub struct ParseInput<'a> {
    pub raw: &'a str,
    pub json: Option<Value>,
}

impl<'a> ParseInput<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            json: decode_json(raw),
        }
    }

    fn object(&self) -> Option<&Map<String, Value>> {
        self.json.as_ref().and_then(Value::as_object)
    }

    fn array(&self) -> Option<&Vec<Value>> {
        self.json.as_ref().and_then(Value::as_array)
    }
}

type Predicate = fn(&ParseInput) -> bool;
type LinkParser = fn(&ParseInput, &[Topic]) -> Option<Vec<ProcessedTopic>>;

/// One way of reading a link answer.
pub struct LinkStrategy {
    pub name: &'static str,
    applies: Predicate,
    parse: LinkParser,
}

/// Strict shape, then loose shapes, then free text.
pub const LINK_STRATEGIES: &[LinkStrategy] = &[
    LinkStrategy {
        name: "topics-object",
        applies: |input| input.object().is_some_and(|o| o.contains_key("topics")),
        parse: |input, requested| {
            let items = input.object()?.get("topics")?.as_array()?;
            non_empty(topics_with_links(items, requested))
        },
    },
    LinkStrategy {
        name: "top-level-array",
        applies: |input| input.array().is_some(),
        parse: |input, requested| non_empty(topics_with_links(input.array()?, requested)),
    },
    LinkStrategy {
        name: "alternate-key",
        applies: |input| input.object().is_some(),
        parse: |input, requested| {
            let object = input.object()?;
            let items = ["results", "data", "items"]
                .iter()
                .find_map(|key| object.get(*key).and_then(Value::as_array));
            match items {
                Some(items) => non_empty(topics_with_links(items, requested)),
                // a bare {"links": [...]} answer for a single topic
                None => non_empty(topics_with_links(std::slice::from_ref(input.json.as_ref()?), requested)),
            }
        },
    },
    LinkStrategy {
        name: "free-text",
        applies: |_| true,
        parse: |input, requested| non_empty(text_extract::extract_topic_links(input.raw, requested)),
    },
];

/// Reads a link-finding answer for the `requested` topics.
///
/// Returns an empty list when no strategy recovers a single link.
pub fn parse_link_response(raw: &str, requested: &[Topic]) -> Vec<ProcessedTopic> {
    let input = ParseInput::new(raw);

    for strategy in LINK_STRATEGIES {
        if !(strategy.applies)(&input) {
            continue;
        }
        if let Some(topics) = (strategy.parse)(&input, requested) {
            debug!(strategy = strategy.name, topics = topics.len(), "Parsed link response");
            return topics;
        }
    }

    debug!("No strategy recovered links from response");
    Vec::new()
}

/// Reads a topic extraction answer: `{"topics": [...]}`, `{"results": [...]}` or a bare array.
///
/// Entries without a topic name are skipped. `None` means the answer was not
/// usable JSON at all.
pub fn parse_topic_list(raw: &str) -> Option<Vec<Topic>> {
    let input = ParseInput::new(raw);
    let items = match input.json.as_ref()? {
        Value::Array(items) => items,
        Value::Object(object) => ["topics", "results"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_array))?,
        _ => return None,
    };

    Some(
        items
            .iter()
            .filter_map(|item| match item {
                Value::String(name) => Some(Topic::new(name.trim(), "")),
                Value::Object(object) => {
                    let name = first_string(object, TOPIC_KEYS)?;
                    let context = first_string(object, CONTEXT_KEYS).unwrap_or_default();
                    Some(Topic::new(name, context))
                }
                _ => None,
            })
            .filter(|topic| !topic.topic.is_empty())
            .collect(),
    )
}

/// Decodes `raw` as JSON, tolerating code fences and prose around the payload.
pub fn decode_json(raw: &str) -> Option<Value> {
    let trimmed = strip_code_fence(raw.trim());
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    // prose around a single payload
    let start = trimmed.find(['{', '['])?;
    let end = trimmed.rfind(['}', ']'])?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

fn strip_code_fence(text: &str) -> &str {
    let Some(start) = text.find("```") else {
        return text;
    };
    let after = &text[start + 3..];
    // skip the info string, e.g. ```json
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

fn non_empty(topics: Vec<ProcessedTopic>) -> Option<Vec<ProcessedTopic>> {
    let topics: Vec<ProcessedTopic> = topics.into_iter().filter(|t| !t.links.is_empty()).collect();
    (!topics.is_empty()).then_some(topics)
}

/// Interprets each item as either a topic carrying links, or a bare link.
///
/// Bare links are attributed to the only requested topic; with several
/// requested topics they cannot be placed and are dropped.
fn topics_with_links(items: &[Value], requested: &[Topic]) -> Vec<ProcessedTopic> {
    let mut topics: Vec<ProcessedTopic> = Vec::new();
    let mut loose_links: Vec<RawLink> = Vec::new();

    for item in items {
        match item {
            Value::Object(object) if LINK_LIST_KEYS.iter().any(|k| object.contains_key(*k)) => {
                let links = LINK_LIST_KEYS
                    .iter()
                    .find_map(|k| object.get(*k).and_then(Value::as_array))
                    .map(|values| values.iter().filter_map(link_from_value).collect())
                    .unwrap_or_default();
                let name = first_string(object, TOPIC_KEYS).unwrap_or_default();
                let context = first_string(object, CONTEXT_KEYS);
                topics.push(attribute(name, context, links, requested));
            }
            other => {
                if let Some(link) = link_from_value(other) {
                    loose_links.push(link);
                }
            }
        }
    }

    if !loose_links.is_empty() {
        if let [only] = requested {
            topics.push(ProcessedTopic {
                topic: only.topic.clone(),
                context: (!only.context.is_empty()).then(|| only.context.clone()),
                links: loose_links,
            });
        }
    }

    topics
}

/// Names a parsed topic after the requested one it corresponds to.
fn attribute(
    name: String,
    context: Option<String>,
    links: Vec<RawLink>,
    requested: &[Topic],
) -> ProcessedTopic {
    let matched = match requested {
        [only] => Some(only),
        _ => requested
            .iter()
            .find(|t| t.topic.trim().eq_ignore_ascii_case(name.trim())),
    };

    match matched {
        Some(topic) => ProcessedTopic {
            topic: topic.topic.clone(),
            context: context.or_else(|| (!topic.context.is_empty()).then(|| topic.context.clone())),
            links,
        },
        None => ProcessedTopic {
            topic: name,
            context,
            links,
        },
    }
}

fn link_from_value(value: &Value) -> Option<RawLink> {
    match value {
        Value::String(url) if url.trim_start().starts_with("http") => Some(RawLink {
            url: url.trim().to_string(),
            ..Default::default()
        }),
        Value::Object(object) => Some(RawLink {
            url: first_string(object, URL_KEYS)?,
            title: first_string(object, TITLE_KEYS).unwrap_or_default(),
            description: first_string(object, DESCRIPTION_KEYS).unwrap_or_default(),
        }),
        _ => None,
    }
}

fn first_string(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}
