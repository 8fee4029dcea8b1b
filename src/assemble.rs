use crate::types::{LinkItem, ProcessedTopic, Topic};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub const UNTITLED: &str = "Untitled Link";
pub const NO_DESCRIPTION: &str = "No description available";

/// Merges provider results that share a topic (case-insensitive) and drops
/// repeated URLs within a topic, keeping the first occurrence.
///
/// Topic order is the order of first appearance.
pub fn group_processed_topics(
    batches: impl IntoIterator<Item = ProcessedTopic>,
) -> Vec<ProcessedTopic> {
    let mut grouped: Vec<ProcessedTopic> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for batch in batches {
        let key = batch.topic.trim().to_lowercase();
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            grouped.push(ProcessedTopic {
                topic: batch.topic.clone(),
                context: None,
                links: Vec::new(),
            });
            grouped.len() - 1
        });

        let target = &mut grouped[slot];
        if target.context.is_none() {
            target.context = batch.context.clone();
        }

        for link in batch.links {
            if seen.insert((key.clone(), link.url.clone())) {
                target.links.push(link);
            }
        }
    }

    grouped.retain(|t| !t.links.is_empty());
    grouped
}

/// Turns grouped topics into user-facing link records.
///
/// Each link gets a fresh id and inherits `checked` from its topic in
/// `topic_items` (matched case-insensitively, `true` when absent).
pub fn assemble(processed_topics: &[ProcessedTopic], topic_items: &[Topic]) -> Vec<LinkItem> {
    let checked: HashMap<String, bool> = topic_items
        .iter()
        .map(|t| (t.topic.trim().to_lowercase(), t.checked))
        .collect();

    processed_topics
        .iter()
        .flat_map(|processed| {
            let topic_checked = checked
                .get(&processed.topic.trim().to_lowercase())
                .copied()
                .unwrap_or(true);

            processed.links.iter().map(move |link| LinkItem {
                id: Uuid::new_v4().to_string(),
                topic: processed.topic.clone(),
                url: link.url.clone(),
                title: clean_title(&link.title, &processed.topic),
                description: non_blank(&link.description, NO_DESCRIPTION),
                context: processed
                    .context
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(String::from),
                checked: topic_checked,
            })
        })
        .collect()
}

/// Removes a leading repetition of `topic` from `title`.
///
/// Strips an exact repetition, or one followed by `" - "` or `": "`, ignoring
/// case. A title that would end up empty is kept as it was.
pub fn clean_title(title: &str, topic: &str) -> String {
    let title = title.trim();
    let topic = topic.trim();
    if title.is_empty() {
        return UNTITLED.to_string();
    }
    if topic.is_empty() {
        return title.to_string();
    }

    let Some(rest) = strip_prefix_ignore_case(title, topic) else {
        return title.to_string();
    };

    let stripped = if rest.is_empty() {
        ""
    } else if let Some(after) = rest.strip_prefix(" - ").or_else(|| rest.strip_prefix(": ")) {
        after.trim()
    } else {
        return title.to_string();
    };

    if stripped.is_empty() {
        title.to_string()
    } else {
        stripped.to_string()
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    (head.to_lowercase() == prefix.to_lowercase()).then(|| &text[prefix.len()..])
}

fn non_blank(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawLink;

    fn link(url: &str, title: &str) -> RawLink {
        RawLink {
            url: url.to_string(),
            title: title.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_title_equal_to_topic_is_kept() {
        assert_eq!(clean_title("AI Ethics", "AI Ethics"), "AI Ethics");
    }

    #[test]
    fn test_title_with_separator_is_stripped() {
        assert_eq!(clean_title("AI Ethics - Deep Dive", "AI Ethics"), "Deep Dive");
        assert_eq!(clean_title("ai ethics: A Primer", "AI Ethics"), "A Primer");
    }

    #[test]
    fn test_title_without_separator_is_untouched() {
        assert_eq!(clean_title("AI Ethicsmith", "AI Ethics"), "AI Ethicsmith");
        assert_eq!(clean_title("The AI Ethics Debate", "AI Ethics"), "The AI Ethics Debate");
        assert_eq!(clean_title("AI Ethics -  ", "AI Ethics"), "AI Ethics -");
    }

    #[test]
    fn test_blank_title_gets_placeholder() {
        assert_eq!(clean_title("  ", "AI Ethics"), UNTITLED);
    }

    #[test]
    fn test_assemble_defaults() {
        let processed = vec![ProcessedTopic {
            topic: "AI Ethics".to_string(),
            context: Some("  ".to_string()),
            links: vec![link("https://plato.stanford.edu/entries/ethics-ai/", "AI Ethics - Deep Dive")],
        }];

        let items = assemble(&processed, &[]);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Deep Dive");
        assert_eq!(items[0].description, NO_DESCRIPTION);
        assert_eq!(items[0].context, None);
        assert!(items[0].checked);
    }

    #[test]
    fn test_assemble_inherits_checked_and_ids_are_unique() {
        let processed = vec![ProcessedTopic {
            topic: "Chess".to_string(),
            context: Some("Openings".to_string()),
            links: vec![
                link("https://www.chess.com/openings", "Openings"),
                link("https://en.wikipedia.org/wiki/Chess", "Chess"),
            ],
        }];
        let mut topic = Topic::new("chess", "");
        topic.checked = false;

        let items = assemble(&processed, &[topic]);

        assert!(items.iter().all(|i| !i.checked));
        assert_ne!(items[0].id, items[1].id);
        assert_eq!(items[0].context.as_deref(), Some("Openings"));
    }

    #[test]
    fn test_grouping_collapses_identical_pairs() {
        let from_generation = ProcessedTopic {
            topic: "Chess".to_string(),
            context: Some("Openings".to_string()),
            links: vec![link("https://en.wikipedia.org/wiki/Chess", "Chess")],
        };
        let from_search = ProcessedTopic {
            topic: "chess".to_string(),
            context: None,
            links: vec![
                link("https://en.wikipedia.org/wiki/Chess", "Chess - Wikipedia"),
                link("https://www.chess.com/openings", "Openings"),
            ],
        };

        let grouped = group_processed_topics(vec![from_generation, from_search]);

        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].topic, "Chess");
        assert_eq!(grouped[0].context.as_deref(), Some("Openings"));
        assert_eq!(grouped[0].links.len(), 2);
        assert_eq!(grouped[0].links[0].title, "Chess");
    }
}
