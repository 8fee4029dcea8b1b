//! Renderings of the checked link items, grouped by topic.

use crate::types::LinkItem;
use std::fmt::Write;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    PlainText,
    Html,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "txt" | "text" | "plain" => Ok(ExportFormat::PlainText),
            "html" | "htm" => Ok(ExportFormat::Html),
            other => Err(format!("unknown export format '{}'", other)),
        }
    }
}

/// Checked items grouped by topic, topics in order of first appearance.
pub fn group_checked(items: &[LinkItem]) -> Vec<(&str, Vec<&LinkItem>)> {
    let mut groups: Vec<(&str, Vec<&LinkItem>)> = Vec::new();
    for item in items.iter().filter(|i| i.checked) {
        match groups.iter_mut().find(|(topic, _)| *topic == item.topic) {
            Some((_, members)) => members.push(item),
            None => groups.push((item.topic.as_str(), vec![item])),
        }
    }
    groups
}

pub fn render(items: &[LinkItem], format: ExportFormat) -> String {
    match format {
        ExportFormat::Markdown => to_markdown(items),
        ExportFormat::PlainText => to_plain_text(items),
        ExportFormat::Html => to_html(items),
    }
}

pub fn to_markdown(items: &[LinkItem]) -> String {
    let mut out = String::new();
    for (topic, links) in group_checked(items) {
        let _ = writeln!(out, "## {}\n", topic);
        for link in links {
            let _ = writeln!(out, "- [{}]({}) - {}", link.title, link.url, link.description);
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

pub fn to_plain_text(items: &[LinkItem]) -> String {
    let mut out = String::new();
    for (topic, links) in group_checked(items) {
        let _ = writeln!(out, "{}", topic);
        for link in links {
            let _ = writeln!(out, "  {}: {}", link.title, link.url);
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

pub fn to_html(items: &[LinkItem]) -> String {
    let mut out = String::new();
    for (topic, links) in group_checked(items) {
        let _ = writeln!(out, "<h2>{}</h2>\n<ul>", escape_html(topic));
        for link in links {
            let _ = writeln!(
                out,
                "  <li><a href=\"{}\">{}</a> - {}</li>",
                escape_html(&link.url),
                escape_html(&link.title),
                escape_html(&link.description)
            );
        }
        out.push_str("</ul>\n");
    }
    out.trim_end().to_string()
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

#[cfg(test)]
mod tests {
    use super::*;

    fn item(topic: &str, title: &str, url: &str, checked: bool) -> LinkItem {
        LinkItem {
            id: format!("{}-{}", topic, title),
            topic: topic.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            description: "desc".to_string(),
            context: None,
            checked,
        }
    }

    fn items() -> Vec<LinkItem> {
        vec![
            item("Chess", "Openings", "https://www.chess.com/openings", true),
            item("Stoicism", "SEP", "https://plato.stanford.edu/entries/stoicism/", true),
            item("Chess", "Hidden", "https://www.chess.com/hidden", false),
            item("Chess", "Wiki", "https://en.wikipedia.org/wiki/Chess", true),
        ]
    }

    #[test]
    fn test_groups_checked_items_by_topic() {
        let items = items();
        let groups = group_checked(&items);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "Chess");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "Stoicism");
    }

    #[test]
    fn test_markdown() {
        let markdown = to_markdown(&items());

        assert!(markdown.starts_with("## Chess\n\n- [Openings](https://www.chess.com/openings) - desc"));
        assert!(markdown.contains("## Stoicism"));
        assert!(!markdown.contains("Hidden"));
    }

    #[test]
    fn test_plain_text() {
        let text = to_plain_text(&items());

        assert!(text.contains("Chess\n  Openings: https://www.chess.com/openings\n  Wiki: https://en.wikipedia.org/wiki/Chess"));
    }

    #[test]
    fn test_html_escapes() {
        let html = to_html(&[item("R&D", "<b>Lab</b>", "https://www.nature.com/?a=1&b=2", true)]);

        assert!(html.contains("<h2>R&amp;D</h2>"));
        assert!(html.contains("&lt;b&gt;Lab&lt;/b&gt;"));
        assert!(html.contains("href=\"https://www.nature.com/?a=1&amp;b=2\""));
    }

    #[test]
    fn test_nothing_checked_is_empty() {
        let items = vec![item("Chess", "Hidden", "https://www.chess.com/hidden", false)];
        assert!(render(&items, ExportFormat::Markdown).is_empty());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!("HTML".parse::<ExportFormat>().unwrap(), ExportFormat::Html);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
