use scraper::{Html, Selector};
use std::collections::HashMap;
use tracing::instrument;

/// Page details pulled out of fetched markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSummary {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// The `PageInspector` struct extracts the title and description of an HTML page.
/// Each field has an ordered list of CSS selectors; the first one yielding text wins.
pub struct PageInspector {
    /// Selectors per metadata key, tried in order.
    metadata_selectors: HashMap<String, Vec<Selector>>,
}

impl Default for PageInspector {
    /// Provides the selectors used by the deep URL validator.
    fn default() -> Self {
        let metadata_selectors = [
            ("title", vec!["title", "meta[property='og:title']", "h1"]),
            (
                "description",
                vec![
                    "meta[name='description']",
                    "meta[property='og:description']",
                    "meta[name='twitter:description']",
                ],
            ),
        ];

        Self::new(metadata_selectors)
    }
}

impl PageInspector {
    /// Creates a new `PageInspector` with the given metadata selectors.
    ///
    /// # Arguments
    ///
    /// * `metadata_selectors` - Pairs of metadata key and the CSS selectors to try for it. Selectors that fail to parse are skipped.
    pub fn new<K, S>(metadata_selectors: impl IntoIterator<Item = (K, Vec<S>)>) -> Self
    where
        K: Into<String>,
        S: AsRef<str>,
    {
        let metadata_selectors = metadata_selectors
            .into_iter()
            .map(|(key, selectors)| {
                let parsed = selectors
                    .iter()
                    .filter_map(|sel| Selector::parse(sel.as_ref()).ok())
                    .collect();
                (key.into(), parsed)
            })
            .collect();

        Self { metadata_selectors }
    }

    /// Extracts the title and description from the given HTML string.
    #[instrument(skip(self, html), fields(html_length = html.len()))]
    pub fn summarize(&self, html: &str) -> PageSummary {
        let metadata = self.extract_metadata(html);

        PageSummary {
            title: metadata.get("title").cloned(),
            description: metadata.get("description").cloned(),
        }
    }

    /// Extracts every configured metadata key that has a value in the document.
    pub fn extract_metadata(&self, html: &str) -> HashMap<String, String> {
        let document = Html::parse_document(html);
        let mut metadata = HashMap::new();

        for (key, selectors) in &self.metadata_selectors {
            if let Some(value) = selectors
                .iter()
                .find_map(|selector| Self::extract_metadata_value(&document, selector))
            {
                metadata.insert(key.clone(), value);
            }
        }

        metadata
    }

    fn extract_metadata_value(document: &Html, selector: &Selector) -> Option<String> {
        document.select(selector).next().and_then(|element| {
            // meta tags carry their value in `content`
            if let Some(content) = element.value().attr("content") {
                let content = clean_text(content);
                return (!content.is_empty()).then_some(content);
            }

            let text = clean_text(&element.text().collect::<Vec<_>>().join(" "));
            (!text.is_empty()).then_some(text)
        })
    }
}

/// Collapses runs of whitespace into single spaces.
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
