use crate::llm::GenerationRequest;
use crate::types::Topic;

/// The `PromptBuilder` struct assembles the requests sent to the generation capability.
/// It collects the constraints for one call and renders them into instructions plus content.
pub struct PromptBuilder {
    /// How many results the provider must return.
    count: usize,
    /// Topics the provider must stay away from.
    avoid: Vec<String>,
    /// Domains the provider must not cite.
    excluded_domains: Vec<String>,
}

impl PromptBuilder {
    /// Creates a new `PromptBuilder` asking for `count` results.
    pub fn new(count: usize) -> Self {
        Self {
            count,
            avoid: Vec::new(),
            excluded_domains: Vec::new(),
        }
    }

    /// Adds topics the provider must not return.
    pub fn avoiding(mut self, avoid: &[String]) -> Self {
        self.avoid = avoid.iter().filter(|t| !t.trim().is_empty()).cloned().collect();
        self
    }

    /// Adds domains the provider must not cite.
    pub fn excluding_domains(mut self, domains: &[String]) -> Self {
        self.excluded_domains = domains.to_vec();
        self
    }

    /// Builds the topic extraction request for a transcript.
    pub fn topics(&self, transcript: &str) -> GenerationRequest {
        let mut instructions = format!(
            "You identify the most interesting topics discussed in a podcast transcript.\n\
             Return exactly {count} topics.\n\
             Each topic must be 1 to 10 words long and paired with a short context sentence \
             explaining why it matters in the conversation.\n\
             When a book is mentioned, name the topic in the form \"Title by Author\".\n\
             Respond with JSON only, shaped as {{\"topics\": [{{\"topic\": \"...\", \"context\": \"...\"}}]}}.",
            count = self.count
        );

        if !self.avoid.is_empty() {
            instructions.push_str(&format!(
                "\nDo not return these topics or anything overlapping them: {}.",
                self.avoid.join(", ")
            ));
        }

        GenerationRequest {
            instructions,
            content: Self::clean_text(transcript),
            structured_output: true,
        }
    }

    /// Builds the link finding request for one topic.
    pub fn links(&self, topic: &Topic) -> GenerationRequest {
        let mut instructions = format!(
            "You find authoritative, currently reachable web pages about a topic.\n\
             Return up to {count} links. Prefer primary sources, reference works and reputable publishers.\n\
             Only return URLs you are confident exist; never invent or guess a URL.\n\
             Respond with JSON only, shaped as \
             {{\"topics\": [{{\"topic\": \"...\", \"links\": [{{\"url\": \"...\", \"title\": \"...\", \"description\": \"...\"}}]}}]}}.",
            count = self.count
        );

        if !self.excluded_domains.is_empty() {
            instructions.push_str(&format!(
                "\nNever use links from these domains: {}.",
                self.excluded_domains.join(", ")
            ));
        }

        let mut content = format!("Topic: {}", topic.topic);
        if !topic.context.trim().is_empty() {
            content.push_str(&format!("\nContext: {}", topic.context.trim()));
        }

        GenerationRequest {
            instructions,
            content,
            structured_output: true,
        }
    }

    /// Cleans the given text by removing blank lines and normalizing whitespace.
    fn clean_text(text: &str) -> String {
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.split_whitespace().collect::<Vec<&str>>().join(" "))
            .collect::<Vec<String>>()
            .join("\n")
    }
}
