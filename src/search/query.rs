//! Search query builder.
//!
//! Turns stage-one product fields into a web query.

/// Builder for constructing search queries.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    /// File type filter.
    filetype: Option<String>,
    /// Search terms.
    terms: Vec<String>,
    /// Exact phrase matches.
    phrases: Vec<String>,
}

impl QueryBuilder {
    /// Create a new query builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by file type.
    pub fn filetype(mut self, ext: &str) -> Self {
        self.filetype = Some(ext.to_string());
        self
    }

    /// Add a search term.
    pub fn term(mut self, term: &str) -> Self {
        let term = term.trim();
        if !term.is_empty() {
            self.terms.push(term.to_string());
        }
        self
    }

    /// Add an exact phrase match.
    pub fn phrase(mut self, phrase: &str) -> Self {
        let phrase = phrase.trim().trim_matches('"');
        if !phrase.is_empty() {
            self.phrases.push(phrase.to_string());
        }
        self
    }

    /// True when no phrase or term has been added.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.phrases.is_empty()
    }

    /// Build the final query string.
    pub fn build(&self) -> String {
        let mut parts = Vec::new();

        for phrase in &self.phrases {
            parts.push(format!("\"{}\"", phrase));
        }

        for term in &self.terms {
            parts.push(term.clone());
        }

        if let Some(ref ft) = self.filetype {
            parts.push(format!("filetype:{}", ft));
        }

        parts.join(" ")
    }
}
