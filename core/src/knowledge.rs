use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One entry of `knowledge.json`. Configuration order is significant: it is
/// the tie-breaker for every lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct KnowledgeEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Answer text handed to the response generator.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Extra phrases matched against the query by containment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Keyword,
    Semantic,
    Hybrid,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Keyword => "keyword",
            SearchMode::Semantic => "semantic",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextProcessing {
    #[serde(default)]
    pub stopwords: Vec<String>,
    #[serde(default = "default_min_token_match")]
    pub min_token_match: usize,
}

impl Default for TextProcessing {
    fn default() -> Self {
        Self {
            stopwords: Vec::new(),
            min_token_match: default_min_token_match(),
        }
    }
}

fn default_min_token_match() -> usize {
    1
}

/// `search` section of the persona document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default)]
    pub text_processing: TextProcessing,
}

/// Relevance of an entry for a query. Compared lexicographically: any pattern
/// hit outranks any amount of token overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct MatchScore {
    pub pattern_hits: usize,
    pub token_overlap: usize,
}

impl MatchScore {
    fn is_positive(&self) -> bool {
        self.pattern_hits > 0 || self.token_overlap > 0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KnowledgeMatch<'a> {
    pub entry: &'a KnowledgeEntry,
    pub score: MatchScore,
}

#[derive(Debug, Clone, Default)]
struct Tokenizer {
    stopwords: HashSet<String>,
}

impl Tokenizer {
    fn new(stopwords: &[String]) -> Self {
        Self {
            stopwords: stopwords.iter().map(|s| s.to_lowercase()).collect(),
        }
    }

    /// Lowercase alphabetic runs, minus stopwords.
    fn tokenize(&self, text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_ascii_alphabetic())
            .filter(|t| !t.is_empty())
            .map(str::to_ascii_lowercase)
            .filter(|t| !self.stopwords.contains(t))
            .collect()
    }
}

#[derive(Debug, Clone)]
struct IndexedEntry {
    entry: KnowledgeEntry,
    tokens: HashSet<String>,
    patterns: Vec<String>,
}

/// Flat, ordered knowledge collection with token and phrase indexes built at
/// load time.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<IndexedEntry>,
    tokenizer: Tokenizer,
    min_token_match: usize,
    mode: SearchMode,
}

impl KnowledgeBase {
    pub fn new(entries: Vec<KnowledgeEntry>, search: &SearchConfig) -> Self {
        let tokenizer = Tokenizer::new(&search.text_processing.stopwords);
        let entries = entries
            .into_iter()
            .map(|entry| {
                let combined = format!(
                    "{} {} {}",
                    entry.title,
                    entry.content,
                    entry.patterns.join(" ")
                );
                IndexedEntry {
                    tokens: tokenizer.tokenize(&combined),
                    patterns: crate::intent::lowercase_phrases(&entry.patterns),
                    entry,
                }
            })
            .collect();

        Self {
            entries,
            tokenizer,
            min_token_match: search.text_processing.min_token_match.max(1),
            mode: search.mode,
        }
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &KnowledgeEntry> {
        self.entries.iter().map(|e| &e.entry)
    }

    fn scores<'a>(&'a self, query: &str) -> impl Iterator<Item = (&'a IndexedEntry, MatchScore)> + 'a {
        let lowered = query.to_lowercase();
        let query_tokens = self.tokenizer.tokenize(query);
        self.entries.iter().map(move |indexed| {
            let score = MatchScore {
                pattern_hits: indexed
                    .patterns
                    .iter()
                    .filter(|p| lowered.contains(p.as_str()))
                    .count(),
                token_overlap: query_tokens.intersection(&indexed.tokens).count(),
            };
            (indexed, score)
        })
    }

    fn is_keyword_match(&self, score: &MatchScore) -> bool {
        score.pattern_hits > 0 || score.token_overlap >= self.min_token_match
    }

    /// Highest-scoring matching entry. Ties go to the entry defined first.
    pub fn best_match(&self, query: &str) -> Option<KnowledgeMatch<'_>> {
        let mut best: Option<KnowledgeMatch<'_>> = None;
        for (indexed, score) in self.scores(query) {
            if !self.is_keyword_match(&score) {
                continue;
            }
            if best.is_none_or(|b| score > b.score) {
                best = Some(KnowledgeMatch {
                    entry: &indexed.entry,
                    score,
                });
            }
        }
        best
    }

    /// Ranked search using the configured mode.
    pub fn search(&self, query: &str) -> Vec<&KnowledgeEntry> {
        self.search_with_mode(query, self.mode)
    }

    pub fn search_with_mode(&self, query: &str, mode: SearchMode) -> Vec<&KnowledgeEntry> {
        match mode {
            SearchMode::Keyword => self.keyword_search(query),
            SearchMode::Semantic => self.semantic_search(query),
            SearchMode::Hybrid => {
                let mut seen = HashSet::new();
                let mut merged = Vec::new();
                for entry in self
                    .keyword_search(query)
                    .into_iter()
                    .chain(self.semantic_search(query))
                {
                    if seen.insert(entry.id.as_str()) {
                        merged.push(entry);
                    }
                }
                merged
            }
        }
    }

    fn keyword_search(&self, query: &str) -> Vec<&KnowledgeEntry> {
        self.scores(query)
            .filter(|(_, score)| self.is_keyword_match(score))
            .map(|(indexed, _)| &indexed.entry)
            .collect()
    }

    fn semantic_search(&self, query: &str) -> Vec<&KnowledgeEntry> {
        let mut scored: Vec<_> = self
            .scores(query)
            .filter(|(_, score)| score.is_positive())
            .collect();
        // Stable sort keeps configuration order among equal scores.
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.into_iter().map(|(indexed, _)| &indexed.entry).collect()
    }

    /// Generic guidance for an intent when the query itself matched nothing:
    /// the first entry whose category is the intent name.
    pub fn fallback_for_intent(&self, intent: &str) -> Option<&KnowledgeEntry> {
        self.entries()
            .find(|entry| entry.category.as_deref() == Some(intent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: &str, content: &str, category: &str) -> KnowledgeEntry {
        KnowledgeEntry {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            category: Some(category.to_string()),
            patterns: Vec::new(),
        }
    }

    fn search_config(mode: SearchMode, stopwords: &[&str], min_token_match: usize) -> SearchConfig {
        SearchConfig {
            mode,
            text_processing: TextProcessing {
                stopwords: stopwords.iter().map(|s| s.to_string()).collect(),
                min_token_match,
            },
        }
    }

    fn sample_kb(mode: SearchMode) -> KnowledgeBase {
        KnowledgeBase::new(
            vec![
                entry("kb-1", "Password reset", "Use the forgot password link to reset your password.", "account"),
                entry("kb-2", "Refund policy", "Refunds are issued within 5 business days.", "billing"),
                entry("kb-3", "Refund status", "Check refund status and password settings in your account.", "billing"),
            ],
            &search_config(mode, &["the", "my", "to", "i", "how", "do"], 1),
        )
    }

    #[test]
    fn best_match_returns_highest_token_overlap() {
        let kb = sample_kb(SearchMode::Keyword);
        let m = kb.best_match("how do I check my refund status").unwrap();
        assert_eq!(m.entry.id, "kb-3");
        assert_eq!(m.score.token_overlap, 3);
    }

    #[test]
    fn best_match_ties_go_to_first_defined_entry() {
        let kb = sample_kb(SearchMode::Keyword);
        let m = kb.best_match("refund").unwrap();
        assert_eq!(m.entry.id, "kb-2");
    }

    #[test]
    fn no_match_for_unrelated_query() {
        let kb = sample_kb(SearchMode::Keyword);
        assert!(kb.best_match("what's the weather like").is_none());
        assert!(kb.search("what's the weather like").is_empty());
    }

    #[test]
    fn empty_knowledge_base_returns_no_match() {
        let kb = KnowledgeBase::new(Vec::new(), &SearchConfig::default());
        assert!(kb.is_empty());
        assert!(kb.best_match("refund").is_none());
        assert!(kb.search("refund").is_empty());
    }

    #[test]
    fn stopword_only_query_matches_nothing() {
        let kb = sample_kb(SearchMode::Keyword);
        assert!(kb.best_match("how do I").is_none());
    }

    #[test]
    fn pattern_hit_outranks_token_overlap() {
        let mut with_pattern = entry("kb-9", "Agents", "Human support hours.", "support");
        with_pattern.patterns = vec!["Opening Hours".to_string()];
        let kb = KnowledgeBase::new(
            vec![
                entry("kb-1", "Store hours", "Store opening hours are listed online.", "general"),
                with_pattern,
            ],
            &SearchConfig::default(),
        );

        let m = kb.best_match("what are your opening hours").unwrap();
        assert_eq!(m.entry.id, "kb-9");
        assert_eq!(m.score.pattern_hits, 1);
    }

    #[test]
    fn min_token_match_filters_weak_keyword_hits() {
        let kb = KnowledgeBase::new(
            vec![entry("kb-1", "Refund policy", "Refunds are issued quickly.", "billing")],
            &search_config(SearchMode::Keyword, &[], 2),
        );
        assert!(kb.best_match("refund").is_none());
        assert!(kb.best_match("refund policy").is_some());
    }

    #[test]
    fn keyword_search_preserves_configuration_order() {
        let kb = sample_kb(SearchMode::Keyword);
        let ids: Vec<_> = kb.search("refund status").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["kb-2", "kb-3"]);
    }

    #[test]
    fn semantic_search_ranks_by_score() {
        let kb = sample_kb(SearchMode::Semantic);
        let ids: Vec<_> = kb.search("refund status").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["kb-3", "kb-2"]);
    }

    #[test]
    fn hybrid_search_deduplicates_by_id() {
        let kb = KnowledgeBase::new(
            vec![
                entry("kb-1", "Password reset", "Reset your password here.", "account"),
                entry("kb-2", "Password policy", "Passwords need twelve characters.", "account"),
            ],
            &search_config(SearchMode::Hybrid, &[], 2),
        );
        let ids: Vec<_> = kb.search("reset password").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["kb-1", "kb-2"]);
    }

    #[test]
    fn fallback_for_intent_uses_category() {
        let kb = sample_kb(SearchMode::Keyword);
        assert_eq!(kb.fallback_for_intent("billing").unwrap().id, "kb-2");
        assert!(kb.fallback_for_intent("shipping").is_none());
    }
}
