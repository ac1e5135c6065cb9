//! Text normalization shared by the ingest path and the query path.
//!
//! Tokenization is byte-exact ASCII: anything outside `[A-Za-z]` acts as
//! a separator, letters are lowercased, runs of separators collapse.
//! The stop list is a fixed constant so index-time and query-time
//! filtering can never drift apart.

/// Common English function words, sorted for binary search. ASCII only.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him",
    "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more",
    "most", "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other",
    "our", "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such", "than",
    "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this",
    "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were",
    "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would",
    "you", "your", "yours",
];

/// Tokenize text into lowercase alphabetic tokens.
///
/// Every character outside `[A-Za-z]` is treated as whitespace; ASCII
/// letters are lowercased; empty tokens are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if c.is_ascii_alphabetic() {
            current.push(c.to_ascii_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Check whether a (already lowercased) token is a stop-word.
pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.binary_search(&token).is_ok()
}

/// Query-side term extraction: tokenize, then drop stop-words and
/// tokens shorter than two characters.
pub fn query_terms(query: &str) -> Vec<String> {
    tokenize(query)
        .into_iter()
        .filter(|t| t.len() >= 2 && !is_stopword(t))
        .collect()
}

/// Tokenize and drop stop-words, keeping short tokens. Used by the
/// index writer so document lengths match the query-side model.
pub fn index_terms(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|t| !is_stopword(t))
        .collect()
}
