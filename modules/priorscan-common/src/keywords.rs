//! Deterministic keyword and query extraction.
//!
//! This is the fallback path when AI expansion is unavailable, and the
//! reason identical submissions always resolve to identical cache keys:
//! no randomness, no ordering dependence on anything but the input text.

/// Common English filler plus generic invention jargon. Dropping the jargon
/// skews queries toward the terms that actually distinguish one invention
/// from another.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "are", "was", "were",
    "has", "have", "had", "can", "will", "would", "could", "should", "into",
    "onto", "out", "its", "their", "your", "our", "all", "any", "each",
    "when", "where", "which", "while", "than", "then", "them", "they", "you",
    "not", "but", "use", "used", "uses", "using", "also", "more", "most",
    "very", "such", "some", "other", "about", "through", "between",
    // invention jargon
    "device", "smart", "novel", "innovative", "invention", "product",
    "system", "solution", "technology", "unique", "new", "improved",
    "better", "easy", "simple", "idea",
];

/// Max distinguishing terms kept per input field.
const MAX_TERMS_PER_FIELD: usize = 5;

/// Max queries returned by [`generate_search_queries`].
const MAX_QUERIES: usize = 5;

/// Max per-feature queries contributed to the final list.
const MAX_FEATURE_QUERIES: usize = 3;

/// Extract the top distinguishing terms from free text, space-joined.
///
/// Lowercases, strips non-alphanumerics, drops stop words and tokens of two
/// characters or fewer, and keeps the first five unique survivors in input
/// order.
pub fn extract_keywords(text: &str) -> String {
    let mut seen = Vec::new();

    for raw in text.to_lowercase().split_whitespace() {
        let token: String = raw.chars().filter(|c| c.is_alphanumeric()).collect();
        if token.len() <= 2 || STOP_WORDS.contains(&token.as_str()) {
            continue;
        }
        if !seen.contains(&token) {
            seen.push(token);
            if seen.len() >= MAX_TERMS_PER_FIELD {
                break;
            }
        }
    }

    seen.join(" ")
}

/// Compose a deduplicated search query list from the raw request fields.
///
/// One query per field: invention name keywords, description keywords,
/// problem keywords suffixed with "solution", and up to three per-feature
/// queries. Capped at five total.
pub fn generate_search_queries(
    name: &str,
    description: &str,
    problem: Option<&str>,
    features: &[String],
) -> Vec<String> {
    let mut queries = Vec::new();

    push_unique(&mut queries, extract_keywords(name));

    push_unique(&mut queries, extract_keywords(description));

    if let Some(problem) = problem {
        let keywords = extract_keywords(problem);
        if !keywords.is_empty() {
            push_unique(&mut queries, format!("{keywords} solution"));
        }
    }

    for feature in features.iter().take(MAX_FEATURE_QUERIES) {
        push_unique(&mut queries, extract_keywords(feature));
    }

    queries.truncate(MAX_QUERIES);
    queries
}

fn push_unique(queries: &mut Vec<String>, query: String) {
    if !query.is_empty() && !queries.contains(&query) {
        queries.push(query);
    }
}
