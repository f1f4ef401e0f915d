//! Text normalization and similarity for degraded-mode matching.

/// Street-type and direction spellings folded to one form.
const TOKEN_FOLDS: &[(&str, &str)] = &[
    ("street", "st"),
    ("avenue", "ave"),
    ("av", "ave"),
    ("boulevard", "blvd"),
    ("place", "pl"),
    ("road", "rd"),
    ("drive", "dr"),
    ("square", "sq"),
    ("east", "e"),
    ("west", "w"),
    ("north", "n"),
    ("south", "s"),
];

fn fold(token: &str) -> &str {
    TOKEN_FOLDS
        .iter()
        .find(|(from, _)| *from == token)
        .map_or(token, |(_, to)| *to)
}

/// Canonical matching form of a name or address.
///
/// Lowercases, treats punctuation as whitespace, collapses runs of
/// whitespace, and folds common street-suffix and direction spellings.
///
/// # Examples
///
/// ```
/// use building_registry::similarity::normalize_text;
///
/// assert_eq!(normalize_text("175 Fifth  Avenue, "), "175 fifth ave");
/// assert_eq!(normalize_text("11 W. 53rd Street"), "11 w 53rd st");
/// ```
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(fold)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Similarity of two already-normalized strings in [0.0, 1.0].
///
/// Empty input never matches anything, including another empty string.
#[must_use]
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    strsim::normalized_levenshtein(a, b)
}

/// Normalizes both inputs and returns their similarity.
#[must_use]
pub fn text_similarity(a: &str, b: &str) -> f64 {
    normalized_similarity(&normalize_text(a), &normalize_text(b))
}
