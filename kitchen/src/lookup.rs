use itertools::Itertools;

/// Trim and collapse inner whitespace, for comparing catalogue names.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().join(" ")
}

/// Rank catalogue names against a search query.
///
/// Matching is case-insensitive. Exact matches come first, then names starting with the
/// query, then names containing it; ties are alphabetical. An empty query matches nothing.
pub fn rank_matches<'a, S: AsRef<str>>(names: &'a [S], query: &str, limit: usize) -> Vec<&'a S> {
    let query = normalize_name(query).to_lowercase();
    if query.is_empty() {
        return vec![];
    }
    names
        .iter()
        .filter_map(|name| {
            let lower = name.as_ref().to_lowercase();
            let rank = if lower == query {
                0
            } else if lower.starts_with(&query) {
                1
            } else if lower.contains(&query) {
                2
            } else {
                return None;
            };
            Some((rank, lower, name))
        })
        .sorted_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .take(limit)
        .map(|(_, _, name)| name)
        .collect()
}
