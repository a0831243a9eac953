// First-match substring engine for blocked link partials.

/// Find the first blocked partial contained in `text`, if any.
///
/// The `"http"` check is a cheap pre-filter, not a URL parser: it exists to
/// skip the common case of link-free chatter and deliberately accepts false
/// positives like "shttpdoc". Comparison is lowercase substring containment;
/// partials are already stored lowercased. Rules are checked in insertion
/// order and the first hit wins - no scoring, no multi-match detection.
pub fn find_blocked_partial<'a>(text: &str, rules: &'a [String]) -> Option<&'a str> {
    if rules.is_empty() {
        return None;
    }

    let text = text.to_lowercase();
    if !text.contains("http") {
        return None;
    }

    rules
        .iter()
        .find(|partial| text.contains(partial.as_str()))
        .map(String::as_str)
}
