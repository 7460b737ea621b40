use regex::Regex;
use std::sync::OnceLock;

fn case_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)C[0-9]{2,20}").expect("valid case id regex"))
}

/// Returns the first `C<digits>` identifier in a free-text test name.
///
/// Matching is case-insensitive and the identifier is returned exactly as it
/// appears in `name`. Between 2 and 20 digits are taken.
pub fn extract_case_id(name: &str) -> Option<&str> {
    case_id_regex().find(name).map(|m| m.as_str())
}
