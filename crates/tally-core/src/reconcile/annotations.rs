use crate::case_id::extract_case_id;
use crate::model::IssueSummary;
use regex::Regex;
use std::collections::BTreeMap;

pub const NO_TICKET: &str = "no ticket";

/// Issue states meaning the referenced defect was already fixed.
const RESOLVED_STATES: [&str; 2] = ["Closed", "Fixed"];

const FIXED_STILL_FAIL: &str = "fixed still fail";
const KNOWN_FW_ISSUE: &str = "known fw issue";

/// Known-issue annotations keyed by case id. The first annotation recorded
/// for a case wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownIssues {
    entries: BTreeMap<String, String>,
}

impl KnownIssues {
    pub fn get(&self, case_id: &str) -> Option<&str> {
        self.entries.get(case_id).map(String::as_str)
    }

    pub fn contains(&self, case_id: &str) -> bool {
        self.entries.contains_key(case_id)
    }

    /// Returns false (and keeps the existing entry) if the case is already annotated.
    pub fn record(&mut self, case_id: &str, annotation: String) -> bool {
        if self.entries.contains_key(case_id) {
            return false;
        }
        self.entries.insert(case_id.to_string(), annotation);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Open bug tickets filed against specific cases, keyed by case id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BugTickets {
    entries: BTreeMap<String, String>,
}

impl BugTickets {
    /// Maps each issue whose summary names a case id to that case. Later
    /// issues for the same case replace earlier ones.
    pub fn from_issues(issues: &[IssueSummary]) -> Self {
        let mut entries = BTreeMap::new();
        for issue in issues {
            if let Some(case_id) = extract_case_id(&issue.summary) {
                entries.insert(case_id.to_string(), issue.key.clone());
            }
        }
        Self { entries }
    }

    pub fn get(&self, case_id: &str) -> Option<&str> {
        self.entries.get(case_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Finds `<PREFIX>-<digits>` issue references in CI error text.
#[derive(Debug, Clone)]
pub struct IssueReferenceMatcher {
    re: Regex,
}

impl IssueReferenceMatcher {
    pub fn new(prefix: &str) -> anyhow::Result<Self> {
        let re = Regex::new(&format!(r"(?i){}-[0-9]{{2,20}}", regex::escape(prefix)))?;
        Ok(Self { re })
    }

    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.re.find(text).map(|m| m.as_str())
    }

    /// The issue key of a previously written known-issue annotation
    /// (`"<KEY> -- fixed still fail"` or `"<KEY> -- known fw issue"`).
    /// Bug tickets and `no ticket` are not known-issue annotations.
    pub fn stored_annotation<'t>(&self, cell: &'t str) -> Option<&'t str> {
        let (key, tail) = cell.trim().split_once(" -- ")?;
        if tail != FIXED_STILL_FAIL && tail != KNOWN_FW_ISSUE {
            return None;
        }
        self.re
            .find(key)
            .filter(|m| m.start() == 0 && m.end() == key.len())
            .map(|m| m.as_str())
    }
}

/// `"<KEY> -- fixed still fail"` when the referenced issue is resolved,
/// `"<KEY> -- known fw issue"` otherwise.
pub fn known_issue_annotation(key: &str, status: Option<&str>) -> String {
    let fixed = status.is_some_and(|s| RESOLVED_STATES.contains(&s));
    let tail = if fixed { FIXED_STILL_FAIL } else { KNOWN_FW_ISSUE };
    format!("{} -- {}", key, tail)
}

/// Known-issue annotation first, then a bug ticket, then `no ticket`.
pub fn resolve_annotation<'a>(
    case_id: &str,
    known: &'a KnownIssues,
    bugs: &'a BugTickets,
) -> &'a str {
    known
        .get(case_id)
        .or_else(|| bugs.get(case_id))
        .unwrap_or(NO_TICKET)
}
