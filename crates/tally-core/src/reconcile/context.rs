use super::annotations::{known_issue_annotation, BugTickets, IssueReferenceMatcher, KnownIssues};
use super::table::CaseTable;
use crate::providers::IssueTracker;

/// State owned by one reconciliation run: annotation caches shared by every
/// tracked job, and the pattern used to find issue references.
#[derive(Debug, Clone)]
pub struct ReconcileContext {
    pub known_issues: KnownIssues,
    pub bug_tickets: BugTickets,
    matcher: IssueReferenceMatcher,
}

impl ReconcileContext {
    pub fn new(known_issue_prefix: &str) -> anyhow::Result<Self> {
        Ok(Self {
            known_issues: KnownIssues::default(),
            bug_tickets: BugTickets::default(),
            matcher: IssueReferenceMatcher::new(known_issue_prefix)?,
        })
    }

    /// Carries known-issue annotations written by an earlier run into this
    /// one. Returns how many were taken; a case already annotated keeps its
    /// entry.
    pub fn seed_from_table(&mut self, table: &CaseTable) -> usize {
        let mut seeded = 0;
        for row in table.rows() {
            let Some(cell) = row.known_issue.as_deref() else {
                continue;
            };
            if self.matcher.stored_annotation(cell).is_none() {
                continue;
            }
            if self.known_issues.record(&row.case_id, cell.trim().to_string()) {
                seeded += 1;
            }
        }
        seeded
    }

    /// Runs the bug query once and indexes the results by case id.
    pub async fn load_bug_tickets(
        &mut self,
        tracker: &dyn IssueTracker,
        jql: &str,
    ) -> anyhow::Result<()> {
        let issues = tracker.search_issues(jql).await?;
        self.bug_tickets = BugTickets::from_issues(&issues);
        tracing::info!(
            event = "bug_tickets_loaded",
            issues = issues.len(),
            cases = self.bug_tickets.len()
        );
        Ok(())
    }

    /// Annotates `case_id` from a CI error text, querying the tracker only
    /// when the text references an issue and the case has no annotation yet.
    pub async fn annotate_from_error(
        &mut self,
        tracker: &dyn IssueTracker,
        case_id: &str,
        error_text: &str,
    ) {
        if self.known_issues.contains(case_id) {
            return;
        }
        let Some(reference) = self.matcher.find(error_text) else {
            return;
        };
        let reference = reference.to_string();
        match tracker.get_issue(&reference).await {
            Ok(issue) => {
                let annotation = known_issue_annotation(&reference, issue.status.as_deref());
                tracing::debug!(
                    event = "known_issue",
                    case_id = %case_id,
                    annotation = %annotation
                );
                self.known_issues.record(case_id, annotation);
            }
            Err(e) => {
                tracing::warn!(
                    event = "known_issue_lookup_failed",
                    case_id = %case_id,
                    issue = %reference,
                    error = %e,
                    "failed to resolve known issue"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CaseRow;
    use std::collections::BTreeSet;

    fn row(case_id: &str, known: Option<&str>) -> CaseRow {
        let mut r = CaseRow::new(case_id);
        r.known_issue = known.map(str::to_string);
        r
    }

    #[test]
    fn test_seed_takes_stored_known_issues_only() {
        let table = CaseTable::from_rows(
            vec![
                row("C100", Some("JIRAFICS-4821 -- fixed still fail")),
                row("C200", Some("ATOM-77")),
                row("C300", Some("no ticket")),
                row("C400", None),
            ],
            BTreeSet::new(),
        );
        let mut ctx = ReconcileContext::new("JIRAFICS").unwrap();
        assert_eq!(ctx.seed_from_table(&table), 1);
        assert_eq!(
            ctx.known_issues.get("C100"),
            Some("JIRAFICS-4821 -- fixed still fail")
        );
        assert_eq!(ctx.known_issues.len(), 1);
    }

    #[test]
    fn test_seed_does_not_replace_existing_entry() {
        let mut ctx = ReconcileContext::new("JIRAFICS").unwrap();
        ctx.known_issues
            .record("C100", "JIRAFICS-10 -- known fw issue".into());
        let table = CaseTable::from_rows(
            vec![row("C100", Some("JIRAFICS-11 -- fixed still fail"))],
            BTreeSet::new(),
        );
        assert_eq!(ctx.seed_from_table(&table), 0);
        assert_eq!(
            ctx.known_issues.get("C100"),
            Some("JIRAFICS-10 -- known fw issue")
        );
    }
}
