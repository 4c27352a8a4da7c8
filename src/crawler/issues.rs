//! Extraction issues
//!
//! Problems with individual pages never abort a crawl. They are recorded here at
//! the smallest scope that can absorb them (one field, one module, or one
//! qualification) and surfaced together at the end of the run.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Failure to pull an expected piece out of a page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// An expected element is absent
    #[error("missing {what}")]
    MissingStructure { what: &'static str },

    /// A labeled value could not be converted to its numeric type
    #[error("could not parse {field} from '{value}'")]
    FieldParse { field: &'static str, value: String },
}

impl ExtractError {
    pub fn missing(what: &'static str) -> Self {
        Self::MissingStructure { what }
    }

    pub fn field(field: &'static str, value: impl Into<String>) -> Self {
        Self::FieldParse {
            field,
            value: value.into(),
        }
    }

    /// The issue category this error is logged under
    pub fn kind(&self) -> IssueKind {
        match self {
            Self::MissingStructure { .. } => IssueKind::MissingStructure,
            Self::FieldParse { .. } => IssueKind::FieldParseFailure,
        }
    }
}

/// Category of a logged issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IssueKind {
    /// An expected table or element is absent; the record was dropped or stubbed
    MissingStructure,
    /// A numeric field was defaulted after a failed parse
    FieldParseFailure,
    /// The remote page does not exist; a stub record was used
    NotFound,
    /// A module group closed without any modules
    EmptyGroup,
    /// The page could not be retrieved at all
    FetchFailure,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingStructure => "missing_structure",
            Self::FieldParseFailure => "field_parse_failure",
            Self::NotFound => "not_found",
            Self::EmptyGroup => "empty_group",
            Self::FetchFailure => "fetch_failure",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One non-fatal extraction anomaly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub kind: IssueKind,
    /// Page the issue was found on
    pub url: String,
    pub message: String,
}

impl Issue {
    pub fn new(kind: IssueKind, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn from_error(url: impl Into<String>, error: &ExtractError) -> Self {
        Self::new(error.kind(), url, error.to_string())
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.kind, self.message, self.url)
    }
}

/// Thread-safe append-only issue list
///
/// Clones share the same underlying list.
#[derive(Debug, Clone, Default)]
pub struct IssueLog {
    issues: Arc<Mutex<Vec<Issue>>>,
}

impl IssueLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an issue and logs it
    pub fn push(&self, issue: Issue) {
        tracing::warn!("{}", issue);
        self.issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(issue);
    }

    /// Convenience for `push(Issue::new(..))`
    pub fn record(&self, kind: IssueKind, url: &str, message: impl Into<String>) {
        self.push(Issue::new(kind, url, message));
    }

    /// Convenience for logging an extraction error
    pub fn record_error(&self, url: &str, error: &ExtractError) {
        self.push(Issue::from_error(url, error));
    }

    pub fn len(&self) -> usize {
        self.issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the issues logged so far, in append order
    pub fn snapshot(&self) -> Vec<Issue> {
        self.issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of issues of one kind
    pub fn count_kind(&self, kind: IssueKind) -> usize {
        self.issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|issue| issue.kind == kind)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_extract_error_kinds() {
        assert_eq!(
            ExtractError::missing("info table").kind(),
            IssueKind::MissingStructure
        );
        assert_eq!(
            ExtractError::field("NQF level", "seven").kind(),
            IssueKind::FieldParseFailure
        );
        assert_eq!(
            ExtractError::field("NQF level", "seven").to_string(),
            "could not parse NQF level from 'seven'"
        );
    }

    #[test]
    fn test_issue_display() {
        let issue = Issue::new(
            IssueKind::NotFound,
            "https://example.com/mod/X",
            "Module X does not exist",
        );
        assert_eq!(
            issue.to_string(),
            "[not_found] Module X does not exist (https://example.com/mod/X)"
        );
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let log = IssueLog::new();
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let log = log.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        log.record(
                            IssueKind::EmptyGroup,
                            "https://example.com",
                            format!("{}-{}", worker, i),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.len(), 400);
        assert_eq!(log.count_kind(IssueKind::EmptyGroup), 400);
        assert_eq!(log.count_kind(IssueKind::NotFound), 0);
    }

    #[test]
    fn test_record_error() {
        let log = IssueLog::new();
        log.record_error("https://example.com/q", &ExtractError::missing("title"));

        let issues = log.snapshot();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::MissingStructure);
        assert_eq!(issues[0].message, "missing title");
    }
}
