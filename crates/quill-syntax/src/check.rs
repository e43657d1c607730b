//! Check outcomes and issue rendering

use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on issues collected from one tree
pub const MAX_ISSUES: usize = 20;

const SNIPPET_CHARS: usize = 40;

/// Kind of syntax problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Text the grammar could not place
    Unexpected,
    /// Token the parser had to insert
    Missing,
}

/// One syntax problem located in the source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxIssue {
    /// Zero-based line
    pub row: usize,
    /// Zero-based byte column
    pub column: usize,
    /// Problem kind
    pub kind: IssueKind,
    /// Offending text, or the missing token
    pub snippet: String,
}

impl SyntaxIssue {
    pub(crate) fn from_node(node: tree_sitter::Node<'_>, source: &str) -> Self {
        let start = node.start_position();
        let (kind, snippet) = if node.is_missing() {
            (IssueKind::Missing, node.kind().to_string())
        } else {
            let text = source.get(node.byte_range()).unwrap_or_default();
            (IssueKind::Unexpected, snippet(text))
        };
        Self {
            row: start.row,
            column: start.column,
            kind,
            snippet,
        }
    }

    /// Render issues as feedback for the next completion request
    #[must_use]
    pub fn feedback(issues: &[SyntaxIssue]) -> String {
        let mut out = String::from("The edited file has syntax errors:\n");
        for issue in issues {
            out.push_str("- ");
            out.push_str(&issue.to_string());
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for SyntaxIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            IssueKind::Unexpected => "unexpected",
            IssueKind::Missing => "missing",
        };
        write!(
            f,
            "line {}, column {}: {verb} `{}`",
            self.row + 1,
            self.column + 1,
            self.snippet
        )
    }
}

fn snippet(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() > SNIPPET_CHARS {
        let cut: String = line.chars().take(SNIPPET_CHARS).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

/// Outcome of one syntax check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxCheck {
    /// Parses without errors
    Valid,
    /// Parse tree contains errors
    Invalid(Vec<SyntaxIssue>),
    /// The check did not finish in time
    TimedOut,
}

impl SyntaxCheck {
    /// True for [`SyntaxCheck::Valid`]
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, SyntaxCheck::Valid)
    }

    /// Feedback text for a failed check
    #[must_use]
    pub fn feedback(&self) -> Option<String> {
        match self {
            SyntaxCheck::Valid => None,
            SyntaxCheck::Invalid(issues) => Some(SyntaxIssue::feedback(issues)),
            SyntaxCheck::TimedOut => {
                Some("Syntax validation of the edited file timed out.\n".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn issue_display_is_one_based() {
        let issue = SyntaxIssue {
            row: 0,
            column: 4,
            kind: IssueKind::Missing,
            snippet: "}".to_string(),
        };
        assert_eq!(issue.to_string(), "line 1, column 5: missing `}`");
    }

    #[test]
    fn feedback_lists_every_issue() {
        let issues = vec![
            SyntaxIssue {
                row: 2,
                column: 0,
                kind: IssueKind::Unexpected,
                snippet: "let = ;".to_string(),
            },
            SyntaxIssue {
                row: 9,
                column: 1,
                kind: IssueKind::Missing,
                snippet: ")".to_string(),
            },
        ];
        let text = SyntaxIssue::feedback(&issues);
        assert_eq!(
            text,
            "The edited file has syntax errors:\n\
             - line 3, column 1: unexpected `let = ;`\n\
             - line 10, column 2: missing `)`\n"
        );
    }

    #[test]
    fn snippet_truncates_long_lines() {
        let long = "x".repeat(100);
        let s = snippet(&format!("{long}\nsecond line"));
        assert_eq!(s.len(), SNIPPET_CHARS + 3);
        assert!(s.ends_with("..."));
    }

    #[test]
    fn valid_check_has_no_feedback() {
        assert!(SyntaxCheck::Valid.feedback().is_none());
        assert!(SyntaxCheck::TimedOut.feedback().unwrap().contains("timed out"));
    }
}
