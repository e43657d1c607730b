//! Candidate edit parsing and application
//!
//! A structured edit is a list of exact-match replacements:
//!
//! ```json
//! {"replacements": [{"old": "42 +", "new": "42"}]}
//! ```
//!
//! Models often wrap the payload in a fenced code block, so fences are
//! stripped before parsing. A whole-file response is the complete new
//! content, fence-stripped.

use crate::error::EditError;
use crate::state::EditStrategy;
use serde::{Deserialize, Serialize};

/// One exact-match replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    /// Text to replace; must occur exactly once
    pub old: String,
    /// Replacement text
    pub new: String,
}

impl Replacement {
    /// Create replacement
    #[must_use]
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }
}

/// Ordered replacements applied to the pre-build content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredEdit {
    /// Replacements, applied in order
    pub replacements: Vec<Replacement>,
}

impl StructuredEdit {
    /// Parse a model response
    ///
    /// # Errors
    /// `EditError::Empty` for a blank response or no replacements,
    /// `EditError::Malformed` for invalid JSON or an empty `old`.
    pub fn parse(response: &str) -> Result<Self, EditError> {
        let body = strip_fence(response);
        if body.trim().is_empty() {
            return Err(EditError::Empty);
        }
        let edit: Self =
            serde_json::from_str(body).map_err(|e| EditError::Malformed(e.to_string()))?;
        if edit.replacements.is_empty() {
            return Err(EditError::Empty);
        }
        if edit.replacements.iter().any(|r| r.old.is_empty()) {
            return Err(EditError::Malformed(
                "replacement with empty `old`".to_string(),
            ));
        }
        Ok(edit)
    }

    /// Apply to `content`
    ///
    /// Each replacement sees the output of the previous one.
    ///
    /// # Errors
    /// `EditError::NotFound` / `EditError::Ambiguous` when a target does not
    /// occur exactly once.
    pub fn apply(&self, content: &str) -> Result<String, EditError> {
        let mut current = content.to_string();
        for replacement in &self.replacements {
            match current.matches(replacement.old.as_str()).count() {
                0 => return Err(EditError::NotFound(replacement.old.clone())),
                1 => current = current.replacen(&replacement.old, &replacement.new, 1),
                count => {
                    return Err(EditError::Ambiguous {
                        old: replacement.old.clone(),
                        count,
                    })
                }
            }
        }
        Ok(current)
    }
}

/// Body of a fenced code block, or the input unchanged
///
/// Only a response that starts with a fence is unwrapped; the language tag
/// on the opening fence is dropped.
#[must_use]
pub fn strip_fence(response: &str) -> &str {
    let Some(rest) = response.trim_start().strip_prefix("```") else {
        return response;
    };
    let Some((_, body)) = rest.split_once('\n') else {
        return response;
    };
    match body.trim_end().strip_suffix("```") {
        Some(inner) => inner,
        None => body,
    }
}

/// Content produced by applying `response`
///
/// New files take the response as their full content in either strategy.
///
/// # Errors
/// Any [`EditError`].
pub fn apply_response(
    strategy: EditStrategy,
    pre_build_state: Option<&str>,
    response: &str,
) -> Result<String, EditError> {
    match (strategy, pre_build_state) {
        (EditStrategy::Structured, Some(content)) => StructuredEdit::parse(response)?.apply(content),
        (EditStrategy::WholeFile, _) | (_, None) => {
            let body = strip_fence(response);
            if body.trim().is_empty() {
                Err(EditError::Empty)
            } else {
                Ok(body.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "fn a() {\n    1 +\n}\n\nfn b() {}\n";

    #[test]
    fn applies_single_replacement() {
        let edit = StructuredEdit::parse(r#"{"replacements":[{"old":"1 +","new":"1"}]}"#).unwrap();
        assert_eq!(edit.apply(SOURCE).unwrap(), "fn a() {\n    1\n}\n\nfn b() {}\n");
    }

    #[test]
    fn replacements_apply_in_order() {
        let edit = StructuredEdit {
            replacements: vec![Replacement::new("fn a", "fn c"), Replacement::new("fn c()", "fn d()")],
        };
        assert!(edit.apply(SOURCE).unwrap().starts_with("fn d() {"));
    }

    #[test]
    fn missing_target() {
        let edit = StructuredEdit {
            replacements: vec![Replacement::new("fn z", "fn y")],
        };
        assert_eq!(edit.apply(SOURCE), Err(EditError::NotFound("fn z".into())));
    }

    #[test]
    fn ambiguous_target() {
        let edit = StructuredEdit {
            replacements: vec![Replacement::new("fn ", "pub fn ")],
        };
        assert_eq!(
            edit.apply(SOURCE),
            Err(EditError::Ambiguous {
                old: "fn ".into(),
                count: 2
            })
        );
    }

    #[test]
    fn parse_rejects_bad_payloads() {
        assert_eq!(StructuredEdit::parse("  "), Err(EditError::Empty));
        assert_eq!(StructuredEdit::parse(r#"{"replacements":[]}"#), Err(EditError::Empty));
        assert!(matches!(StructuredEdit::parse("not json"), Err(EditError::Malformed(_))));
        assert!(matches!(
            StructuredEdit::parse(r#"{"replacements":[{"old":"","new":"x"}]}"#),
            Err(EditError::Malformed(_))
        ));
    }

    #[test]
    fn fenced_payload() {
        let response = "```json\n{\"replacements\":[{\"old\":\"1 +\",\"new\":\"2\"}]}\n```\n";
        let edit = StructuredEdit::parse(response).unwrap();
        assert_eq!(edit.replacements, vec![Replacement::new("1 +", "2")]);
    }

    #[test]
    fn strip_fence_variants() {
        assert_eq!(strip_fence("plain"), "plain");
        assert_eq!(strip_fence("```rust\nfn a() {}\n```"), "fn a() {}\n");
        assert_eq!(strip_fence("```\nunterminated"), "unterminated");
        assert_eq!(strip_fence("```"), "```");
        assert_eq!(strip_fence("  ```go\npackage a\n```\n"), "package a\n");
    }

    #[test]
    fn unfenced_whole_file_keeps_line_endings() {
        let body = "fn x() {}\n\nfn y() {}\n";
        assert_eq!(strip_fence(body), body);
        assert_eq!(apply_response(EditStrategy::WholeFile, Some(SOURCE), body).unwrap(), body);

        let created = apply_response(EditStrategy::Structured, None, "print(1)\r\n").unwrap();
        assert_eq!(created, "print(1)\r\n");
    }

    #[test]
    fn whole_file_and_new_file_take_response_verbatim() {
        let whole = apply_response(EditStrategy::WholeFile, Some(SOURCE), "```rust\nfn x() {}\n```").unwrap();
        assert_eq!(whole, "fn x() {}\n");

        let created = apply_response(EditStrategy::Structured, None, "fn y() {}").unwrap();
        assert_eq!(created, "fn y() {}");

        assert_eq!(apply_response(EditStrategy::WholeFile, None, "\n"), Err(EditError::Empty));
    }
}
