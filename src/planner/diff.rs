//! Line-level difference rendering.
//!
//! The output is meant for a human deciding whether a reapply is safe, not for
//! machine parsing.

use similar::{ChangeTag, TextDiff};

/// Renders the line difference between `live` and `declared`.
///
/// Returns `None` when the texts are identical. Otherwise every line of both
/// inputs is emitted in document order, prefixed with `- ` when only `live`
/// has it, `+ ` when only `declared` has it, or two spaces when shared.
#[must_use]
pub fn render_difference(live: &str, declared: &str) -> Option<String> {
    if live == declared {
        return None;
    }

    let diff = TextDiff::from_lines(live, declared);
    let lines: Vec<String> = diff
        .iter_all_changes()
        .map(|change| {
            let prefix = match change.tag() {
                ChangeTag::Delete => "- ",
                ChangeTag::Insert => "+ ",
                ChangeTag::Equal => "  ",
            };
            format!("{prefix}{}", change.value().trim_end_matches(['\r', '\n']))
        })
        .collect();

    Some(lines.join("\n"))
}

/// Lines removed from the live side of a rendered difference, without their prefix.
pub fn removed_lines(difference: &str) -> impl Iterator<Item = &str> {
    difference.lines().filter_map(|line| line.strip_prefix("- "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_is_none() {
        assert_eq!(render_difference("CREATE TABLE t (\n  a INT\n)", "CREATE TABLE t (\n  a INT\n)"), None);
        assert_eq!(render_difference("", ""), None);
    }

    #[test]
    fn test_changed_line() {
        let live = "CREATE TABLE t (\n  a INT,\n  b INT\n)";
        let declared = "CREATE TABLE t (\n  a BIGINT,\n  b INT\n)";
        let diff = render_difference(live, declared).expect("texts differ");
        assert_eq!(
            diff,
            "  CREATE TABLE t (\n-   a INT,\n+   a BIGINT,\n    b INT\n  )"
        );
    }

    #[test]
    fn test_keeps_document_order() {
        let diff = render_difference("a\nb\nc", "c\nb\na").expect("texts differ");
        let lines: Vec<&str> = diff.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines.contains(&"  b"));
        assert!(lines.iter().all(|l| l.starts_with("- ") || l.starts_with("+ ") || l.starts_with("  ")));
    }

    #[test]
    fn test_trailing_newline_only_still_differs() {
        assert!(render_difference("a", "a\n").is_some());
    }

    #[test]
    fn test_removed_lines() {
        let diff = render_difference("x\ny", "x\nz").expect("texts differ");
        assert_eq!(removed_lines(&diff).collect::<Vec<_>>(), vec!["y"]);
    }
}
