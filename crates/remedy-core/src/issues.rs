//! Issue extraction from a normalized analysis report.

use std::path::{Component, Path, PathBuf};

use markup_tree::{NormalizedDocument, NormalizedTree};

use crate::domain::error::{RemedyError, Result};
use crate::domain::{FileIssues, IssueRecord, IssueWindow, Severity};

/// Lines of context on each side of an issue.
pub const WINDOW_RADIUS: u32 = 3;
/// Minimum distance between the end of one window and the start of the next.
pub const MIN_WINDOW_GAP: u32 = 5;
pub const MAX_WINDOWS: usize = 5;

/// First `file` entry with at least one `error`, truncated to `limit` issues.
///
/// Expects the checkstyle shape: `file` children under the root, `error`
/// grandchildren carrying `line`, `column`, `severity`, `message`, `source`.
pub fn extract_first_file(document: &NormalizedDocument, limit: usize) -> Option<FileIssues> {
    let files = document.root.child("file")?;
    files.iter().find_map(|file| {
        let issues: Vec<IssueRecord> = file
            .child("error")
            .map(|errors| errors.iter().take(limit).map(issue_record).collect())
            .unwrap_or_default();
        if issues.is_empty() {
            return None;
        }
        Some(FileIssues {
            path: file.attribute("name").unwrap_or_default().to_string(),
            issues,
        })
    })
}

fn issue_record(node: &NormalizedTree) -> IssueRecord {
    let number = |name: &str| {
        node.attribute(name)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(0)
    };
    let text = |name: &str| node.attribute(name).unwrap_or_default().to_string();
    IssueRecord {
        line: number("line"),
        column: number("column"),
        severity: Severity::parse(node.attribute("severity").unwrap_or_default()),
        message: text("message"),
        source: text("source"),
    }
}

/// Focus windows `[line - 3, line + 3]` in report order. A window is
/// dropped when it overlaps the last kept window or starts fewer than five
/// lines after its end; a window before the last kept one counts as too
/// close. Issues without a line number get no window.
pub fn issue_windows(issues: &[IssueRecord]) -> Vec<IssueWindow> {
    let mut windows: Vec<IssueWindow> = Vec::new();
    for issue in issues.iter().filter(|i| i.line > 0) {
        if windows.len() == MAX_WINDOWS {
            break;
        }
        let window = IssueWindow {
            start: issue.line.saturating_sub(WINDOW_RADIUS),
            end: issue.line.saturating_add(WINDOW_RADIUS),
        };
        if let Some(last) = windows.last() {
            let overlaps = window.start <= last.end && window.end >= last.start;
            let too_close = i64::from(window.start) - i64::from(last.end) < i64::from(MIN_WINDOW_GAP);
            if overlaps || too_close {
                continue;
            }
        }
        windows.push(window);
    }
    windows
}

/// Map the path reported by the analysis tool to one relative to the
/// working copy root.
pub fn resolve_target(repo_root: &Path, reported: &str) -> Result<PathBuf> {
    let reported_path = Path::new(reported);
    let relative = if reported_path.is_absolute() {
        strip_root(repo_root, reported_path).ok_or_else(|| {
            RemedyError::InvalidTarget(format!(
                "{reported} is outside {}",
                repo_root.display()
            ))
        })?
    } else {
        reported_path.to_path_buf()
    };
    check_relative(&relative)?;
    Ok(relative)
}

fn strip_root(root: &Path, path: &Path) -> Option<PathBuf> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_path_buf());
    }
    let root = root.canonicalize().ok()?;
    let path = path.canonicalize().ok()?;
    path.strip_prefix(&root).ok().map(Path::to_path_buf)
}

/// Reject empty, absolute, and parent-escaping targets.
pub fn check_relative(target: &Path) -> Result<()> {
    let escapes = target
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if target.as_os_str().is_empty() || escapes {
        return Err(RemedyError::InvalidTarget(target.display().to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use markup_tree::normalize_str;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<checkstyle version="10.12.0">
  <file name="/w/repos/demo/src/Clean.java"/>
  <file name="/w/repos/demo/src/App.java">
    <error line="12" column="5" severity="warning" message="Missing javadoc." source="JavadocMethodCheck"/>
    <error line="14" severity="error" message="Line is longer than 100 characters." source="LineLengthCheck"/>
    <error line="40" column="1" severity="ignore" message="x" source="y"/>
  </file>
  <file name="/w/repos/demo/src/Other.java">
    <error line="1" column="1" severity="error" message="z" source="w"/>
  </file>
</checkstyle>"#;

    fn record(line: u32) -> IssueRecord {
        IssueRecord {
            line,
            column: 0,
            severity: Severity::Info,
            message: String::new(),
            source: String::new(),
        }
    }

    #[test]
    fn test_first_file_with_issues_is_selected() {
        let doc = normalize_str(REPORT).unwrap();
        let file = extract_first_file(&doc, 5).unwrap();
        assert_eq!(file.path, "/w/repos/demo/src/App.java");
        assert_eq!(file.issues.len(), 3);
        assert_eq!(file.issues[0].line, 12);
        assert_eq!(file.issues[0].severity, Severity::Warning);
        assert_eq!(file.issues[1].column, 0);
        assert_eq!(file.issues[2].severity, Severity::Info);
    }

    #[test]
    fn test_limit_bounds_issue_count() {
        let doc = normalize_str(REPORT).unwrap();
        assert_eq!(extract_first_file(&doc, 2).unwrap().issues.len(), 2);
    }

    #[test]
    fn test_single_error_is_not_a_list() {
        let doc = normalize_str(
            r#"<checkstyle><file name="A.java"><error line="3" severity="error" message="m" source="s"/></file></checkstyle>"#,
        )
        .unwrap();
        let file = extract_first_file(&doc, 5).unwrap();
        assert_eq!(file.path, "A.java");
        assert_eq!(file.issues.len(), 1);
    }

    #[test]
    fn test_report_without_issues() {
        let doc = normalize_str(r#"<checkstyle version="10"><file name="A.java"/></checkstyle>"#).unwrap();
        assert!(extract_first_file(&doc, 5).is_none());
        let doc = normalize_str("<checkstyle/>").unwrap();
        assert!(extract_first_file(&doc, 5).is_none());
    }

    #[test]
    fn test_windows_skip_overlapping_and_near_neighbours() {
        let issues: Vec<IssueRecord> = [10, 12, 20, 21, 40].into_iter().map(record).collect();
        let windows = issue_windows(&issues);
        assert_eq!(
            windows,
            vec![
                IssueWindow { start: 7, end: 13 },
                IssueWindow { start: 18, end: 24 },
                IssueWindow { start: 37, end: 43 },
            ]
        );
    }

    #[test]
    fn test_windows_follow_report_order() {
        let issues: Vec<IssueRecord> = [40, 2, 60, 0].into_iter().map(record).collect();
        assert_eq!(
            issue_windows(&issues),
            vec![
                IssueWindow { start: 37, end: 43 },
                IssueWindow { start: 57, end: 63 },
            ]
        );
    }

    #[test]
    fn test_windows_are_capped() {
        let issues: Vec<IssueRecord> = (1..=10).map(|i| record(i * 20)).collect();
        assert_eq!(issue_windows(&issues).len(), MAX_WINDOWS);
    }

    #[test]
    fn test_resolve_target() {
        let root = Path::new("/w/repos/demo");
        assert_eq!(
            resolve_target(root, "/w/repos/demo/src/App.java").unwrap(),
            PathBuf::from("src/App.java")
        );
        assert_eq!(
            resolve_target(root, "src/App.java").unwrap(),
            PathBuf::from("src/App.java")
        );
        assert!(resolve_target(root, "/etc/passwd").is_err());
        assert!(resolve_target(root, "../other/App.java").is_err());
        assert!(resolve_target(root, "").is_err());
    }
}
