//! Static structural checks that run without an engine.
//!
//! Catches the mistakes worth rejecting before paying for a compile: brace
//! imbalance, a missing document skeleton, odd math-mode delimiters and
//! `\ref` targets without a matching `\label`. Findings reuse the
//! [`Diagnostic`] shape so callers render them the same way as engine
//! output.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::diagnostics::Diagnostic;
use crate::store;
use crate::workspace::Workspace;
use crate::OperationError;

/// Report from a structural check.
#[derive(Clone, Debug, serde::Serialize)]
pub struct CheckReport {
    pub diagnostics: Vec<Diagnostic>,
    /// True when `\documentclass`, `\begin{document}` and `\end{document}`
    /// are all present.
    pub structure_complete: bool,
}

impl CheckReport {
    pub fn is_valid(&self) -> bool {
        self.diagnostics
            .iter()
            .all(|d| d.severity != crate::diagnostics::Severity::Error)
    }
}

fn ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\ref\{([^}]+)\}").unwrap())
}

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\label\{([^}]+)\}").unwrap())
}

/// Check the document at `path` without invoking an engine.
pub fn check(workspace: &Workspace, path: &Path) -> Result<CheckReport, OperationError> {
    let content = store::read_document(workspace, path)?;
    Ok(check_text(&content, path))
}

/// Pure text form of [`check`], shared with tests.
pub fn check_text(content: &str, path: &Path) -> CheckReport {
    let file = path.to_string_lossy().into_owned();
    let mut diagnostics = Vec::new();

    scan_braces(content, &file, &mut diagnostics);

    let has_class = content.contains("\\documentclass");
    let has_begin = content.contains("\\begin{document}");
    let has_end = content.contains("\\end{document}");
    for (present, what) in [
        (has_class, "\\documentclass command"),
        (has_begin, "\\begin{document}"),
        (has_end, "\\end{document}"),
    ] {
        if !present {
            let mut diag = Diagnostic::error(format!("missing {what}"));
            diag.file = Some(file.clone());
            diagnostics.push(diag);
        }
    }

    if content.matches('$').count() % 2 != 0 {
        let mut diag = Diagnostic::warning("unmatched math mode delimiter ($)");
        diag.file = Some(file.clone());
        diagnostics.push(diag);
    }

    let labels: Vec<&str> = label_re()
        .captures_iter(content)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    for capture in ref_re().captures_iter(content) {
        if let Some(target) = capture.get(1) {
            if !labels.contains(&target.as_str()) {
                let mut diag = Diagnostic::warning(format!(
                    "reference `{}` has no matching \\label",
                    target.as_str()
                ));
                diag.file = Some(file.clone());
                diagnostics.push(diag);
            }
        }
    }

    CheckReport {
        structure_complete: has_class && has_begin && has_end,
        diagnostics,
    }
}

fn scan_braces(content: &str, file: &str, diagnostics: &mut Vec<Diagnostic>) {
    let mut depth: i64 = 0;
    for (index, line) in content.lines().enumerate() {
        let mut previous = '\0';
        for ch in line.chars() {
            // `\{` and `\}` are literal braces, not grouping.
            if previous == '\\' {
                previous = ch;
                continue;
            }
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        let mut diag = Diagnostic::error("unmatched closing brace");
                        diag.file = Some(file.to_string());
                        diag.line = Some(index as u32 + 1);
                        diagnostics.push(diag);
                        depth = 0;
                    }
                }
                _ => {}
            }
            previous = ch;
        }
    }
    if depth > 0 {
        let mut diag = Diagnostic::error(format!("{depth} unmatched opening brace(s)"));
        diag.file = Some(file.to_string());
        diagnostics.push(diag);
    }
}
