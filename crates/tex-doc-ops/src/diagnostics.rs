//! Extraction of structured diagnostics from raw engine logs.
//!
//! The parser is stateless and total: it never fails and returns an empty
//! list for input it cannot interpret. Severity-bearing lines that cannot be
//! attributed to a file or line are still recorded with those fields unset —
//! completeness over precision.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Severity of a single compiler finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// One error or warning extracted from an engine log.
#[derive(Clone, Debug, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Source file the engine was processing, when attributable.
    pub file: Option<String>,
    pub line: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            file: None,
            line: None,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            file: None,
            line: None,
            message: message.into(),
        }
    }
}

fn open_file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `(./chapter/intro.tex` tokens mark the file the engine is reading.
    RE.get_or_init(|| {
        Regex::new(r"\(((?:\./)?[^()\s]+\.(?:tex|sty|cls|bib|bbl|def|cfg))").unwrap()
    })
}

fn file_line_error_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `-file-line-error` mode: `./main.tex:12: Undefined control sequence.`
    RE.get_or_init(|| Regex::new(r"^(?:\./)?([^:\s]+\.(?:tex|sty|cls|bib)):(\d+):\s*(.*)$").unwrap())
}

fn log_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `l.42 \badmacro` lines follow an error and carry the line number.
    RE.get_or_init(|| Regex::new(r"^l\.(\d+)").unwrap())
}

fn inline_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Warnings often end with `... on input line 7.` or `at line 7`.
    RE.get_or_init(|| Regex::new(r"(?:input line|at line|line)\s+(\d+)").unwrap())
}

/// Parse raw engine output into an ordered list of diagnostics.
pub fn parse(log: &str) -> Vec<Diagnostic> {
    let lines: Vec<&str> = log.lines().collect();
    let mut diagnostics = Vec::new();
    let mut current_file: Option<String> = None;

    for (index, line) in lines.iter().enumerate() {
        // Track the most recent open-file token on any line, even ones that
        // also carry a finding, so attribution uses the nearest context.
        if let Some(capture) = open_file_re()
            .captures_iter(line)
            .last()
            .and_then(|c| c.get(1))
        {
            current_file = Some(normalize_file(capture.as_str()));
        }

        if let Some(captures) = file_line_error_re().captures(line) {
            // file-line-error mode replaces the `!` prefix entirely.
            let message = captures.get(3).map(|m| m.as_str()).unwrap_or_default();
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                file: captures.get(1).map(|m| normalize_file(m.as_str())),
                line: captures.get(2).and_then(|m| m.as_str().parse().ok()),
                message: message.trim_start_matches('!').trim().to_string(),
            });
            continue;
        }

        if let Some(rest) = line.strip_prefix('!') {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                file: current_file.clone(),
                line: find_error_line(&lines[index + 1..]),
                message: rest.trim().to_string(),
            });
            continue;
        }

        if line.contains("Error:") {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                file: current_file.clone(),
                line: extract_inline_line(line),
                message: line.trim().to_string(),
            });
            continue;
        }

        if line.contains("Warning:") || line.contains("warning:") {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                file: current_file.clone(),
                line: extract_inline_line(line),
                message: line.trim().to_string(),
            });
        }
    }

    diagnostics
}

/// Count of error-severity records in a diagnostic list.
pub fn error_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count()
}

/// Scan the lines following a `!` error for its `l.<N>` marker. The engine
/// prints it within a few lines; stop early at the next finding.
fn find_error_line(following: &[&str]) -> Option<u32> {
    for line in following.iter().take(8) {
        if line.starts_with('!') {
            return None;
        }
        if let Some(captures) = log_line_re().captures(line) {
            return captures.get(1).and_then(|m| m.as_str().parse().ok());
        }
    }
    None
}

fn extract_inline_line(line: &str) -> Option<u32> {
    inline_line_re()
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn normalize_file(raw: &str) -> String {
    raw.trim_start_matches("./").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_diagnostics() {
        assert!(parse("").is_empty());
        assert!(parse("This is pdfTeX, Version 3.14\n(./main.tex)").is_empty());
    }

    #[test]
    fn bang_error_captures_context_and_line() {
        let log = "\
This is pdfTeX, Version 3.141592653
(./main.tex
! Undefined control sequence.
<recently read> \\badmacro
l.12 \\badmacro
";
        let diagnostics = parse(log);
        assert_eq!(diagnostics.len(), 1);
        let diag = &diagnostics[0];
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.file.as_deref(), Some("main.tex"));
        assert_eq!(diag.line, Some(12));
        assert_eq!(diag.message, "Undefined control sequence.");
    }

    #[test]
    fn file_line_error_mode_is_recognised() {
        let log = "./main.tex:7: Undefined control sequence.\n";
        let diagnostics = parse(log);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].file.as_deref(), Some("main.tex"));
        assert_eq!(diagnostics[0].line, Some(7));
    }

    #[test]
    fn warnings_are_attributed_with_input_line() {
        let log = "\
(./chapter.tex
LaTeX Warning: Citation `knuth84' on page 1 undefined on input line 9.
";
        let diagnostics = parse(log);
        assert_eq!(diagnostics.len(), 1);
        let diag = &diagnostics[0];
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.file.as_deref(), Some("chapter.tex"));
        assert_eq!(diag.line, Some(9));
    }

    #[test]
    fn package_errors_without_context_are_still_recorded() {
        let log = "Package hyperref Error: Wrong driver option.\n";
        let diagnostics = parse(log);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert!(diagnostics[0].file.is_none());
        assert!(diagnostics[0].line.is_none());
    }

    #[test]
    fn nested_file_context_uses_the_nearest_open() {
        let log = "\
(./main.tex (./preamble.sty)
(./body.tex
! Missing $ inserted.
l.3 x^2
";
        let diagnostics = parse(log);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].file.as_deref(), Some("body.tex"));
        assert_eq!(diagnostics[0].line, Some(3));
    }

    #[test]
    fn warnings_never_become_errors() {
        let log = "\
LaTeX Warning: There were undefined references.
Overfull \\hbox (1.0pt too wide) in paragraph at lines 4--5
";
        let diagnostics = parse(log);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert_eq!(error_count(&diagnostics), 0);
    }
}
