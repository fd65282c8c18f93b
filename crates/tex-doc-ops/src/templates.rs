//! Built-in document templates.
//!
//! The supported set is a closed enum; unknown names fail instead of
//! falling back to a default, so the catalog stays auditable. Rendering is
//! pure string assembly and deterministic for identical parameters.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::OperationError;

/// Supported document skeletons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Template {
    Article,
    Report,
    Presentation,
    Letter,
    Minimal,
}

impl Template {
    pub const ALL: [Template; 5] = [
        Template::Article,
        Template::Report,
        Template::Presentation,
        Template::Letter,
        Template::Minimal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Template::Article => "article",
            Template::Report => "report",
            Template::Presentation => "presentation",
            Template::Letter => "letter",
            Template::Minimal => "minimal",
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Template {
    type Err = OperationError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "article" => Ok(Template::Article),
            "report" => Ok(Template::Report),
            // Accept the LaTeX class name as an alias.
            "presentation" | "beamer" => Ok(Template::Presentation),
            "letter" => Ok(Template::Letter),
            "minimal" => Ok(Template::Minimal),
            other => Err(OperationError::UnknownTemplate {
                name: other.to_string(),
            }),
        }
    }
}

/// Named parameters accepted by every template.
#[derive(Clone, Debug, Default)]
pub struct TemplateParams {
    pub title: Option<String>,
    pub author: Option<String>,
    /// Extra options passed to `\documentclass`.
    pub class_options: Vec<String>,
}

impl TemplateParams {
    fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled")
    }

    fn author(&self) -> &str {
        self.author.as_deref().unwrap_or("Anonymous")
    }

    fn class_options(&self, defaults: &str) -> String {
        if self.class_options.is_empty() {
            defaults.to_string()
        } else {
            self.class_options.join(",")
        }
    }
}

/// Render the initial content for a new document.
pub fn render(template: Template, params: &TemplateParams) -> String {
    match template {
        Template::Article => render_article(params),
        Template::Report => render_report(params),
        Template::Presentation => render_presentation(params),
        Template::Letter => render_letter(params),
        Template::Minimal => render_minimal(params),
    }
}

const COMMON_PREAMBLE: &str = "\\usepackage[utf8]{inputenc}\n\
\\usepackage[T1]{fontenc}\n\
\\usepackage{lmodern}\n\
\\usepackage[english]{babel}\n\
\\usepackage{amsmath,amssymb}\n\
\\usepackage{graphicx}\n\
\\usepackage{hyperref}\n";

fn render_article(params: &TemplateParams) -> String {
    format!(
        "\\documentclass[{options}]{{article}}\n\n{COMMON_PREAMBLE}\n\
\\title{{{title}}}\n\\author{{{author}}}\n\\date{{\\today}}\n\n\
\\begin{{document}}\n\n\\maketitle\n\n\
\\begin{{abstract}}\nYour abstract here.\n\\end{{abstract}}\n\n\
\\section{{Introduction}}\n\nYour content here.\n\n\
\\section{{Conclusion}}\n\nYour conclusion here.\n\n\\end{{document}}\n",
        options = params.class_options("11pt,a4paper"),
        title = params.title(),
        author = params.author(),
    )
}

fn render_report(params: &TemplateParams) -> String {
    format!(
        "\\documentclass[{options}]{{report}}\n\n{COMMON_PREAMBLE}\n\
\\title{{{title}}}\n\\author{{{author}}}\n\\date{{\\today}}\n\n\
\\begin{{document}}\n\n\\maketitle\n\\tableofcontents\n\n\
\\chapter{{Introduction}}\n\nYour introduction here.\n\n\
\\chapter{{Main Content}}\n\nYour main content here.\n\n\
\\chapter{{Conclusion}}\n\nYour conclusion here.\n\n\\end{{document}}\n",
        options = params.class_options("11pt,a4paper"),
        title = params.title(),
        author = params.author(),
    )
}

fn render_presentation(params: &TemplateParams) -> String {
    format!(
        "\\documentclass[{options}]{{beamer}}\n\n\
\\usetheme{{Madrid}}\n\\usecolortheme{{default}}\n\n\
\\usepackage[utf8]{{inputenc}}\n\\usepackage[T1]{{fontenc}}\n\
\\usepackage{{lmodern}}\n\\usepackage[english]{{babel}}\n\
\\usepackage{{amsmath,amssymb}}\n\n\
\\title{{{title}}}\n\\author{{{author}}}\n\\date{{\\today}}\n\n\
\\begin{{document}}\n\n\\frame{{\\titlepage}}\n\n\
\\begin{{frame}}\n\\frametitle{{Table of Contents}}\n\\tableofcontents\n\\end{{frame}}\n\n\
\\section{{Introduction}}\n\\begin{{frame}}\n\\frametitle{{Introduction}}\n\
\\begin{{itemize}}\n\\item Your first point\n\\item Your second point\n\\end{{itemize}}\n\
\\end{{frame}}\n\n\
\\section{{Conclusion}}\n\\begin{{frame}}\n\\frametitle{{Conclusion}}\n\
Your conclusion here.\n\\end{{frame}}\n\n\\end{{document}}\n",
        options = params.class_options("aspectratio=169"),
        title = params.title(),
        author = params.author(),
    )
}

fn render_letter(params: &TemplateParams) -> String {
    format!(
        "\\documentclass[{options}]{{letter}}\n\n\
\\usepackage[utf8]{{inputenc}}\n\\usepackage[T1]{{fontenc}}\n\
\\usepackage{{lmodern}}\n\n\
\\signature{{{author}}}\n\\date{{\\today}}\n\n\
\\begin{{document}}\n\n\\begin{{letter}}{{Recipient\\\\Address line}}\n\n\
\\opening{{Dear Sir or Madam,}}\n\n{title}\n\n\
\\closing{{Yours faithfully,}}\n\n\\end{{letter}}\n\n\\end{{document}}\n",
        options = params.class_options("11pt"),
        title = params.title(),
        author = params.author(),
    )
}

fn render_minimal(params: &TemplateParams) -> String {
    format!(
        "\\documentclass{{minimal}}\n\n\\begin{{document}}\n{title}\n\\end{{document}}\n",
        title = params.title(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_template_fails() {
        let err = "thesis".parse::<Template>().expect_err("unknown name");
        assert!(matches!(err, OperationError::UnknownTemplate { name } if name == "thesis"));
    }

    #[test]
    fn beamer_is_an_alias_for_presentation() {
        assert_eq!("beamer".parse::<Template>().unwrap(), Template::Presentation);
    }

    #[test]
    fn rendering_is_deterministic() {
        let params = TemplateParams {
            title: Some("T".to_string()),
            ..TemplateParams::default()
        };
        let first = render(Template::Article, &params);
        let second = render(Template::Article, &params);
        assert_eq!(first, second);
        assert!(first.contains("\\title{T}"));
    }

    #[test]
    fn every_template_produces_a_complete_document() {
        let params = TemplateParams::default();
        for template in Template::ALL {
            let body = render(template, &params);
            assert!(body.starts_with("\\documentclass"), "{template}");
            assert!(body.contains("\\begin{document}"), "{template}");
            assert!(body.trim_end().ends_with("\\end{document}"), "{template}");
        }
    }

    #[test]
    fn class_options_override_defaults() {
        let params = TemplateParams {
            class_options: vec!["12pt".to_string(), "letterpaper".to_string()],
            ..TemplateParams::default()
        };
        let body = render(Template::Article, &params);
        assert!(body.starts_with("\\documentclass[12pt,letterpaper]{article}"));
    }
}
