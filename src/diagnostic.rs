use std::ops::Range;

use ariadne::{Color, Label, Report, ReportKind, Source};

use crate::span::Span;

/// A compiler diagnostic (error or warning).
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn style(self) -> (ReportKind<'static>, Color) {
        match self {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
        }
    }
}

impl Diagnostic {
    pub fn error(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn warning(message: String, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    /// Render a single diagnostic to stderr.
    pub fn render(&self, filename: &str, source: &str) {
        render_diagnostics(std::slice::from_ref(self), filename, source);
    }

    fn to_report<'a>(&self, filename: &'a str) -> Report<'a, (&'a str, Range<usize>)> {
        let (kind, color) = self.severity.style();
        let range = self.span.start as usize..self.span.end as usize;

        let mut report = Report::build(kind, filename, range.start)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, range))
                    .with_message(&self.message)
                    .with_color(color),
            );
        for note in &self.notes {
            report = report.with_note(note);
        }
        if let Some(help) = &self.help {
            report = report.with_help(help);
        }
        report.finish()
    }
}

/// Render diagnostics to stderr. The source is parsed into an ariadne
/// `Source` once and shared across all reports.
pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    let mut cache = (filename, Source::from(source));
    for diag in diagnostics {
        diag.to_report(filename).eprint(&mut cache).ok();
    }
}
