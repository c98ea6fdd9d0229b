use crate::span::Span;

/// A secondary message attached to a diagnostic, optionally pointing at
/// another place in the source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Note {
    pub span: Option<Span>,
    pub message: String,
}

/// A fatal compiler diagnostic. Lowering has no warning tier: a problem is
/// either recovered by a fallback or reported through one of these.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
    pub notes: Vec<Note>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(message: String, span: Span) -> Self {
        Self {
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(Note {
            span: None,
            message: note,
        });
        self
    }

    /// Attach a note that points at `span`, e.g. a call site that required
    /// the failing form.
    pub fn with_note_at(mut self, span: Span, note: String) -> Self {
        self.notes.push(Note {
            span: Some(span),
            message: note,
        });
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    /// Render the diagnostic to stderr using ariadne.
    pub fn render(&self, filename: &str, source: &str) {
        use ariadne::{Color, Label, Report, ReportKind, Source};

        let mut report = Report::build(ReportKind::Error, filename, self.span.start as usize)
            .with_message(&self.message)
            .with_label(
                Label::new((filename, self.span.start as usize..self.span.end as usize))
                    .with_message(&self.message)
                    .with_color(Color::Red),
            );

        for note in &self.notes {
            match note.span {
                Some(span) => {
                    report = report.with_label(
                        Label::new((filename, span.start as usize..span.end as usize))
                            .with_message(&note.message)
                            .with_color(Color::Blue),
                    );
                }
                None => report = report.with_note(&note.message),
            }
        }

        if let Some(help) = &self.help {
            report = report.with_help(help);
        }

        if let Err(e) = report
            .finish()
            .eprint((filename, Source::from(source)))
        {
            eprintln!("error: {} (failed to render: {})", self.message, e);
        }
    }

    /// Render without source text: message, then one line per note.
    pub fn render_plain(&self) -> String {
        let mut out = format!(
            "error: {} (at {}..{})",
            self.message, self.span.start, self.span.end
        );
        for note in &self.notes {
            match note.span {
                Some(span) => out.push_str(&format!(
                    "\n  note: {} (at {}..{})",
                    note.message, span.start, span.end
                )),
                None => out.push_str(&format!("\n  note: {}", note.message)),
            }
        }
        if let Some(help) = &self.help {
            out.push_str(&format!("\n  help: {}", help));
        }
        out
    }
}
