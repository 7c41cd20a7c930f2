//! Semantic color palette for terminal output.

use owo_colors::{OwoColorize, Style};

/// Verdicts that let the request through.
fn permit_style() -> Style {
    Style::new().green().bold()
}

/// Denials and configuration errors.
fn deny_style() -> Style {
    Style::new().red().bold()
}

fn caution_style() -> Style {
    Style::new().yellow()
}

fn muted_style() -> Style {
    Style::new().dimmed()
}

/// Scope names, keys and paths.
fn code_style() -> Style {
    Style::new().blue()
}

/// Trait extension to apply semantic styles.
pub trait SemanticStyle {
    fn success(&self) -> String;
    fn error(&self) -> String;
    fn warning(&self) -> String;
    fn muted(&self) -> String;
    fn code(&self) -> String;
}

fn styled(value: &impl std::fmt::Display, style: Style) -> String {
    if super::no_color() {
        value.to_string()
    } else {
        value.style(style).to_string()
    }
}

impl<T: std::fmt::Display> SemanticStyle for T {
    fn success(&self) -> String {
        styled(self, permit_style())
    }

    fn error(&self) -> String {
        styled(self, deny_style())
    }

    fn warning(&self) -> String {
        styled(self, caution_style())
    }

    fn muted(&self) -> String {
        styled(self, muted_style())
    }

    fn code(&self) -> String {
        styled(self, code_style())
    }
}
