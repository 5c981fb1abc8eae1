//! Notification rendering.
//!
//! Rendering happens in two stages. Handlebars substitutes the event's
//! fields into a bundled template, then the leading YAML preamble (between
//! two `---` lines) is split off the rendered text. The preamble supplies
//! the subject; everything after it is the HTML body.
//!
//! The registry runs in strict mode, so a template referencing a field the
//! event does not have fails instead of rendering an empty string.

use handlebars::{handlebars_helper, Handlebars};
use herald_core::{Event, RenderedMessage};
use serde::Deserialize;

/// Template used for modified-event notifications.
pub const EVENT_MODIFIED: &str = "event_modified";

const EVENT_MODIFIED_SOURCE: &str = include_str!("../templates/event_modified.html");

/// Line that opens and closes the preamble block.
const PREAMBLE_DELIMITER: &str = "---";

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for rendering failures.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No template is registered under the requested name.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// The template source could not be compiled.
    #[error("Template compile error: {0}")]
    Template(#[from] handlebars::TemplateError),

    /// Substituting the event into the template failed.
    #[error("Template render error: {0}")]
    Substitution(#[from] handlebars::RenderError),

    /// The preamble was opened but never closed.
    #[error("Preamble is missing its closing delimiter")]
    UnterminatedPreamble,

    /// The preamble is not a YAML mapping of known fields.
    #[error("Preamble parse error: {0}")]
    Preamble(#[from] serde_yaml::Error),
}

// ---------------------------------------------------------------------------
// Preamble
// ---------------------------------------------------------------------------

/// Metadata carried in a rendered template's preamble.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Preamble {
    pub subject: String,
}

/// Split rendered text into its preamble and body.
///
/// Text that does not open with a `---` line has no preamble: the result is
/// an empty [`Preamble`] and the whole text as body.
pub fn split_preamble(text: &str) -> Result<(Preamble, &str), RenderError> {
    let trimmed = text.trim_start();
    let Some(after_open) = trimmed
        .strip_prefix(PREAMBLE_DELIMITER)
        .and_then(strip_line_break)
    else {
        return Ok((Preamble::default(), text));
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == PREAMBLE_DELIMITER {
            let yaml = &after_open[..offset];
            let body = &after_open[offset + line.len()..];
            return Ok((parse_preamble(yaml)?, body));
        }
        offset += line.len();
    }

    Err(RenderError::UnterminatedPreamble)
}

fn strip_line_break(s: &str) -> Option<&str> {
    s.strip_prefix("\r\n").or_else(|| s.strip_prefix('\n'))
}

fn parse_preamble(yaml: &str) -> Result<Preamble, RenderError> {
    if yaml.trim().is_empty() {
        return Ok(Preamble::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

// Escapes a string for use inside a double-quoted YAML scalar.
handlebars_helper!(yaml_str: |value: str| {
    let quoted = serde_json::to_string(value).unwrap_or_default();
    quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or_default()
        .to_string()
});

// ---------------------------------------------------------------------------
// TemplateRenderer
// ---------------------------------------------------------------------------

/// Renders events into subject/body pairs using named templates.
pub struct TemplateRenderer {
    registry: Handlebars<'static>,
}

impl TemplateRenderer {
    /// Create a renderer with the bundled templates registered.
    pub fn new() -> Result<Self, RenderError> {
        let mut renderer = Self::empty();
        renderer.register(EVENT_MODIFIED, EVENT_MODIFIED_SOURCE)?;
        Ok(renderer)
    }

    /// Create a renderer with no templates registered.
    pub fn empty() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_helper("yaml_str", Box::new(yaml_str));
        Self { registry }
    }

    /// Register (or replace) a template under `name`.
    pub fn register(&mut self, name: &str, source: &str) -> Result<(), RenderError> {
        self.registry.register_template_string(name, source)?;
        Ok(())
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    /// Render `event` with the template registered under `name`.
    pub fn render(&self, name: &str, event: &Event) -> Result<RenderedMessage, RenderError> {
        if !self.registry.has_template(name) {
            return Err(RenderError::TemplateNotFound(name.to_string()));
        }

        let text = self.registry.render(name, event)?;
        let (preamble, body) = split_preamble(&text)?;
        Ok(RenderedMessage::new(preamble.subject, body))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
