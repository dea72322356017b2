use serde_json::Value;
use thiserror::Error;
use universal_common::{Action, ActionError};

const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Render function failed: {0:#}")]
    RenderThrow(#[source] anyhow::Error),

    #[error("{message}")]
    CycleDetected {
        repeated: Vec<Action>,
        message: String,
    },

    #[error(transparent)]
    MalformedAction(#[from] ActionError),

    #[error("Render did not settle within {limit} passes")]
    PassLimitExceeded { limit: u32 },
}

impl RenderError {
    /// Cycle error whose message lists each repeated action body.
    ///
    /// With `color`, the header is yellow and record dumps are colored by
    /// value kind. Thunk source text is never colored.
    pub fn cycle(repeated: Vec<Action>, color: bool) -> Self {
        let (open, close) = if color { (YELLOW, RESET) } else { ("", "") };
        let bodies = repeated
            .iter()
            .map(|action| match action.as_record() {
                Some(record) if color => {
                    let mut dump = String::new();
                    write_colored(&mut dump, record, 0);
                    dump
                }
                _ => action.describe(),
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let message = format!(
            "\n{open}Rendering aborted to prevent an infinite loop. These asynchronous \
             actions were triggered again in successive render passes:{close}\n\n{bodies}"
        );
        RenderError::CycleDetected { repeated, message }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::RenderThrow(_) => "render_throw",
            RenderError::CycleDetected { .. } => "cycle_detected",
            RenderError::MalformedAction(_) => "malformed_action",
            RenderError::PassLimitExceeded { .. } => "pass_limit_exceeded",
        }
    }
}

/// Pretty JSON with ANSI colors: strings green, numbers and booleans
/// yellow, null bold. Keys and punctuation stay plain.
fn write_colored(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Array(items) if !items.is_empty() => {
            out.push_str("[\n");
            for (index, item) in items.iter().enumerate() {
                indent(out, depth + 1);
                write_colored(out, item, depth + 1);
                if index + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, depth);
            out.push(']');
        }
        Value::Object(fields) if !fields.is_empty() => {
            out.push_str("{\n");
            for (index, (key, field)) in fields.iter().enumerate() {
                indent(out, depth + 1);
                out.push_str(&Value::from(key.as_str()).to_string());
                out.push_str(": ");
                write_colored(out, field, depth + 1);
                if index + 1 < fields.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(out, depth);
            out.push('}');
        }
        Value::String(_) => paint(out, GREEN, value),
        Value::Number(_) | Value::Bool(_) => paint(out, YELLOW, value),
        Value::Null => paint(out, BOLD, value),
        _ => out.push_str(&value.to_string()),
    }
}

fn paint(out: &mut String, color: &str, value: &Value) {
    out.push_str(color);
    out.push_str(&value.to_string());
    out.push_str(RESET);
}

fn indent(out: &mut String, depth: usize) {
    out.push_str(&"  ".repeat(depth));
}

/// A rejected render: the last output produced (possibly stale) and why.
#[derive(Error, Debug)]
#[error("Render aborted after {passes} passes: {error}")]
pub struct RenderFailure {
    pub output: String,
    #[source]
    pub error: RenderError,
    pub passes: u32,
}
