//! Output formatting for explanations.

use crate::assemble::{AnnotationKind, Explanation};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum OutputFormat {
    Json,
    Yaml,
    Text,
}

/// Formats an explanation in the requested output format.
pub fn format_explanation(explanation: &Explanation, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(explanation)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(explanation).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Text => Ok(explanation_to_text(explanation)),
    }
}

/// Renders one row per annotated token. Identical help paragraphs are
/// printed once at the end and referenced by number.
fn explanation_to_text(explanation: &Explanation) -> String {
    let mut out = format!("$ {}\n\n", explanation.source);

    let rows = explanation.annotations();
    if rows.is_empty() {
        out.push_str("(nothing to explain)\n");
        return out;
    }

    let texts: Vec<String> = rows.iter().map(|r| r.text.replace('\n', "\\n")).collect();
    let width = texts
        .iter()
        .map(|t| t.chars().count())
        .max()
        .unwrap_or(0)
        .min(24);

    let mut notes: Vec<&str> = Vec::new();
    for (row, text) in rows.iter().zip(&texts) {
        let label = match (&row.help, row.kind) {
            (Some(help), kind) => {
                let id = match notes.iter().position(|n| *n == help.as_str()) {
                    Some(i) => i + 1,
                    None => {
                        notes.push(help);
                        notes.len()
                    }
                };
                if kind == AnnotationKind::Value {
                    format!("value of [{id}]")
                } else {
                    format!("[{id}]")
                }
            }
            (None, AnnotationKind::Command) => "(no summary)".to_string(),
            (None, AnnotationKind::Value) => "(value)".to_string(),
            (None, _) => "(unknown)".to_string(),
        };
        out.push_str(&format!("  {text:<width$}  {label}\n"));
    }

    out.push('\n');
    for (i, note) in notes.iter().enumerate() {
        let mut lines = note.lines();
        out.push_str(&format!("[{}] {}\n", i + 1, lines.next().unwrap_or("")));
        for line in lines {
            out.push_str(&format!("    {line}\n"));
        }
    }
    out
}
