//! Output Post-Processing
//!
//! Shortens tool output before it is shown to a person. The conversation
//! always keeps the full text; only the display copy is cut.

/// Default number of lines shown for a tool result
pub const DEFAULT_MAX_LINES: usize = 50;

/// Display-ready tool output
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayText {
    pub text: String,
    pub truncated: bool,
    pub total_lines: usize,
}

/// Keep the first `max_lines` lines of `output` and append a notice citing
/// the real line count when anything was dropped.
pub fn truncate_for_display(output: &str, max_lines: usize) -> DisplayText {
    let total_lines = output.split('\n').count();

    if total_lines <= max_lines {
        return DisplayText {
            text: output.to_string(),
            truncated: false,
            total_lines,
        };
    }

    let mut text = output.split('\n').take(max_lines).collect::<Vec<_>>().join("\n");
    text.push_str(&format!(
        "\n\n(Response contains {total_lines} lines total, showing only the first {max_lines} lines)"
    ));

    DisplayText {
        text,
        truncated: true,
        total_lines,
    }
}

/// One-line rendering of a tool's JSON input, e.g. `path: docs, recursive: true`
pub fn summarize_input(input: &serde_json::Value) -> String {
    match input {
        serde_json::Value::Object(map) if !map.is_empty() => map
            .iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => format!("{k}: {s}"),
                other => format!("{k}: {other}"),
            })
            .collect::<Vec<_>>()
            .join(", "),
        serde_json::Value::Object(_) | serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn test_truncates_long_output() {
        let output = numbered(120);
        let shown = truncate_for_display(&output, 50);

        assert!(shown.truncated);
        assert_eq!(shown.total_lines, 120);
        assert!(shown.text.starts_with("line 1\n"));
        assert!(shown.text.contains("line 50\n"));
        assert!(!shown.text.contains("line 51"));
        assert!(shown.text.contains("120 lines total"));
    }

    #[test]
    fn test_short_output_untouched() {
        let output = numbered(50);
        let shown = truncate_for_display(&output, 50);
        assert!(!shown.truncated);
        assert_eq!(shown.text, output);
    }

    #[test]
    fn test_summarize_input() {
        let input = serde_json::json!({"path": "docs", "recursive": true});
        assert_eq!(summarize_input(&input), "path: docs, recursive: true");
        assert_eq!(summarize_input(&serde_json::json!({})), "");
    }
}
