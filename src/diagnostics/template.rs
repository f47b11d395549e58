//! Output templating for plain-text diagnostics.
//!
//! A template is a string with `{field}` placeholders and `\n \t \r`
//! escapes. The named formats expand to the templates below; anything else
//! is taken verbatim as a user format. `{certainty:TEXT}` emits TEXT only
//! for non-safe findings, with the word `certainty` inside TEXT replaced by
//! the certainty name. Unknown placeholders are copied through unchanged.

use crate::diagnostics::{Certainty, ErrorMessage, FileLocation};

pub const DEFAULT_TEMPLATE: &str = "gcc";

/// Expand a named format into `(template, location_template)`.
///
/// The location template may be empty, in which case secondary locations
/// are folded into `{callstack}` only.
pub fn expand_format(format: &str, location_format: &str) -> (String, String) {
    let (template, location) = match format {
        "" | "gcc" => (
            "{file}:{line}:{column}: {severity}: {message} [{id}]",
            "{file}:{line}:{column}: note: {info}",
        ),
        "vs" => ("{file}({line}): {severity}: {message}", ""),
        "edit" => ("{file} +{line}: {severity}: {message}", ""),
        "cppcheck2" => (
            "{file}:{line}:{column}: {severity}:{certainty:certainty:} {message} [{id}]",
            "{file}:{line}:{column}: note: {info}",
        ),
        custom => (custom, location_format),
    };
    let location = if location.is_empty() {
        location_format.to_string()
    } else {
        location.to_string()
    };
    (template.to_string(), location)
}

/// Render one diagnostic with the given templates.
pub fn render(msg: &ErrorMessage, template: &str, location_template: &str, verbose: bool) -> String {
    let primary = msg.call_stack.last().cloned().unwrap_or_default();
    let mut out = render_one(msg, &primary, template, verbose);
    if !location_template.is_empty() && msg.call_stack.len() > 1 {
        for loc in &msg.call_stack {
            if loc.info.is_empty() && loc == &primary {
                continue;
            }
            out.push('\n');
            out.push_str(&render_one(msg, loc, location_template, verbose));
        }
    }
    out
}

fn render_one(msg: &ErrorMessage, loc: &FileLocation, template: &str, verbose: bool) -> String {
    let mut out = String::with_capacity(template.len() + msg.verbose.len());
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                match chars[i + 1] {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
                i += 2;
            }
            '{' => {
                let Some(close) = find_close(&chars, i) else {
                    out.push('{');
                    i += 1;
                    continue;
                };
                let field: String = chars[i + 1..close].iter().collect();
                match expand_field(&field, msg, loc, verbose) {
                    Some(text) => out.push_str(&text),
                    None => {
                        // Unknown placeholder: copied through verbatim.
                        out.push('{');
                        out.push_str(&field);
                        out.push('}');
                    }
                }
                i = close + 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn find_close(chars: &[char], open: usize) -> Option<usize> {
    chars[open + 1..]
        .iter()
        .position(|&c| c == '}')
        .map(|off| open + 1 + off)
}

fn expand_field(
    field: &str,
    msg: &ErrorMessage,
    loc: &FileLocation,
    verbose: bool,
) -> Option<String> {
    if let Some(text) = field.strip_prefix("certainty:") {
        if msg.certainty == Certainty::Safe {
            return Some(String::new());
        }
        return Some(text.replace("certainty", msg.certainty.as_str()));
    }
    Some(match field {
        "file" => loc.file.clone(),
        "line" => loc.line.to_string(),
        "column" => loc.column.to_string(),
        "severity" => msg.severity.to_string(),
        "certainty" => msg.certainty.to_string(),
        "message" => {
            if verbose {
                msg.verbose.clone()
            } else {
                msg.message.clone()
            }
        }
        "id" => msg.id.clone(),
        "info" => {
            if loc.info.is_empty() {
                if verbose {
                    msg.verbose.clone()
                } else {
                    msg.message.clone()
                }
            } else {
                loc.info.clone()
            }
        }
        "cwe" => msg.cwe.map(|c| c.to_string()).unwrap_or_default(),
        "code" => String::new(),
        "callstack" => {
            let mut out = String::new();
            for loc in &msg.call_stack {
                out.push_str(&format!("[{}:{}]", loc.file, loc.line));
            }
            out
        }
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;

    fn msg() -> ErrorMessage {
        ErrorMessage::new(
            vec![
                FileLocation::new("b.c", 2, 8).with_info("Calling function f, 1st argument is null"),
                FileLocation::new("a.c", 4, 3),
            ],
            "b.c",
            Severity::Error,
            "Null pointer dereference: p",
            "nullPointer",
            Certainty::Safe,
        )
    }

    #[test]
    fn gcc_template_renders_primary_location() {
        let (tpl, loc_tpl) = expand_format("gcc", "");
        let text = render(&msg(), &tpl, &loc_tpl, false);
        assert!(text.starts_with("a.c:4:3: error: Null pointer dereference: p [nullPointer]"));
        assert!(text.contains("b.c:2:8: note: Calling function f, 1st argument is null"));
    }

    #[test]
    fn vs_template_has_no_location_lines() {
        let (tpl, loc_tpl) = expand_format("vs", "");
        let text = render(&msg(), &tpl, &loc_tpl, false);
        assert_eq!(text, "a.c(4): error: Null pointer dereference: p");
    }

    #[test]
    fn escapes_are_expanded() {
        let text = render(&msg(), "{id}\\t{line}\\n", "", false);
        assert_eq!(text, "nullPointer\t4\n");
    }

    #[test]
    fn certainty_conditional_is_empty_for_safe() {
        let text = render(&msg(), "{severity}{certainty:, certainty}", "", false);
        assert_eq!(text, "error");
    }

    #[test]
    fn certainty_conditional_expands_for_inconclusive() {
        let mut m = msg();
        m.certainty = Certainty::Inconclusive;
        let text = render(&m, "{severity}{certainty:, certainty}", "", false);
        assert_eq!(text, "error, inconclusive");
    }

    #[test]
    fn unknown_placeholder_is_kept_verbatim() {
        let text = render(&msg(), "{id} {bogus}", "", false);
        assert_eq!(text, "nullPointer {bogus}");
    }

    #[test]
    fn callstack_lists_every_location() {
        let text = render(&msg(), "{callstack}: {message}", "", false);
        assert_eq!(text, "[b.c:2][a.c:4]: Null pointer dereference: p");
    }
}
