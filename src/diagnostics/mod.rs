//! Diagnostic model: severities, certainties, error messages and the
//! plumbing that renders, suppresses and serializes them.

pub mod suppressions;
pub mod template;
pub mod xml;

use std::fmt;

use crate::diagnostics::xml::{escape_xml, XmlNode};

/// Message severity, ordered roughly by importance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Style,
    Performance,
    Portability,
    Information,
    Debug,
    None,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Style => "style",
            Severity::Performance => "performance",
            Severity::Portability => "portability",
            Severity::Information => "information",
            Severity::Debug => "debug",
            Severity::None => "none",
        }
    }

    pub fn from_str(s: &str) -> Option<Severity> {
        Some(match s {
            "error" => Severity::Error,
            "warning" => Severity::Warning,
            "style" => Severity::Style,
            "performance" => Severity::Performance,
            "portability" => Severity::Portability,
            "information" => Severity::Information,
            "debug" => Severity::Debug,
            "none" => Severity::None,
            _ => return None,
        })
    }

    /// Severities selectable through `--severity=`; `error` is always on.
    pub const SELECTABLE: &'static [Severity] = &[
        Severity::Warning,
        Severity::Style,
        Severity::Performance,
        Severity::Portability,
        Severity::Information,
    ];
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How certain the analyzer is about a finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Certainty {
    Safe,
    Inconclusive,
    Experimental,
}

impl Certainty {
    pub fn as_str(self) -> &'static str {
        match self {
            Certainty::Safe => "safe",
            Certainty::Inconclusive => "inconclusive",
            Certainty::Experimental => "experimental",
        }
    }

    pub fn from_str(s: &str) -> Option<Certainty> {
        Some(match s {
            "safe" => Certainty::Safe,
            "inconclusive" => Certainty::Inconclusive,
            "experimental" => Certainty::Experimental,
            _ => return None,
        })
    }

    pub const SELECTABLE: &'static [Certainty] = &[
        Certainty::Safe,
        Certainty::Inconclusive,
        Certainty::Experimental,
    ];
}

impl fmt::Display for Certainty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a call stack or error path.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub info: String,
}

impl FileLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            info: String::new(),
        }
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }
}

/// A diagnostic finding, flowing by value from the point of detection to
/// the logger and into the analyzer-info cache.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorMessage {
    /// Path of locations; the last entry is the primary location.
    pub call_stack: Vec<FileLocation>,
    /// The analyzed source file this message belongs to.
    pub file0: String,
    pub severity: Severity,
    pub certainty: Certainty,
    /// First line of the message text.
    pub message: String,
    /// Full message text; equals `message` when there is no detail.
    pub verbose: String,
    pub id: String,
    pub cwe: Option<u16>,
}

impl ErrorMessage {
    pub fn new(
        call_stack: Vec<FileLocation>,
        file0: impl Into<String>,
        severity: Severity,
        msg: &str,
        id: impl Into<String>,
        certainty: Certainty,
    ) -> Self {
        let (message, verbose) = match msg.split_once('\n') {
            Some((summary, _)) => (summary.to_string(), msg.to_string()),
            None => (msg.to_string(), msg.to_string()),
        };
        Self {
            call_stack,
            file0: file0.into(),
            severity,
            certainty,
            message,
            verbose,
            id: id.into(),
            cwe: None,
        }
    }

    pub fn with_cwe(mut self, cwe: u16) -> Self {
        self.cwe = Some(cwe);
        self
    }

    /// Primary location, when the message has one.
    pub fn location(&self) -> Option<&FileLocation> {
        self.call_stack.last()
    }

    /// Serialize as a results-stream / analyzer-info `<error>` element.
    /// Locations are written innermost-first.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "<error id=\"{}\" severity=\"{}\" msg=\"{}\" verbose=\"{}\"",
            escape_xml(&self.id),
            self.severity,
            escape_xml(&self.message),
            escape_xml(&self.verbose)
        ));
        if let Some(cwe) = self.cwe {
            out.push_str(&format!(" cwe=\"{cwe}\""));
        }
        if self.certainty != Certainty::Safe {
            out.push_str(&format!(" certainty=\"{}\"", self.certainty));
        }
        if !self.file0.is_empty() {
            out.push_str(&format!(" file0=\"{}\"", escape_xml(&self.file0)));
        }
        if self.call_stack.is_empty() {
            out.push_str("/>");
            return out;
        }
        out.push('>');
        for loc in self.call_stack.iter().rev() {
            out.push_str(&format!(
                "<location file=\"{}\" line=\"{}\" column=\"{}\"",
                escape_xml(&loc.file),
                loc.line,
                loc.column
            ));
            if !loc.info.is_empty() {
                out.push_str(&format!(" info=\"{}\"", escape_xml(&loc.info)));
            }
            out.push_str("/>");
        }
        out.push_str("</error>");
        out
    }

    /// Rebuild a message from a cached `<error>` element.
    pub fn from_xml(node: &XmlNode) -> Option<ErrorMessage> {
        if node.name != "error" {
            return None;
        }
        let id = node.attr("id")?.to_string();
        let severity = Severity::from_str(node.attr("severity")?)?;
        let certainty = node
            .attr("certainty")
            .and_then(Certainty::from_str)
            .unwrap_or(Certainty::Safe);
        let message = node.attr("msg")?.to_string();
        let verbose = node.attr("verbose").unwrap_or(node.attr("msg")?).to_string();
        let cwe = node.attr("cwe").and_then(|v| v.parse().ok());
        let file0 = node.attr("file0").unwrap_or("").to_string();
        let mut call_stack: Vec<FileLocation> = node
            .children_named("location")
            .map(|loc| FileLocation {
                file: loc.attr("file").unwrap_or("").to_string(),
                line: loc.attr_u32("line").unwrap_or(0),
                column: loc.attr_u32("column").unwrap_or(0),
                info: loc.attr("info").unwrap_or("").to_string(),
            })
            .collect();
        call_stack.reverse();
        Some(ErrorMessage {
            call_stack,
            file0,
            severity,
            certainty,
            message,
            verbose,
            id,
            cwe,
        })
    }

    /// The key used for suppression matching.
    pub fn suppression_key(&self) -> suppressions::MessageKey {
        let (file, line) = match self.location() {
            Some(loc) => (loc.file.clone(), Some(loc.line)),
            None => (self.file0.clone(), None),
        };
        suppressions::MessageKey {
            id: self.id.clone(),
            file,
            line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ErrorMessage {
        ErrorMessage::new(
            vec![
                FileLocation::new("a.c", 3, 5).with_info("Assignment 'p=0'"),
                FileLocation::new("a.c", 7, 9),
            ],
            "a.c",
            Severity::Error,
            "Null pointer dereference: p\nDereferencing p which is null",
            "nullPointer",
            Certainty::Safe,
        )
        .with_cwe(476)
    }

    #[test]
    fn message_splits_summary_from_verbose() {
        let msg = sample();
        assert_eq!(msg.message, "Null pointer dereference: p");
        assert!(msg.verbose.contains("which is null"));
    }

    #[test]
    fn xml_round_trip_preserves_everything() {
        let msg = sample();
        let node = XmlNode::parse(&msg.to_xml()).unwrap();
        let back = ErrorMessage::from_xml(&node).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn primary_location_is_last() {
        let msg = sample();
        assert_eq!(msg.location().unwrap().line, 7);
    }

    #[test]
    fn severity_names_round_trip() {
        for sev in [Severity::Error, Severity::Warning, Severity::Debug] {
            assert_eq!(Severity::from_str(sev.as_str()), Some(sev));
        }
    }
}
