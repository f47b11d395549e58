//! Output surfaces: the `ErrorLogger` seam the driver reports through,
//! and the standard text/XML implementation used by the CLI.
//!
//! Status lines go to stdout; findings go to stderr or `--output-file`,
//! rendered through the configured template or as the version-2 XML
//! stream.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::diagnostics::template;
use crate::diagnostics::xml::escape_xml;
use crate::diagnostics::ErrorMessage;

/// Where diagnostics and status lines are delivered.
pub trait ErrorLogger {
    fn report_out(&mut self, msg: &str);
    fn report_err(&mut self, msg: &ErrorMessage);
    fn report_progress(&mut self, _filename: &str, _stage: &str, _value: usize) {}
}

enum Sink {
    Stderr,
    File(File),
}

impl Sink {
    fn write_line(&mut self, line: &str) {
        match self {
            Sink::Stderr => eprintln!("{line}"),
            Sink::File(f) => {
                let _ = writeln!(f, "{line}");
            }
        }
    }
}

/// The CLI's logger: template text or XML, stderr or a file.
pub struct StdLogger {
    template: String,
    location_template: String,
    verbose: bool,
    xml: bool,
    sink: Sink,
}

impl StdLogger {
    pub fn new(settings: &Settings) -> Result<StdLogger> {
        let (template, location_template) =
            template::expand_format(&settings.template_format, &settings.template_location);
        let sink = match &settings.output_file {
            Some(path) => Sink::File(open_output(path)?),
            None => Sink::Stderr,
        };
        Ok(StdLogger {
            template,
            location_template,
            verbose: settings.verbose,
            xml: settings.xml,
            sink,
        })
    }

    /// Emit the XML prolog when in XML mode.
    pub fn begin(&mut self) {
        if self.xml {
            self.sink
                .write_line("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
            self.sink.write_line("<results version=\"2\">");
            self.sink.write_line(&format!(
                "    <cppcheck version=\"{}\"/>",
                escape_xml(crate::VERSION)
            ));
            self.sink.write_line("    <errors>");
        }
    }

    /// Close the XML stream when in XML mode.
    pub fn finish(&mut self) {
        if self.xml {
            self.sink.write_line("    </errors>");
            self.sink.write_line("</results>");
        }
    }
}

fn open_output(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("failed to open output file {}", path.display()))
}

impl ErrorLogger for StdLogger {
    fn report_out(&mut self, msg: &str) {
        println!("{msg}");
    }

    fn report_err(&mut self, msg: &ErrorMessage) {
        if self.xml {
            self.sink.write_line(&format!("        {}", msg.to_xml()));
            return;
        }
        let text = template::render(msg, &self.template, &self.location_template, self.verbose);
        if !text.is_empty() {
            self.sink.write_line(&text);
        }
    }
}

/// A logger that records everything, used by tests and by `--errorlist`.
#[derive(Default)]
pub struct CollectingLogger {
    pub out: Vec<String>,
    pub errors: Vec<ErrorMessage>,
}

impl ErrorLogger for CollectingLogger {
    fn report_out(&mut self, msg: &str) {
        self.out.push(msg.to_string());
    }

    fn report_err(&mut self, msg: &ErrorMessage) {
        self.errors.push(msg.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Certainty, FileLocation, Severity};

    #[test]
    fn collecting_logger_keeps_everything() {
        let mut logger = CollectingLogger::default();
        logger.report_out("Checking x.c...");
        logger.report_err(&ErrorMessage::new(
            vec![FileLocation::new("x.c", 1, 1)],
            "x.c",
            Severity::Error,
            "boom",
            "testId",
            Certainty::Safe,
        ));
        assert_eq!(logger.out.len(), 1);
        assert_eq!(logger.errors.len(), 1);
        assert_eq!(logger.errors[0].id, "testId");
    }
}
