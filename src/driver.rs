//! The per-TU analysis driver and the diagnostic bus.
//!
//! `Checker` sequences the passes for one TU: preprocessing, cache
//! lookup, configuration enumeration, tokenization, checks, and the
//! analyzer-info write. It also owns diagnostic delivery: rendering,
//! dedup, suppression matching and exit-code bookkeeping. One `Checker`
//! serves a whole run; the whole-program phase runs on it last.

use std::collections::{BTreeSet, HashSet};

use anyhow::{Context as _, Result};
use tracing::{debug, info_span};

use crate::analyzerinfo::AnalyzerInformation;
use crate::checks::{Check, Context};
use crate::config::{Language, OutputChannel, Project, Settings};
use crate::ctu::CtuInfo;
use crate::diagnostics::suppressions::Suppressions;
use crate::diagnostics::template;
use crate::diagnostics::{Certainty, ErrorMessage, FileLocation, Severity};
use crate::dump::DumpWriter;
use crate::errors::InternalError;
use crate::output::ErrorLogger;
use crate::preprocessor::{self, lex, PreprocError, PreprocErrorKind, Preprocessor};
use crate::tokenizer::Tokenizer;

const CWE_POOR_QUALITY: u16 = 398;

pub struct Checker<'run> {
    project: &'run Project,
    settings: &'run Settings,
    checks: &'run [Box<dyn Check>],
    logger: &'run mut dyn ErrorLogger,
    /// Run-local suppression state; inline suppressions accumulate here.
    nomsg: Suppressions,
    nofail: Suppressions,
    use_global_suppressions: bool,
    template: String,
    location_template: String,
    /// Rendered messages already delivered this run.
    error_list: HashSet<String>,
    pub found_errors: bool,
    pub suppress_internal_error_found: bool,
    current_config: String,
}

impl<'run> Checker<'run> {
    pub fn new(
        project: &'run Project,
        settings: &'run Settings,
        checks: &'run [Box<dyn Check>],
        logger: &'run mut dyn ErrorLogger,
        use_global_suppressions: bool,
    ) -> Checker<'run> {
        let (template, location_template) =
            template::expand_format(&settings.template_format, &settings.template_location);
        Checker {
            project,
            settings,
            checks,
            logger,
            nomsg: project.suppressions.clone(),
            nofail: project.exitcode_suppressions.clone(),
            use_global_suppressions,
            template,
            location_template,
            error_list: HashSet::new(),
            found_errors: false,
            suppress_internal_error_found: false,
            current_config: String::new(),
        }
    }

    /// Analyze one TU from disk.
    pub fn check_file(&mut self, ctu: &mut CtuInfo) {
        let path = ctu.source_file.clone();
        match std::fs::read_to_string(&path) {
            Ok(content) => self.check_content(ctu, &content),
            Err(err) => {
                self.internal_error(&path, &err.to_string());
                self.found_errors = true;
            }
        }
    }

    /// Analyze one TU from an in-memory buffer (the path in `ctu` is used
    /// in diagnostics).
    pub fn check_content(&mut self, ctu: &mut CtuInfo, content: &str) {
        let path = ctu.source_file.clone();
        let span = info_span!("check_tu", file = %path);
        let _guard = span.enter();
        if let Err(err) = self.check_tu(ctu, content) {
            self.internal_error(&path, &format!("{err:#}"));
            self.found_errors = true;
        }
    }

    fn check_tu(&mut self, ctu: &mut CtuInfo, content: &str) -> Result<()> {
        if Settings::terminated() {
            return Ok(());
        }
        let path = ctu.source_file.clone();
        if self.settings.output.is_enabled(OutputChannel::Status) {
            self.logger.report_out(&format!("Checking {path}..."));
            if self.settings.verbose {
                let includes: Vec<String> = self
                    .project
                    .include_paths
                    .iter()
                    .map(|p| format!(" -I{}", p.display()))
                    .collect();
                let undefs: Vec<&str> =
                    self.project.user_undefs.iter().map(String::as_str).collect();
                self.logger
                    .report_out(&format!("Defines:{}", self.project.user_defines));
                self.logger.report_out(&format!("Undefines: {}", undefs.join("; ")));
                self.logger.report_out(&format!("Includes:{}", includes.concat()));
                self.logger
                    .report_out(&format!("Platform:{}", self.project.platform_string()));
            }
        }

        let mut preprocessor = Preprocessor::new(self.project);
        let mut files = vec![path.clone()];

        let raw = match lex(content, 0) {
            Ok(raw) => raw,
            Err(err) => {
                self.preprocessor_fatal(ctu, &files, err);
                return Ok(());
            }
        };
        let raw = match preprocessor.load_files(raw, &mut files) {
            Ok(raw) => raw,
            Err(err) => {
                self.preprocessor_fatal(ctu, &files, err);
                return Ok(());
            }
        };
        self.report_preprocessor_outputs(ctu, &files, preprocessor.outputs().to_vec());

        if self.settings.inline_suppressions {
            preprocessor::suppressions::inline_suppressions(&raw, &files, &mut self.nomsg);
        }
        let raw = Preprocessor::strip_comments(raw);

        if self.project.build_dir.is_some() {
            let toolinfo = format!(
                "{}{} {}{}{}",
                crate::VERSION,
                self.project.severity.int_value(),
                self.project.certainty.int_value(),
                self.project.user_defines,
                self.nomsg.checksum_text()
            );
            let checksum = Preprocessor::calculate_checksum(&raw, &toolinfo);
            if ctu.try_load_from_file(checksum, self.checks) {
                debug!(checksum, "cache hit, replaying stored diagnostics");
                for msg in ctu.errors.clone() {
                    self.report_err(msg, None);
                }
                return Ok(());
            }
        }

        preprocessor.set_directives(&raw);

        let configurations: BTreeSet<String> = if (self.project.check_all_configurations
            && self.project.user_defines.is_empty())
            || self.project.force
        {
            preprocessor.get_configs(&raw, &files)
        } else {
            BTreeSet::from([self.project.user_defines.clone()])
        };

        if self.settings.check_configuration {
            for cfg in &configurations {
                let _ = preprocessor.getcode(&raw, cfg, &files);
            }
            return Ok(());
        }

        if !self.project.force && configurations.len() > self.project.max_configs {
            self.too_many_configs_error(&path, configurations.len());
        }

        let mut dump_writer = if self.settings.dump {
            let dump_path = match (&self.settings.dump_file, &ctu.analyzer_file) {
                (Some(file), _) => file.clone(),
                (None, Some(analyzer)) => {
                    let mut p = analyzer.clone();
                    p.set_extension("dump");
                    p
                }
                (None, None) => std::path::PathBuf::from(format!("{path}.dump")),
            };
            Some(DumpWriter::new(&dump_path, self.project, &files, &raw))
        } else {
            None
        };

        let lang = self
            .project
            .language
            .or_else(|| Language::from_path(std::path::Path::new(&path)))
            .unwrap_or(Language::Cpp);

        let mut checksums0: HashSet<u64> = HashSet::new();
        let mut checksums1: HashSet<u64> = HashSet::new();
        let mut checked = 0usize;
        let mut has_valid_config = false;
        let mut configuration_errors: Vec<String> = Vec::new();

        for cfg in &configurations {
            if Settings::terminated() {
                break;
            }
            checked += 1;
            if !self.project.force && checked > self.project.max_configs {
                break;
            }
            self.current_config = merge_config(&self.project.user_defines, cfg);

            if self.project.preprocess_only {
                match preprocessor.getcode(&raw, &self.current_config, &files) {
                    Ok(code) => self.logger.report_out(&code),
                    Err(err) => configuration_errors.push(config_error_line(cfg, &files, &err)),
                }
                continue;
            }

            let processed = match preprocessor.preprocess(&raw, &self.current_config, &files) {
                Ok(p) => p,
                Err(err) => {
                    // A branch-specific #error does not count as an
                    // analyzed configuration.
                    configuration_errors.push(config_error_line(cfg, &files, &err));
                    checked -= 1;
                    continue;
                }
            };

            let mut tokenizer = Tokenizer::new(self.project, self.settings, lang);
            tokenizer.create_tokens(&processed, files.clone());
            if tokenizer.tokens().is_none() {
                continue;
            }
            has_valid_config = true;

            if self.settings.output.is_enabled(OutputChannel::Status)
                && (!self.current_config.is_empty() || checked > 1)
            {
                self.logger
                    .report_out(&format!("Checking {path}: {}...", self.current_config));
            }

            self.run_rules("raw", &tokenizer);

            match tokenizer.simplify_tokens0(&self.current_config) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    self.internal_error_diag(err, &tokenizer, ctu);
                    continue;
                }
            }

            if self.project.force || self.project.max_configs > 1 {
                let checksum = tokenizer.list.calculate_checksum();
                if !checksums0.insert(checksum) {
                    let cfg_now = self.current_config.clone();
                    self.purged_configuration_message(&path, &cfg_now, ctu);
                    continue;
                }
            }

            match tokenizer.simplify_tokens1() {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    self.internal_error_diag(err, &tokenizer, ctu);
                    continue;
                }
            }

            if let Some(writer) = dump_writer.as_mut() {
                writer.add_configuration(&self.current_config, &tokenizer, preprocessor.directives());
            }

            if self.project.force || self.project.max_configs > 1 {
                let checksum = tokenizer.list.calculate_checksum();
                if !checksums1.insert(checksum) {
                    let cfg_now = self.current_config.clone();
                    self.purged_configuration_message(&path, &cfg_now, ctu);
                    continue;
                }
            }

            self.check_normal_tokens(&tokenizer, ctu);
            self.run_rules("normal", &tokenizer);
            self.run_rules("simple", &tokenizer);
        }

        if !has_valid_config
            && configurations.len() > 1
            && self.project.severity.is_enabled(Severity::Information)
        {
            self.no_valid_configuration(&path, &configuration_errors);
        }

        if let Some(writer) = dump_writer {
            writer.finish().context("failed to write dump file")?;
        }

        if self.project.build_dir.is_some() {
            ctu.write_file().context("failed to write analyzer info")?;
        }
        Ok(())
    }

    fn check_normal_tokens(&mut self, tokenizer: &Tokenizer<'_>, ctu: &mut CtuInfo) {
        ctu.parse_tokens(tokenizer);
        let checks = self.checks;
        let ctx = Context::new(self.project, self.settings, tokenizer);

        for check in checks {
            if Settings::terminated() || tokenizer.is_max_time() {
                return;
            }
            if let Some(file_info) = check.get_file_info(&ctx) {
                ctu.add_check_info(check.name(), file_info);
            }
        }

        for check in checks {
            if Settings::terminated() || tokenizer.is_max_time() {
                return;
            }
            if !self.project.checks.is_enabled(check.name()) {
                continue;
            }
            debug!(check = check.name(), "running");
            for msg in check.run_checks(&ctx) {
                if self.severity_enabled(msg.severity) {
                    self.report_err(msg, Some(ctu));
                }
            }
        }
    }

    /// Whole-program phase: join every TU's summaries and give each check
    /// a chance to report. Returns whether anything was found.
    pub fn analyse_whole_program(&mut self, info: &AnalyzerInformation) -> bool {
        let mut combined = CtuInfo::default();
        for ctu in info.ctus() {
            combined
                .function_calls
                .extend(ctu.function_calls.iter().cloned());
            combined
                .nested_calls
                .extend(ctu.nested_calls.iter().cloned());
        }
        debug!(
            calls = combined.function_calls.len(),
            nested = combined.nested_calls.len(),
            "whole-program join"
        );
        let checks = self.checks;
        let mut errors = false;
        for check in checks {
            if Settings::terminated() {
                break;
            }
            let msgs = check.analyse_whole_program(&combined, info, self.project);
            errors |= !msgs.is_empty();
            for msg in msgs {
                if self.severity_enabled(msg.severity) {
                    self.report_err(msg, None);
                }
            }
        }
        errors
    }

    fn severity_enabled(&self, severity: Severity) -> bool {
        severity == Severity::Error || self.project.severity.is_enabled(severity)
    }

    /// The diagnostic bus: render, dedup, suppress, deliver.
    pub fn report_err(&mut self, mut msg: ErrorMessage, ctu: Option<&mut CtuInfo>) {
        self.suppress_internal_error_found = false;
        if self.project.relative_paths {
            for loc in &mut msg.call_stack {
                loc.file = relative_path(&loc.file, &self.project.base_paths);
            }
        }
        let rendered =
            template::render(&msg, &self.template, &self.location_template, self.settings.verbose);
        if rendered.is_empty() {
            return;
        }
        if !self.error_list.insert(rendered) {
            return;
        }
        let key = msg.suppression_key();
        let suppressed = if self.use_global_suppressions {
            self.nomsg.is_suppressed(&key)
        } else {
            self.nomsg.is_suppressed_local(&key)
        };
        if suppressed {
            self.suppress_internal_error_found = true;
            return;
        }
        if !self.nofail.is_suppressed(&key) {
            self.found_errors = true;
        }
        self.logger.report_err(&msg);
        if let Some(ctu) = ctu {
            ctu.report_err(msg);
        }
    }

    fn report_preprocessor_outputs(
        &mut self,
        ctu: &mut CtuInfo,
        files: &[String],
        outputs: Vec<PreprocError>,
    ) {
        for out in outputs {
            let (id, severity, enabled) = match out.kind {
                PreprocErrorKind::MissingHeader => (
                    "missingInclude",
                    Severity::Information,
                    self.project.checks.is_enabled("missingInclude"),
                ),
                PreprocErrorKind::PortabilityBackslash => (
                    "portabilityBackslash",
                    Severity::Portability,
                    self.project.severity.is_enabled(Severity::Portability),
                ),
                PreprocErrorKind::Warning => (
                    "preprocessorWarning",
                    Severity::Warning,
                    self.project.severity.is_enabled(Severity::Warning),
                ),
                _ => continue,
            };
            if !enabled {
                continue;
            }
            let file = files
                .get(out.file_index as usize)
                .cloned()
                .unwrap_or_default();
            let msg = ErrorMessage::new(
                vec![FileLocation::new(file, out.line, out.col)],
                ctu.source_file.clone(),
                severity,
                &out.message,
                id,
                Certainty::Safe,
            );
            self.report_err(msg, Some(ctu));
        }
    }

    fn preprocessor_fatal(&mut self, ctu: &mut CtuInfo, files: &[String], err: PreprocError) {
        let file = files
            .get(err.file_index as usize)
            .cloned()
            .unwrap_or_else(|| ctu.source_file.clone());
        let msg = ErrorMessage::new(
            vec![FileLocation::new(file, err.line, err.col)],
            ctu.source_file.clone(),
            Severity::Error,
            &err.message,
            "syntaxError",
            Certainty::Safe,
        );
        self.report_err(msg, Some(ctu));
    }

    fn internal_error_diag(&mut self, err: InternalError, tokenizer: &Tokenizer<'_>, ctu: &mut CtuInfo) {
        let call_stack = match err.token {
            Some(tok) => vec![tokenizer.list.location(tok)],
            None => vec![FileLocation::new(ctu.source_file.clone(), 0, 0)],
        };
        let msg = ErrorMessage::new(
            call_stack,
            ctu.source_file.clone(),
            Severity::Error,
            &err.message,
            err.id.clone(),
            Certainty::Safe,
        );
        self.report_err(msg, Some(ctu));
    }

    fn too_many_configs_error(&mut self, file: &str, configurations: usize) {
        let mut text = format!(
            "Too many #ifdef configurations - ccheck only checks {}",
            self.project.max_configs
        );
        if configurations > self.project.max_configs {
            text.push_str(&format!(
                " of {configurations} configurations. Use --force to check all configurations.\n"
            ));
        }
        text.push_str(
            "The checking of the file will be interrupted because there are too many #ifdef \
             configurations. Checking of all #ifdef configurations can be forced by --force \
             command line option. However that may increase the checking time.",
        );
        let msg = ErrorMessage::new(
            vec![FileLocation::new(file, 0, 0)],
            "",
            Severity::Information,
            &text,
            "toomanyconfigs",
            Certainty::Safe,
        )
        .with_cwe(CWE_POOR_QUALITY);
        self.report_err(msg, None);
    }

    fn purged_configuration_message(&mut self, file: &str, configuration: &str, ctu: &mut CtuInfo) {
        let msg = ErrorMessage::new(
            vec![FileLocation::new(file, 0, 0)],
            "",
            Severity::Information,
            &format!(
                "The configuration '{configuration}' was not checked because its code equals another one."
            ),
            "purgedConfiguration",
            Certainty::Safe,
        );
        self.report_err(msg, Some(ctu));
    }

    fn no_valid_configuration(&mut self, file: &str, configuration_errors: &[String]) {
        let mut text = String::from(
            "This file is not analyzed. ccheck failed to extract a valid configuration. \
             Use -v for more details.\nThis file is not analyzed. ccheck failed to extract a \
             valid configuration. The tested configurations have these preprocessor errors:",
        );
        for err in configuration_errors {
            text.push('\n');
            text.push_str(err);
        }
        let msg = ErrorMessage::new(
            vec![FileLocation::new(file, 0, 0)],
            file,
            Severity::Information,
            &text,
            "noValidConfiguration",
            Certainty::Safe,
        );
        self.report_err(msg, None);
    }

    fn internal_error(&mut self, filename: &str, what: &str) {
        let text = format!(
            "Bailing out from checking {filename} since there was an internal error: {what}"
        );
        if self.project.severity.is_enabled(Severity::Information) {
            let msg = ErrorMessage::new(
                vec![FileLocation::new(filename, 0, 0)],
                "",
                Severity::Information,
                &text,
                "internalError",
                Certainty::Safe,
            );
            self.report_err(msg, None);
        } else {
            self.logger.report_out(&text);
        }
    }

    /// Integration seam for the external rule/regex engine. The engine is
    /// not linked; with rules configured this is where `{file, token
    /// text, pattern}` would be handed over.
    fn run_rules(&mut self, token_list: &str, _tokenizer: &Tokenizer<'_>) {
        if self.project.rules.iter().any(|r| r.token_list == token_list) {
            debug!(token_list, "rules configured but no rule engine is linked");
        }
    }
}

/// Strip the longest matching base-path prefix (`-rp` output mode).
fn relative_path(file: &str, base_paths: &[std::path::PathBuf]) -> String {
    let mut best: Option<&str> = None;
    for base in base_paths {
        let base = base.to_string_lossy();
        if let Some(rest) = file.strip_prefix(base.as_ref()) {
            let rest = rest.trim_start_matches(['/', '\\']);
            if best.map(|b| rest.len() < b.len()).unwrap_or(true) {
                best = Some(rest);
            }
        }
    }
    match best {
        Some(rest) => rest.to_string(),
        None => file.to_string(),
    }
}

fn config_error_line(cfg: &str, files: &[String], err: &PreprocError) -> String {
    let shown = if cfg.is_empty() { "''" } else { cfg };
    let file = files
        .get(err.file_index as usize)
        .map(String::as_str)
        .unwrap_or("");
    format!("{shown} : [{file}:{}] {}", err.line, err.message)
}

/// Merge user defines with an enumerated configuration, avoiding
/// duplicate elements.
fn merge_config(user_defines: &str, cfg: &str) -> String {
    if user_defines.is_empty() {
        return cfg.to_string();
    }
    let mut merged = user_defines.to_string();
    let user: Vec<&str> = user_defines.split(';').collect();
    for element in cfg.split(';').filter(|e| !e.is_empty()) {
        if !user.contains(&element) {
            merged.push(';');
            merged.push_str(element);
        }
    }
    merged
}

/// Every diagnostic id the driver itself can emit, plus each check's
/// examples. Used by `--errorlist` and the id-set tests.
pub fn error_message_list(checks: &[Box<dyn Check>]) -> Vec<ErrorMessage> {
    let loc = || vec![FileLocation::new("", 0, 0)];
    let mut out = vec![
        ErrorMessage::new(
            loc(),
            "",
            Severity::Information,
            "Too many #ifdef configurations - ccheck only checks 12 configurations.",
            "toomanyconfigs",
            Certainty::Safe,
        )
        .with_cwe(CWE_POOR_QUALITY),
        ErrorMessage::new(
            loc(),
            "",
            Severity::Information,
            "The configuration 'X' was not checked because its code equals another one.",
            "purgedConfiguration",
            Certainty::Safe,
        ),
        ErrorMessage::new(
            loc(),
            "",
            Severity::Information,
            "This file is not analyzed. ccheck failed to extract a valid configuration.",
            "noValidConfiguration",
            Certainty::Safe,
        ),
        ErrorMessage::new(
            loc(),
            "",
            Severity::Information,
            "Bailing out from checking file.c since there was an internal error: message",
            "internalError",
            Certainty::Safe,
        ),
        ErrorMessage::new(
            loc(),
            "",
            Severity::Error,
            "syntax error",
            "syntaxError",
            Certainty::Safe,
        ),
        ErrorMessage::new(
            loc(),
            "",
            Severity::Information,
            "Include file: \"header.h\" not found.",
            "missingInclude",
            Certainty::Safe,
        ),
        ErrorMessage::new(
            loc(),
            "",
            Severity::Portability,
            "Include file \"a\\b.h\" uses backslash as path separator",
            "portabilityBackslash",
            Certainty::Safe,
        ),
    ];
    for check in checks {
        out.extend(check.get_error_messages());
    }
    out
}
