//! Command-line surface and its translation into `Project`/`Settings`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::checks::builtin_checks;
use crate::config::{parse_enable_list, OutputChannel, Platform, Project, Settings, ShowTime};
use crate::diagnostics::{Certainty, Severity};
use crate::executor;

#[derive(Parser, Debug)]
#[command(name = "ccheck")]
#[command(about = "Static analyzer for C and C++ code", long_about = None)]
#[command(version = crate::VERSION)]
pub struct Cli {
    /// Files or directories to analyze. Directories are searched
    /// recursively for C/C++ sources.
    pub paths: Vec<PathBuf>,

    /// Define a preprocessor macro.
    #[arg(short = 'D', value_name = "ID[=VALUE]")]
    pub define: Vec<String>,

    /// Undefine a preprocessor macro.
    #[arg(short = 'U', value_name = "ID")]
    pub undef: Vec<String>,

    /// Add an include search path.
    #[arg(short = 'I', value_name = "DIR")]
    pub include_dir: Vec<PathBuf>,

    /// Force inclusion of a file before the source.
    #[arg(long = "include", value_name = "FILE")]
    pub force_include: Vec<PathBuf>,

    /// Force the language: c or c++.
    #[arg(long, value_name = "LANG")]
    pub language: Option<String>,

    /// Target platform: unix32, unix64, win32A, win32W, win64, native,
    /// unspecified.
    #[arg(long, value_name = "PLATFORM")]
    pub platform: Option<String>,

    /// Language standard, e.g. c11 or c++17. Repeatable.
    #[arg(long = "std", value_name = "STD")]
    pub std: Vec<String>,

    /// Library configuration files (accepted for compatibility).
    #[arg(long, value_name = "FILE")]
    pub library: Vec<String>,

    /// Analyze every configuration, ignoring the limit.
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Honor inline `// ccheck-suppress` comments.
    #[arg(long = "inline-suppr")]
    pub inline_suppr: bool,

    /// Write an XML dump of the analysis per TU.
    #[arg(long)]
    pub dump: bool,

    /// Emit diagnostics as XML.
    #[arg(long)]
    pub xml: bool,

    /// XML format version (only 2 is supported).
    #[arg(long = "xml-version", value_name = "N")]
    pub xml_version: Option<u8>,

    /// Verbose messages.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Check the preprocessor configurations only.
    #[arg(long = "check-config")]
    pub check_config: bool,

    /// Report library-configuration gaps (accepted for compatibility).
    #[arg(long = "check-library")]
    pub check_library: bool,

    /// Install process-level exception handling.
    #[arg(long = "exception-handling")]
    pub exception_handling: bool,

    /// Preprocess only, like the compiler's -E.
    #[arg(short = 'E')]
    pub preprocess_only: bool,

    /// Enabled severities: all,warning,style,... with '-' to negate.
    #[arg(long, value_name = "LIST")]
    pub severity: Vec<String>,

    /// Enabled certainties: all,safe,inconclusive,experimental.
    #[arg(long, value_name = "LIST")]
    pub certainty: Vec<String>,

    /// Enabled checks: all plus per-name negation.
    #[arg(long, value_name = "LIST")]
    pub checks: Vec<String>,

    /// Enabled output channels: status,progress,verbose,config,findings,debug.
    #[arg(long, value_name = "LIST")]
    pub output: Vec<String>,

    /// Suppress a diagnostic: <id>[:<file>[:<line>]].
    #[arg(long = "suppress", value_name = "SPEC")]
    pub suppress: Vec<String>,

    /// File of suppression specs, one per line.
    #[arg(long = "suppressions-list", value_name = "FILE")]
    pub suppressions_list: Vec<PathBuf>,

    /// Suppressions in XML format.
    #[arg(long = "suppress-xml", value_name = "FILE")]
    pub suppress_xml: Vec<PathBuf>,

    /// Suppressions that only mask the exit code.
    #[arg(long = "exitcode-suppressions", value_name = "FILE")]
    pub exitcode_suppressions: Option<PathBuf>,

    /// Number of worker jobs (accepted; this build analyzes sequentially).
    #[arg(short = 'j', value_name = "N")]
    pub jobs: Option<usize>,

    /// Maximum configurations analyzed per TU.
    #[arg(long = "max-configs", value_name = "N")]
    pub max_configs: Option<usize>,

    /// Maximum depth of the cross-TU call-path search.
    #[arg(long = "max-ctu-depth", value_name = "N")]
    pub max_ctu_depth: Option<usize>,

    /// Build directory for incremental analysis.
    #[arg(long = "cppcheck-build-dir", value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Write diagnostics to a file instead of stderr.
    #[arg(long = "output-file", value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Ignore paths with this prefix.
    #[arg(short = 'i', value_name = "PATH")]
    pub ignore: Vec<PathBuf>,

    /// Analyze only files matching this glob.
    #[arg(long = "file-filter", value_name = "GLOB")]
    pub file_filter: Option<String>,

    /// Read the file list from a file, or '-' for stdin.
    #[arg(long = "file-list", value_name = "FILE")]
    pub file_list: Option<String>,

    /// File of include search paths, one per line.
    #[arg(long = "includes-file", value_name = "FILE")]
    pub includes_file: Option<PathBuf>,

    /// Exclude a path from configuration enumeration.
    #[arg(long = "config-exclude", value_name = "PATH")]
    pub config_exclude: Vec<String>,

    /// File of configuration-exclude paths.
    #[arg(long = "config-excludes-file", value_name = "FILE")]
    pub config_excludes_file: Option<PathBuf>,

    /// Use relative paths in output, optionally against the given bases.
    #[arg(long = "rp", value_name = "PATHS", num_args = 0..=1)]
    pub relative_paths: Option<Option<String>>,

    /// Output template: gcc, vs, edit, cppcheck2, or a format string.
    #[arg(long, value_name = "FORMAT")]
    pub template: Option<String>,

    /// Template for secondary locations.
    #[arg(long = "template-location", value_name = "FORMAT")]
    pub template_location: Option<String>,

    /// Exit code when diagnostics are found.
    #[arg(long = "error-exitcode", value_name = "N")]
    pub error_exitcode: Option<i32>,

    /// Timing report: file, summary or top5.
    #[arg(long, value_name = "MODE")]
    pub showtime: Option<String>,

    /// Print the documentation of every check.
    #[arg(long)]
    pub doc: bool,

    /// Print an XML list of every diagnostic the analyzer can emit.
    #[arg(long)]
    pub errorlist: bool,
}

/// Parse the process arguments and run. Returns the exit code.
pub fn run_from_args() -> Result<i32> {
    let cli = Cli::parse();
    run_cli(cli)
}

pub fn run_cli(cli: Cli) -> Result<i32> {
    if cli.doc {
        print_doc();
        return Ok(0);
    }
    if cli.errorlist {
        print_errorlist();
        return Ok(0);
    }

    let (project, settings) = build_configuration(&cli)?;

    let mut paths = cli.paths.clone();
    if let Some(list) = &cli.file_list {
        paths.extend(executor::read_file_list(list)?);
    }
    if paths.is_empty() {
        bail!("no input files given; pass files, directories or --file-list");
    }
    let files = executor::expand_inputs(&paths, &cli.ignore, cli.file_filter.as_deref())?;
    executor::run(&project, &settings, files)
}

/// Translate CLI arguments into the immutable run configuration.
pub fn build_configuration(cli: &Cli) -> Result<(Project, Settings)> {
    let mut project = Project::new();
    let mut settings = Settings::default();

    project.user_defines = cli.define.join(";");
    project.user_undefs = cli.undef.iter().cloned().collect();
    project.include_paths = cli.include_dir.clone();
    if let Some(file) = &cli.includes_file {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read includes file {}", file.display()))?;
        project
            .include_paths
            .extend(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(PathBuf::from));
    }
    project.force_includes = cli.force_include.clone();
    project.force = cli.force;
    project.build_dir = cli.build_dir.clone();
    project.preprocess_only = cli.preprocess_only;
    if let Some(n) = cli.max_configs {
        if n < 1 {
            bail!("--max-configs must be at least 1");
        }
        project.max_configs = n;
    }
    if let Some(n) = cli.max_ctu_depth {
        project.max_ctu_depth = n;
    }
    if let Some(jobs) = cli.jobs {
        if jobs == 0 || jobs > 10_000 {
            bail!("-j must be between 1 and 10000");
        }
    }
    if let Some(platform) = &cli.platform {
        project.platform = Platform::from_name(platform)?;
    }
    for std in &cli.std {
        project.standards.set(std)?;
    }
    if let Some(language) = &cli.language {
        project.language = Some(executor::forced_language(language)?);
    }

    for list in &cli.severity {
        parse_enable_list(list, |name, enable| {
            apply_severity(&mut project, name, enable)
        })?;
    }
    for list in &cli.certainty {
        parse_enable_list(list, |name, enable| {
            apply_certainty(&mut project, name, enable)
        })?;
    }
    for list in &cli.checks {
        parse_enable_list(list, |name, enable| {
            if name == "all" {
                project.checks.set_all(enable);
            } else {
                project.checks.set_enabled(name, enable);
            }
            Ok(())
        })?;
    }
    for list in &cli.output {
        parse_enable_list(list, |name, enable| {
            apply_output(&mut settings, name, enable)
        })?;
    }

    for spec in &cli.suppress {
        project.suppressions.add_spec(spec)?;
    }
    for file in &cli.suppressions_list {
        project.suppressions.parse_list_file(file)?;
    }
    for file in &cli.suppress_xml {
        project.suppressions.parse_xml_file(file)?;
    }
    if let Some(file) = &cli.exitcode_suppressions {
        project.exitcode_suppressions.parse_list_file(file)?;
    }

    project.config_excludes = cli.config_exclude.clone();
    if let Some(file) = &cli.config_excludes_file {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read config excludes {}", file.display()))?;
        project
            .config_excludes
            .extend(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from));
    }

    if let Some(rp) = &cli.relative_paths {
        project.relative_paths = true;
        if let Some(paths) = rp {
            project.base_paths = paths.split(';').map(PathBuf::from).collect();
        }
    }

    settings.verbose = cli.verbose;
    settings.xml = cli.xml;
    if let Some(version) = cli.xml_version {
        if version != 2 {
            bail!("only --xml-version=2 is supported");
        }
        settings.xml = true;
        settings.xml_version = version;
    }
    settings.dump = cli.dump;
    settings.check_configuration = cli.check_config;
    settings.inline_suppressions = cli.inline_suppr;
    settings.output_file = cli.output_file.clone();
    if let Some(template) = &cli.template {
        settings.template_format = template.clone();
    }
    if let Some(location) = &cli.template_location {
        settings.template_location = location.clone();
    }
    if let Some(code) = cli.error_exitcode {
        settings.error_exitcode = code;
    }
    if let Some(mode) = &cli.showtime {
        settings.show_time = match mode.as_str() {
            "file" => ShowTime::File,
            "summary" => ShowTime::Summary,
            "top5" => ShowTime::Top5,
            other => bail!("unknown --showtime mode '{other}'"),
        };
    }

    Ok((project, settings))
}

fn apply_severity(project: &mut Project, name: &str, enable: bool) -> Result<()> {
    if name == "all" {
        for &sev in Severity::SELECTABLE {
            project.severity.set_enabled(sev, enable);
        }
        return Ok(());
    }
    match Severity::from_str(name) {
        Some(Severity::Error) | Some(Severity::None) | None => {
            bail!("unknown severity '{name}'")
        }
        Some(sev) => {
            project.severity.set_enabled(sev, enable);
            Ok(())
        }
    }
}

fn apply_certainty(project: &mut Project, name: &str, enable: bool) -> Result<()> {
    if name == "all" {
        for &c in Certainty::SELECTABLE {
            project.certainty.set_enabled(c, enable);
        }
        return Ok(());
    }
    match Certainty::from_str(name) {
        Some(c) => {
            project.certainty.set_enabled(c, enable);
            Ok(())
        }
        None => bail!("unknown certainty '{name}'"),
    }
}

fn apply_output(settings: &mut Settings, name: &str, enable: bool) -> Result<()> {
    if name == "all" {
        for &channel in OutputChannel::ALL {
            settings.output.set_enabled(channel, enable);
        }
        return Ok(());
    }
    match OutputChannel::from_name(name) {
        Some(channel) => {
            settings.output.set_enabled(channel, enable);
            Ok(())
        }
        None => bail!("unknown output channel '{name}'"),
    }
}

fn print_doc() {
    for check in builtin_checks() {
        let info = check.class_info();
        if info.is_empty() {
            continue;
        }
        println!("## {}\n", check.name());
        println!("{info}");
    }
}

fn print_errorlist() {
    let checks = builtin_checks();
    println!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    println!("<results version=\"2\">");
    println!("    <cppcheck version=\"{}\"/>", crate::VERSION);
    println!("    <errors>");
    for msg in crate::driver::error_message_list(&checks) {
        println!("        {}", msg.to_xml());
    }
    println!("    </errors>");
    println!("</results>");
}

/// The extension list used when expanding directories; part of the CLI
/// contract.
pub fn source_extensions() -> &'static [&'static str] {
    crate::config::SOURCE_EXTENSIONS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ccheck").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defines_and_includes_collect() {
        let cli = parse(&["-DA=1", "-DB", "-Iinc", "-UX", "src/"]);
        let (project, _) = build_configuration(&cli).unwrap();
        assert_eq!(project.user_defines, "A=1;B");
        assert!(project.user_undefs.contains("X"));
        assert_eq!(project.include_paths, vec![PathBuf::from("inc")]);
    }

    #[test]
    fn severity_list_with_negation() {
        let cli = parse(&["--severity=all,-style", "x.c"]);
        let (project, _) = build_configuration(&cli).unwrap();
        assert!(project.severity.is_enabled(Severity::Warning));
        assert!(project.severity.is_enabled(Severity::Information));
        assert!(!project.severity.is_enabled(Severity::Style));
        // error stays enabled regardless.
        assert!(project.severity.is_enabled(Severity::Error));
    }

    #[test]
    fn suppress_spec_is_applied() {
        let cli = parse(&["--suppress=uninitvar:a.c:3", "a.c"]);
        let (mut project, _) = build_configuration(&cli).unwrap();
        let key = crate::diagnostics::suppressions::MessageKey {
            id: "uninitvar".into(),
            file: "a.c".into(),
            line: Some(3),
        };
        assert!(project.suppressions.is_suppressed(&key));
    }

    #[test]
    fn limits_are_validated() {
        let cli = parse(&["--max-configs=0", "x.c"]);
        assert!(build_configuration(&cli).is_err());
        let cli = parse(&["-j", "20000", "x.c"]);
        assert!(build_configuration(&cli).is_err());
        let cli = parse(&["--max-configs=3", "--max-ctu-depth=5", "x.c"]);
        let (project, _) = build_configuration(&cli).unwrap();
        assert_eq!(project.max_configs, 3);
        assert_eq!(project.max_ctu_depth, 5);
    }

    #[test]
    fn xml_version_implies_xml() {
        let cli = parse(&["--xml-version=2", "x.c"]);
        let (_, settings) = build_configuration(&cli).unwrap();
        assert!(settings.xml);
        let cli = parse(&["--xml-version=1", "x.c"]);
        assert!(build_configuration(&cli).is_err());
    }

    #[test]
    fn error_exitcode_and_template_flow_into_settings() {
        let cli = parse(&["--error-exitcode=7", "--template=vs", "x.c"]);
        let (_, settings) = build_configuration(&cli).unwrap();
        assert_eq!(settings.error_exitcode, 7);
        assert_eq!(settings.template_format, "vs");
    }

    #[test]
    fn unknown_platform_is_an_error() {
        let cli = parse(&["--platform=pdp11", "x.c"]);
        assert!(build_configuration(&cli).is_err());
    }
}
