//! Run configuration: the project-wide [`Project`] shared by every TU and
//! the output-oriented [`Settings`]. Both are built before analysis starts
//! and only borrowed afterwards.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::diagnostics::suppressions::Suppressions;
use crate::diagnostics::{Certainty, Severity};

/// Source language of a translation unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    C,
    Cpp,
}

impl Language {
    pub fn from_extension(ext: &str) -> Option<Language> {
        match ext {
            "c" => Some(Language::C),
            "cc" | "cpp" | "cxx" | "c++" | "tpp" | "txx" => Some(Language::Cpp),
            _ => None,
        }
    }

    pub fn from_path(path: &std::path::Path) -> Option<Language> {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .and_then(|e| Language::from_extension(&e))
    }
}

/// Extensions accepted when a directory argument is expanded.
pub const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "c++", "tpp", "txx"];

/// Bit widths and byte sizes of the target platform.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub name: String,
    pub char_bit: u32,
    pub short_bit: u32,
    pub int_bit: u32,
    pub long_bit: u32,
    pub long_long_bit: u32,
    pub sizeof_pointer: u32,
}

impl Platform {
    pub fn unspecified() -> Platform {
        Platform {
            name: "unspecified".into(),
            char_bit: 8,
            short_bit: 16,
            int_bit: 32,
            long_bit: 32,
            long_long_bit: 64,
            sizeof_pointer: 8,
        }
    }

    /// The host platform. An explicit `--platform` always wins; `native`
    /// takes the pointer width this binary was compiled with.
    pub fn native() -> Platform {
        Platform {
            name: "native".into(),
            long_bit: if std::mem::size_of::<usize>() == 8 { 64 } else { 32 },
            sizeof_pointer: std::mem::size_of::<*const ()>() as u32,
            ..Platform::unspecified()
        }
    }

    pub fn from_name(name: &str) -> Result<Platform> {
        let base = Platform::unspecified();
        Ok(match name {
            "unix32" => Platform {
                name: name.into(),
                long_bit: 32,
                sizeof_pointer: 4,
                ..base
            },
            "unix64" => Platform {
                name: name.into(),
                long_bit: 64,
                sizeof_pointer: 8,
                ..base
            },
            "win32A" | "win32W" => Platform {
                name: name.into(),
                long_bit: 32,
                sizeof_pointer: 4,
                ..base
            },
            "win64" => Platform {
                name: name.into(),
                long_bit: 32,
                sizeof_pointer: 8,
                ..base
            },
            "native" => Platform::native(),
            "unspecified" => base,
            _ => bail!("unrecognized platform: '{name}'"),
        })
    }

    pub fn pointer_bit(&self) -> u32 {
        self.sizeof_pointer * self.char_bit
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::unspecified()
    }
}

/// Language standards in effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standards {
    pub c: String,
    pub cpp: String,
}

impl Default for Standards {
    fn default() -> Self {
        Standards {
            c: "c11".into(),
            cpp: "c++17".into(),
        }
    }
}

impl Standards {
    /// Apply a `--std=` argument to whichever language it names.
    pub fn set(&mut self, std: &str) -> Result<()> {
        if std.starts_with("c++") {
            self.cpp = std.to_string();
        } else if std.starts_with('c') {
            self.c = std.to_string();
        } else {
            bail!("unrecognized standard: '{std}'");
        }
        Ok(())
    }
}

/// Generic enable set over a closed enum of ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnableSet<T: Ord + Copy> {
    enabled: BTreeSet<T>,
}

impl<T: Ord + Copy> Default for EnableSet<T> {
    fn default() -> Self {
        EnableSet {
            enabled: BTreeSet::new(),
        }
    }
}

impl<T: Ord + Copy> EnableSet<T> {
    pub fn enable(&mut self, value: T) {
        self.enabled.insert(value);
    }

    pub fn disable(&mut self, value: T) {
        self.enabled.remove(&value);
    }

    pub fn set_enabled(&mut self, value: T, enable: bool) {
        if enable {
            self.enable(value);
        } else {
            self.disable(value);
        }
    }

    pub fn is_enabled(&self, value: T) -> bool {
        self.enabled.contains(&value)
    }

    /// Stable integer form folded into the build-dir checksum.
    pub fn int_value(&self) -> u32
    where
        T: Into<u32>,
    {
        self.enabled.iter().fold(0u32, |acc, &v| {
            let bit: u32 = v.into();
            acc | (1u32 << bit)
        })
    }
}

impl From<Severity> for u32 {
    fn from(s: Severity) -> u32 {
        s as u32
    }
}

impl From<Certainty> for u32 {
    fn from(c: Certainty) -> u32 {
        c as u32
    }
}

/// Parse a comma-separated enable list (`all,warning,-style`), applying
/// each element through `apply(name, enable)`.
pub fn parse_enable_list(
    list: &str,
    mut apply: impl FnMut(&str, bool) -> Result<()>,
) -> Result<()> {
    for raw in list.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("empty element in enable list '{list}'");
        }
        let (name, enable) = match raw.strip_prefix('-') {
            Some(rest) => (rest, false),
            None => (raw, true),
        };
        apply(name, enable)?;
    }
    Ok(())
}

/// Check enabling: `all` plus per-name overrides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChecksEnable {
    all: bool,
    overrides: std::collections::BTreeMap<String, bool>,
}

impl Default for ChecksEnable {
    /// Default mirrors `--checks=all,-missingInclude,-unusedFunction`.
    fn default() -> Self {
        let mut overrides = std::collections::BTreeMap::new();
        overrides.insert("missingInclude".to_string(), false);
        overrides.insert("unusedFunction".to_string(), false);
        ChecksEnable {
            all: true,
            overrides,
        }
    }
}

impl ChecksEnable {
    pub fn set_all(&mut self, enable: bool) {
        self.all = enable;
        self.overrides.clear();
    }

    pub fn set_enabled(&mut self, name: &str, enable: bool) {
        self.overrides.insert(name.to_string(), enable);
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        *self.overrides.get(name).unwrap_or(&self.all)
    }
}

/// Output channels selectable through `--output=`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutputChannel {
    Status,
    Progress,
    Verbose,
    Config,
    Findings,
    Debug,
}

impl OutputChannel {
    pub fn from_name(name: &str) -> Option<OutputChannel> {
        Some(match name {
            "status" => OutputChannel::Status,
            "progress" => OutputChannel::Progress,
            "verbose" => OutputChannel::Verbose,
            "config" => OutputChannel::Config,
            "findings" => OutputChannel::Findings,
            "debug" => OutputChannel::Debug,
            _ => return None,
        })
    }

    pub const ALL: &'static [OutputChannel] = &[
        OutputChannel::Status,
        OutputChannel::Progress,
        OutputChannel::Verbose,
        OutputChannel::Config,
        OutputChannel::Findings,
        OutputChannel::Debug,
    ];
}

/// External rule fed to a regex engine; the engine itself is not linked,
/// this is the integration seam only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub token_list: String,
    pub pattern: String,
    pub id: String,
    pub severity: Severity,
    pub summary: String,
}

/// User configuration shared by every TU of a run. Immutable during
/// analysis except for the suppression bookkeeping, which records matches.
#[derive(Clone, Debug, Default)]
pub struct Project {
    /// `-D` defines joined by `;`, e.g. `A=1;B`.
    pub user_defines: String,
    /// `-U` undefs.
    pub user_undefs: BTreeSet<String>,
    pub include_paths: Vec<PathBuf>,
    /// `--include=` forced includes.
    pub force_includes: Vec<PathBuf>,
    pub severity: EnableSet<Severity>,
    pub certainty: EnableSet<Certainty>,
    pub checks: ChecksEnable,
    /// Diagnostic suppressions (`nomsg` in the original tool).
    pub suppressions: Suppressions,
    /// Suppressions that only mask the exit code.
    pub exitcode_suppressions: Suppressions,
    pub build_dir: Option<PathBuf>,
    pub platform: Platform,
    pub standards: Standards,
    pub language: Option<Language>,
    pub max_configs: usize,
    pub max_ctu_depth: usize,
    /// Per-TU wall-clock budget in seconds; `None` means unbounded.
    pub max_time_secs: Option<u64>,
    pub force: bool,
    pub check_all_configurations: bool,
    pub preprocess_only: bool,
    pub rules: Vec<Rule>,
    /// Base paths for `-rp` relative-path output.
    pub base_paths: Vec<PathBuf>,
    pub relative_paths: bool,
    /// Path prefixes whose conditionals do not contribute configurations.
    pub config_excludes: Vec<String>,
}

impl Project {
    pub fn new() -> Project {
        let mut severity = EnableSet::default();
        severity.enable(Severity::Error);
        let mut certainty = EnableSet::default();
        certainty.enable(Certainty::Safe);
        Project {
            severity,
            certainty,
            checks: ChecksEnable::default(),
            max_configs: 12,
            max_ctu_depth: 2,
            check_all_configurations: true,
            ..Project::default()
        }
    }

    pub fn platform_string(&self) -> &str {
        &self.platform.name
    }
}

/// Per-run, mostly output-related settings.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Template format name or literal user format.
    pub template_format: String,
    pub template_location: String,
    pub xml: bool,
    pub xml_version: u8,
    pub verbose: bool,
    pub debug_warnings: bool,
    /// Exit code to return when diagnostics were found.
    pub error_exitcode: i32,
    pub dump: bool,
    pub dump_file: Option<PathBuf>,
    pub check_configuration: bool,
    pub inline_suppressions: bool,
    pub output: EnableSet<OutputChannel>,
    pub output_file: Option<PathBuf>,
    pub show_time: ShowTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShowTime {
    None,
    File,
    Summary,
    Top5,
}

impl Default for Settings {
    fn default() -> Self {
        let mut output = EnableSet::default();
        output.enable(OutputChannel::Status);
        output.enable(OutputChannel::Findings);
        Settings {
            template_format: crate::diagnostics::template::DEFAULT_TEMPLATE.to_string(),
            template_location: String::new(),
            xml: false,
            xml_version: 2,
            verbose: false,
            debug_warnings: false,
            error_exitcode: 0,
            dump: false,
            dump_file: None,
            check_configuration: false,
            inline_suppressions: false,
            output,
            output_file: None,
            show_time: ShowTime::None,
        }
    }
}

static TERMINATED: AtomicBool = AtomicBool::new(false);

impl Settings {
    /// Process-wide cooperative cancellation flag; polled at configuration
    /// boundaries, check invocations and value-flow iterations.
    pub fn terminated() -> bool {
        TERMINATED.load(Ordering::Relaxed)
    }

    pub fn terminate() {
        TERMINATED.store(true, Ordering::Relaxed);
    }

    #[doc(hidden)]
    pub fn reset_terminated() {
        TERMINATED.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_project_enables_error_and_safe_only() {
        let project = Project::new();
        assert!(project.severity.is_enabled(Severity::Error));
        assert!(!project.severity.is_enabled(Severity::Warning));
        assert!(project.certainty.is_enabled(Certainty::Safe));
        assert!(!project.certainty.is_enabled(Certainty::Inconclusive));
        assert_eq!(project.max_configs, 12);
        assert_eq!(project.max_ctu_depth, 2);
    }

    #[test]
    fn checks_default_excludes_missing_include() {
        let checks = ChecksEnable::default();
        assert!(checks.is_enabled("NullPointer"));
        assert!(!checks.is_enabled("missingInclude"));
        assert!(!checks.is_enabled("unusedFunction"));
    }

    #[test]
    fn enable_list_parses_negation() {
        let mut enabled: Vec<(String, bool)> = Vec::new();
        parse_enable_list("all,warning,-style", |name, enable| {
            enabled.push((name.to_string(), enable));
            Ok(())
        })
        .unwrap();
        assert_eq!(
            enabled,
            vec![
                ("all".to_string(), true),
                ("warning".to_string(), true),
                ("style".to_string(), false)
            ]
        );
    }

    #[test]
    fn enable_list_rejects_empty_element() {
        assert!(parse_enable_list("warning,,style", |_, _| Ok(())).is_err());
    }

    #[test]
    fn platform_names_resolve() {
        assert_eq!(Platform::from_name("unix32").unwrap().sizeof_pointer, 4);
        assert_eq!(Platform::from_name("win64").unwrap().long_bit, 32);
        assert!(Platform::from_name("vax").is_err());
    }

    #[test]
    fn standards_dispatch_on_prefix() {
        let mut std = Standards::default();
        std.set("c99").unwrap();
        std.set("c++20").unwrap();
        assert_eq!(std.c, "c99");
        assert_eq!(std.cpp, "c++20");
    }

    #[test]
    fn language_from_extension() {
        assert_eq!(Language::from_extension("c"), Some(Language::C));
        assert_eq!(Language::from_extension("cpp"), Some(Language::Cpp));
        assert_eq!(Language::from_extension("rs"), None);
    }
}
