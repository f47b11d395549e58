//! Sequential run executor: expands the file list, drives each TU through
//! the checker, then runs the whole-program phase and computes the exit
//! code.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::analyzerinfo::AnalyzerInformation;
use crate::checks::builtin_checks;
use crate::config::{Language, Project, Settings, SOURCE_EXTENSIONS};
use crate::diagnostics::suppressions::wildcard_match;
use crate::driver::Checker;
use crate::output::{ErrorLogger, StdLogger};

/// Expand CLI path arguments into the sorted list of `(path, size)` pairs
/// to analyze. Directories recurse; `ignores` prune by prefix;
/// `file_filter` is a glob over the path.
pub fn expand_inputs(
    paths: &[PathBuf],
    ignores: &[PathBuf],
    file_filter: Option<&str>,
) -> Result<Vec<(String, u64)>> {
    let mut out = Vec::new();
    for path in paths {
        collect(path, ignores, file_filter, &mut out)?;
    }
    out.sort();
    out.dedup();
    Ok(out)
}

fn collect(
    path: &Path,
    ignores: &[PathBuf],
    file_filter: Option<&str>,
    out: &mut Vec<(String, u64)>,
) -> Result<()> {
    if ignores.iter().any(|ig| path.starts_with(ig)) {
        return Ok(());
    }
    if path.is_dir() {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(path)
            .with_context(|| format!("failed to read directory {}", path.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        entries.sort();
        for entry in entries {
            if entry.is_dir() {
                collect(&entry, ignores, file_filter, out)?;
            } else if has_source_extension(&entry) {
                collect(&entry, ignores, file_filter, out)?;
            }
        }
        return Ok(());
    }
    let display = path.to_string_lossy().into_owned();
    if let Some(filter) = file_filter {
        if !wildcard_match(filter, &display) {
            return Ok(());
        }
    }
    let size = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {display}"))?
        .len();
    out.push((display, size));
    Ok(())
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .map(|e| SOURCE_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false)
}

/// Read a `--file-list` file (or stdin for `-`).
pub fn read_file_list(spec: &str) -> Result<Vec<PathBuf>> {
    let text = if spec == "-" {
        use std::io::Read;
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read file list from stdin")?;
        buf
    } else {
        std::fs::read_to_string(spec)
            .with_context(|| format!("failed to read file list {spec}"))?
    };
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Run the analysis over the given files. Returns the process exit code.
pub fn run(project: &Project, settings: &Settings, files: Vec<(String, u64)>) -> Result<i32> {
    if files.is_empty() {
        bail!("no C or C++ source files found in the given paths");
    }
    let checks = builtin_checks();
    let mut logger = StdLogger::new(settings)?;
    logger.begin();

    let mut info = AnalyzerInformation::new(project.build_dir.clone());
    info.create_ctus(&files)?;

    let overall = std::time::Instant::now();
    let mut file_times: Vec<(String, std::time::Duration)> = Vec::new();
    let found_errors = {
        let mut checker = Checker::new(project, settings, &checks, &mut logger, true);
        for i in 0..files.len() {
            if Settings::terminated() {
                break;
            }
            let started = std::time::Instant::now();
            checker.check_file(&mut info.ctus_mut()[i]);
            file_times.push((files[i].0.clone(), started.elapsed()));
        }
        debug!("per-TU analysis complete, joining");
        checker.analyse_whole_program(&info);
        checker.found_errors
    };

    info.write_index()?;
    report_times(settings, &mut logger, &file_times, overall.elapsed());
    logger.finish();

    if found_errors {
        return Ok(settings.error_exitcode);
    }
    Ok(0)
}

/// `--showtime` reporting after the run.
fn report_times(
    settings: &Settings,
    logger: &mut dyn ErrorLogger,
    file_times: &[(String, std::time::Duration)],
    overall: std::time::Duration,
) {
    use crate::config::ShowTime;
    match settings.show_time {
        ShowTime::None => {}
        ShowTime::File => {
            for (file, elapsed) in file_times {
                logger.report_out(&format!("{file}: {:.3}s", elapsed.as_secs_f64()));
            }
            logger.report_out(&format!("Overall time: {:.3}s", overall.as_secs_f64()));
        }
        ShowTime::Summary => {
            logger.report_out(&format!(
                "Overall time: {:.3}s for {} file(s)",
                overall.as_secs_f64(),
                file_times.len()
            ));
        }
        ShowTime::Top5 => {
            let mut sorted: Vec<_> = file_times.to_vec();
            sorted.sort_by(|a, b| b.1.cmp(&a.1));
            for (file, elapsed) in sorted.iter().take(5) {
                logger.report_out(&format!("{file}: {:.3}s", elapsed.as_secs_f64()));
            }
            logger.report_out(&format!("Overall time: {:.3}s", overall.as_secs_f64()));
        }
    }
}

/// Run over an explicit logger; used by tests and embedding surfaces.
pub fn run_with_logger(
    project: &Project,
    settings: &Settings,
    files: Vec<(String, u64)>,
    logger: &mut dyn ErrorLogger,
) -> Result<bool> {
    let checks = builtin_checks();
    let mut info = AnalyzerInformation::new(project.build_dir.clone());
    info.create_ctus(&files)?;
    let mut checker = Checker::new(project, settings, &checks, logger, true);
    for i in 0..files.len() {
        checker.check_file(&mut info.ctus_mut()[i]);
    }
    checker.analyse_whole_program(&info);
    let found = checker.found_errors;
    drop(checker);
    info.write_index()?;
    Ok(found)
}

/// Pick the language for a run when `--language` forces one.
pub fn forced_language(name: &str) -> Result<Language> {
    match name {
        "c" => Ok(Language::C),
        "c++" => Ok(Language::Cpp),
        _ => bail!("unknown language '{name}', expected 'c' or 'c++'"),
    }
}
