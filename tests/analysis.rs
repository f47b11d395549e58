//! End-to-end scenarios driven through the public library surface.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use ccheck::analyzerinfo::AnalyzerInformation;
use ccheck::checks::builtin_checks;
use ccheck::config::{Project, Settings};
use ccheck::ctu::{CtuInfo, FunctionCallRec, Location, NestedCallRec};
use ccheck::diagnostics::{Certainty, ErrorMessage, FileLocation, Severity};
use ccheck::driver::Checker;
use ccheck::executor;
use ccheck::output::CollectingLogger;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn run(project: &Project, settings: &Settings, paths: &[PathBuf]) -> (CollectingLogger, bool) {
    let files = executor::expand_inputs(paths, &[], None).unwrap();
    let mut logger = CollectingLogger::default();
    let found = executor::run_with_logger(project, settings, files, &mut logger).unwrap();
    (logger, found)
}

#[test]
fn ctu_null_pointer_across_translation_units() {
    let dir = TempDir::new().unwrap();
    write(&dir, "a.h", "void f(int *p);\n");
    let a = write(&dir, "a.c", "#include \"a.h\"\nvoid f(int *p) { *p = 1; }\n");
    let b = write(&dir, "b.c", "#include \"a.h\"\nvoid g() { f(0); }\n");

    let project = Project::new();
    let settings = Settings::default();
    let (logger, found) = run(&project, &settings, &[a.clone(), b.clone()]);

    assert!(found);
    let nulls: Vec<&ErrorMessage> = logger
        .errors
        .iter()
        .filter(|m| m.id == "nullPointer")
        .collect();
    assert_eq!(nulls.len(), 1);
    let msg = nulls[0];
    assert_eq!(msg.severity, Severity::Error);
    assert_eq!(msg.certainty, Certainty::Safe);

    // The error path runs from the call site in b.c to the dereference
    // in a.c.
    assert!(msg.call_stack.len() >= 2);
    let call_step = &msg.call_stack[msg.call_stack.len() - 2];
    assert!(call_step.file.ends_with("b.c"));
    assert_eq!(call_step.info, "Calling function f, 1st argument is null");
    let deref_step = msg.call_stack.last().unwrap();
    assert!(deref_step.file.ends_with("a.c"));
    assert_eq!(deref_step.info, "Dereferencing argument p that is null");
}

#[test]
fn ctu_results_survive_the_build_dir_cache() {
    let dir = TempDir::new().unwrap();
    let build = dir.path().join("build");
    write(&dir, "a.h", "void f(int *p);\n");
    let a = write(&dir, "a.c", "#include \"a.h\"\nvoid f(int *p) { *p = 1; }\n");
    let b = write(&dir, "b.c", "#include \"a.h\"\nvoid g() { f(0); }\n");

    let mut project = Project::new();
    project.build_dir = Some(build);
    let settings = Settings::default();

    let (first, _) = run(&project, &settings, &[a.clone(), b.clone()]);
    let (second, _) = run(&project, &settings, &[a, b]);

    let ids = |logger: &CollectingLogger| -> Vec<String> {
        logger.errors.iter().map(|m| m.id.clone()).collect()
    };
    assert_eq!(ids(&first), ids(&second));
    assert!(second.errors.iter().any(|m| m.id == "nullPointer"));
}

#[test]
fn cache_hit_skips_reanalysis_and_replays_diagnostics() {
    let dir = TempDir::new().unwrap();
    let build = dir.path().join("build");
    // Two configurations, so a full analysis prints a per-configuration
    // status line that a cache hit never reaches.
    let src = "#ifdef A\nint a;\n#endif\nvoid f() { int x; int y = x; }\n";
    let file = write(&dir, "x.c", src);

    let mut project = Project::new();
    project.build_dir = Some(build);
    let settings = Settings::default();

    let (first, _) = run(&project, &settings, &[file.clone()]);
    let first_checking = first
        .out
        .iter()
        .filter(|l| l.starts_with("Checking"))
        .count();
    assert!(first_checking > 1, "expected per-configuration status lines");
    assert_eq!(first.errors.len(), 1);
    assert_eq!(first.errors[0].id, "uninitvar");

    let (second, _) = run(&project, &settings, &[file.clone()]);
    let second_checking = second
        .out
        .iter()
        .filter(|l| l.starts_with("Checking"))
        .count();
    assert_eq!(second_checking, 1, "cache hit must not re-analyze");
    assert_eq!(first.errors, second.errors);

    // Comments do not contribute to the checksum: still a cache hit.
    fs::write(&file, format!("{src}// touched\n")).unwrap();
    let (third, _) = run(&project, &settings, &[file]);
    assert_eq!(
        third
            .out
            .iter()
            .filter(|l| l.starts_with("Checking"))
            .count(),
        1
    );
}

#[test]
fn changed_content_invalidates_the_cache() {
    let dir = TempDir::new().unwrap();
    let build = dir.path().join("build");
    let file = write(&dir, "x.c", "void f() { int x; int y = x; }\n");

    let mut project = Project::new();
    project.build_dir = Some(build);
    let settings = Settings::default();

    let (first, _) = run(&project, &settings, &[file.clone()]);
    assert_eq!(first.errors.len(), 1);

    fs::write(&file, "void f() { int x = 0; int y = x; }\n").unwrap();
    let (second, _) = run(&project, &settings, &[file]);
    assert!(second.errors.is_empty());
}

#[test]
fn suppression_silences_and_clears_exit() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "s.c", "void f() { int x; int y = x; }\n");

    let mut project = Project::new();
    project.suppressions.add_spec("uninitvar").unwrap();
    let settings = Settings::default();
    let (logger, found) = run(&project, &settings, &[file.clone()]);
    assert!(logger.errors.is_empty());
    assert!(!found);

    let plain = Project::new();
    let (logger, found) = run(&plain, &settings, &[file]);
    assert_eq!(logger.errors.len(), 1);
    assert!(found);
}

#[test]
fn inline_suppression_silences_the_next_line() {
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "s.c",
        "void f() {\n  int x;\n  // ccheck-suppress uninitvar\n  int y = x;\n}\n",
    );
    let project = Project::new();
    let mut settings = Settings::default();
    settings.inline_suppressions = true;
    let (logger, found) = run(&project, &settings, &[file]);
    assert!(logger.errors.is_empty());
    assert!(!found);
}

#[test]
fn analyzer_info_round_trips_completely() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tu.a1");

    let mut original = CtuInfo::new("tu.c", 123, Some(path.clone()));
    original.checksum = 0xdead_beef;
    original.errors.push(
        ErrorMessage::new(
            vec![FileLocation::new("tu.c", 4, 9).with_info("step")],
            "tu.c",
            Severity::Error,
            "Uninitialized variable: x",
            "uninitvar",
            Certainty::Safe,
        )
        .with_cwe(457),
    );
    original.function_calls.push(FunctionCallRec {
        call_id: "h.h:1:6".into(),
        call_function_name: "f".into(),
        call_arg_nr: 1,
        call_argument_expression: "0".into(),
        call_value_tag: 0,
        call_arg_value: 0,
        location: Location {
            file: "tu.c".into(),
            line: 7,
            column: 3,
        },
        warning: true,
        call_value_path: vec![FileLocation::new("tu.c", 6, 1).with_info("Assignment 'p=0'")],
    });
    original.nested_calls.push(NestedCallRec {
        call_id: "h.h:2:6".into(),
        call_function_name: "g".into(),
        call_arg_nr: 2,
        location: Location {
            file: "tu.c".into(),
            line: 9,
            column: 5,
        },
        my_id: "h.h:1:6".into(),
        my_arg_nr: 1,
    });
    let usages = ccheck::ctu::UnsafeUsage {
        my_id: "h.h:1:6".into(),
        my_arg_nr: 1,
        my_arg_name: "p".into(),
        location: Location {
            file: "tu.c".into(),
            line: 2,
            column: 14,
        },
        value: 0,
    };
    original.add_check_info(
        "NullPointer",
        ccheck::checks::FileInfo::UnsafeUsages(vec![usages]),
    );
    original.write_file().unwrap();

    let checks = builtin_checks();
    let mut loaded = CtuInfo::new("tu.c", 123, Some(path.clone()));
    assert!(loaded.try_load_from_file(0xdead_beef, &checks));
    assert_eq!(loaded.errors, original.errors);
    assert_eq!(loaded.function_calls, original.function_calls);
    assert_eq!(loaded.nested_calls, original.nested_calls);
    assert_eq!(
        loaded.get_check_info("NullPointer"),
        original.get_check_info("NullPointer")
    );

    // A different checksum misses.
    let mut stale = CtuInfo::new("tu.c", 123, Some(path));
    assert!(!stale.try_load_from_file(1, &checks));
}

#[test]
fn whole_program_join_works_from_summaries_alone() {
    // Simulates the join phase running on cached summaries without any
    // token lists in memory.
    let mut info = AnalyzerInformation::new(None);
    let mut a = CtuInfo::new("a.c", 0, None);
    a.add_check_info(
        "NullPointer",
        ccheck::checks::FileInfo::UnsafeUsages(vec![ccheck::ctu::UnsafeUsage {
            my_id: "a.h:1:6".into(),
            my_arg_nr: 1,
            my_arg_name: "p".into(),
            location: Location {
                file: "a.c".into(),
                line: 2,
                column: 18,
            },
            value: 0,
        }]),
    );
    let mut b = CtuInfo::new("b.c", 0, None);
    b.function_calls.push(FunctionCallRec {
        call_id: "a.h:1:6".into(),
        call_function_name: "f".into(),
        call_arg_nr: 1,
        call_argument_expression: "0".into(),
        call_value_tag: 0,
        call_arg_value: 0,
        location: Location {
            file: "b.c".into(),
            line: 2,
            column: 12,
        },
        warning: false,
        call_value_path: Vec::new(),
    });
    info.add_ctu(a);
    info.add_ctu(b);

    let project = Project::new();
    let settings = Settings::default();
    let checks = builtin_checks();
    let mut logger = CollectingLogger::default();
    let mut checker = Checker::new(&project, &settings, &checks, &mut logger, true);
    assert!(checker.analyse_whole_program(&info));
    assert_eq!(logger.errors.len(), 1);
    assert_eq!(logger.errors[0].id, "nullPointer");
}

#[test]
fn value_flow_scenario_bound() {
    // int a=3; if (a<5) { a = a*2; } -- covered in depth by unit tests;
    // here the end-to-end run must stay quiet (no false positives).
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "v.c",
        "int f() { int a = 3; if (a < 5) { a = a * 2; } return a; }\n",
    );
    let project = Project::new();
    let settings = Settings::default();
    let (logger, found) = run(&project, &settings, &[file]);
    assert!(logger.errors.is_empty());
    assert!(!found);
}

#[test]
fn too_many_configurations_scenario() {
    let dir = TempDir::new().unwrap();
    let mut src = String::new();
    for i in 0..13 {
        src.push_str(&format!("#ifdef M{i:02}\nint a{i};\n#endif\n"));
    }
    let file = write(&dir, "many.c", &src);
    let project = Project::new();
    let settings = Settings::default();
    let (logger, _) = run(&project, &settings, &[file]);
    assert_eq!(
        logger
            .errors
            .iter()
            .filter(|m| m.id == "toomanyconfigs")
            .count(),
        1
    );
}

#[test]
fn purged_configuration_scenario() {
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "p.c",
        "#ifdef A\nint x;\n#endif\n#ifdef B\nint x;\n#endif\nint y;\n",
    );
    let project = Project::new();
    let settings = Settings::default();
    let (logger, _) = run(&project, &settings, &[file]);
    assert_eq!(
        logger
            .errors
            .iter()
            .filter(|m| m.id == "purgedConfiguration")
            .count(),
        1
    );
}

#[test]
fn registered_checks_are_ordered_and_documented() {
    let checks = builtin_checks();
    for pair in checks.windows(2) {
        assert!(pair[0].name() < pair[1].name());
    }
    for check in &checks {
        let info = check.class_info();
        if !info.is_empty() {
            assert!(!info.starts_with('\n'));
            assert!(info.ends_with('\n'));
            assert!(!info.ends_with("\n\n"));
        }
    }
}

#[test]
fn error_list_contains_driver_ids_without_duplicates() {
    let checks = builtin_checks();
    let msgs = ccheck::driver::error_message_list(&checks);
    let mut ids: Vec<&str> = msgs.iter().map(|m| m.id.as_str()).collect();
    let n = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), n);
    assert!(ids.contains(&"purgedConfiguration"));
    assert!(ids.contains(&"toomanyconfigs"));
}
