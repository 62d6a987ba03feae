mod common;

use std::fs;
use std::path::{Path, PathBuf};

use common::{write, FakeEngine, FAIL};
use ksc::config::Selector;
use ksc::discover::{self, InputOptions, Scope};
use ksc::pipeline::{self, BuildOutcome};

fn scope(root: &Path, selector: &str) -> Scope {
    let project = common::project(root, &root.join("archive"));
    Scope::Project {
        project,
        selector: selector.parse().unwrap(),
    }
}

fn ksm_files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    if !dir.exists() {
        return found;
    }
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            found.extend(ksm_files(&path));
        } else if path.extension().is_some_and(|e| e == "ksm") {
            found.push(path);
        }
    }
    found.sort();
    found
}

#[test]
fn test_collects_every_error_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/a.ks", &format!("print 1.\n{}\n", FAIL));
    write(dir.path(), "src/b.ks", "print 2.\n");
    write(dir.path(), "src/c.ks", FAIL);

    let engine = FakeEngine::default();
    let (outcome, _) = pipeline::compile_scope(&engine, &scope(dir.path(), "main")).unwrap();

    let BuildOutcome::Failed { errors, .. } = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert_eq!(engine.compiled(), 3);
    let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    assert_eq!(
        rendered,
        ["main:/a.ks:2:1: unexpected FAIL", "main:/c.ks:1:1: unexpected FAIL"]
    );
    assert!(ksm_files(&dir.path().join("dist")).is_empty());
}

#[test]
fn test_purges_artifacts_of_removed_sources() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/old.ks", "print 1.\n");
    write(dir.path(), "src/new.ks", "print 2.\n");
    let engine = FakeEngine::default();

    let (first, _) = pipeline::compile_scope(&engine, &scope(dir.path(), "all")).unwrap();
    assert!(first.is_success());
    assert!(dir.path().join("dist/src/old.ksm").is_file());

    fs::remove_file(dir.path().join("src/old.ks")).unwrap();
    let (second, _) = pipeline::compile_scope(&engine, &scope(dir.path(), "all")).unwrap();
    assert!(second.is_success());
    assert!(!dir.path().join("dist/src/old.ksm").exists());
    assert!(dir.path().join("dist/src/new.ksm").is_file());
}

#[test]
fn test_rebuild_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "boot/boot.ks", "print \"boot\".\r\n");
    write(dir.path(), "src/lib/util.ks", "print \"util\".\n");
    let engine = FakeEngine::default();

    pipeline::compile_scope(&engine, &scope(dir.path(), "all")).unwrap();
    let before: Vec<Vec<u8>> = ksm_files(&dir.path().join("dist"))
        .iter()
        .map(|p| fs::read(p).unwrap())
        .collect();
    pipeline::compile_scope(&engine, &scope(dir.path(), "all")).unwrap();
    let after: Vec<Vec<u8>> = ksm_files(&dir.path().join("dist"))
        .iter()
        .map(|p| fs::read(p).unwrap())
        .collect();

    assert_eq!(before.len(), 2);
    assert_eq!(before, after);
}

#[test]
fn test_volume_selection() {
    let dir = tempfile::tempdir().unwrap();
    let names = |selector: &str| -> Vec<String> {
        discover::bindings(&scope(dir.path(), selector))
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect()
    };
    assert_eq!(names("boot"), ["boot"]);
    assert_eq!(names("1"), ["boot"]);
    assert_eq!(names(&Selector::default().to_string()), ["boot", "main"]);
    assert!(names("7").is_empty());
}

#[test]
fn test_selected_volume_leaves_others_alone() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "boot/boot.ks", "print 1.\n");
    write(dir.path(), "src/main.ks", "print 2.\n");
    write(dir.path(), "dist/src/keep.ksm", "old");

    let engine = FakeEngine::default();
    let (outcome, set) = pipeline::compile_scope(&engine, &scope(dir.path(), "boot")).unwrap();
    assert!(outcome.is_success());
    assert_eq!(set.units.len(), 1);
    assert!(dir.path().join("dist/boot/boot.ksm").is_file());
    assert!(dir.path().join("dist/src/keep.ksm").is_file());
}

#[test]
fn test_empty_working_set_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    write(dir.path(), "dist/src/stale.ksm", "old");

    let engine = FakeEngine::default();
    let (outcome, _) = pipeline::compile_scope(&engine, &scope(dir.path(), "main")).unwrap();
    assert!(matches!(outcome, BuildOutcome::Empty));
    assert!(matches!(outcome.into_result(), Err(ksc::Error::NoScripts)));
    assert!(dir.path().join("dist/src/stale.ksm").is_file());
}

#[test]
fn test_in_place_directory_build_keeps_sources() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "scripts/a.ks", "print 1.\n");
    write(dir.path(), "scripts/stale.ksm", "old");

    let options = InputOptions {
        input: PathBuf::from("scripts"),
        ..InputOptions::default()
    };
    let scope = discover::resolve_scope(&options, dir.path()).unwrap();
    let engine = FakeEngine::default();
    let (outcome, _) = pipeline::compile_scope(&engine, &scope).unwrap();

    assert!(outcome.is_success());
    assert!(dir.path().join("scripts/a.ks").is_file());
    assert!(dir.path().join("scripts/a.ksm").is_file());
    assert!(!dir.path().join("scripts/stale.ksm").exists());
}

#[test]
fn test_single_file_to_named_output() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "hello.ks", "print \"hello\".\n");
    let options = InputOptions {
        input: PathBuf::from("hello.ks"),
        output: PathBuf::from("build/greeting"),
        ..InputOptions::default()
    };
    let scope = discover::resolve_scope(&options, dir.path()).unwrap();
    let engine = FakeEngine::default();
    let (outcome, _) = pipeline::compile_scope(&engine, &scope).unwrap();

    assert!(outcome.is_success());
    let artifact = fs::read(dir.path().join("build/greeting.ksm")).unwrap();
    assert!(artifact.starts_with(ksc::volume::ARTIFACT_MAGIC));
}
