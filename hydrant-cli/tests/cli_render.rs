use std::fs;
use std::path::PathBuf;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn hydrant_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("hydrant"))
}

struct Scaffold {
    dir: TempDir,
}

impl Scaffold {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        fs::create_dir_all(root.join("templates/base")).expect("base dir");
        fs::create_dir_all(root.join("templates/overlays/prod")).expect("overlay dir");
        fs::write(
            root.join("templates/base/app.yaml.tera"),
            "region: {{ region }}\n",
        )
        .expect("base template");
        fs::write(
            root.join("templates/overlays/prod/limits.yaml.tera"),
            "tier: {{ group }}\n",
        )
        .expect("overlay template");
        Scaffold { dir }
    }

    fn write_sot(&self, region: &str) {
        fs::write(
            self.dir.path().join("entities.yaml"),
            format!("entities:\n  edge-east:\n    group: prod\n    region: {region}\n"),
        )
        .expect("write sot");
    }

    fn base(&self) -> PathBuf {
        self.dir.path().join("templates/base")
    }

    fn overlays(&self) -> PathBuf {
        self.dir.path().join("templates/overlays")
    }

    fn sot(&self) -> PathBuf {
        self.dir.path().join("entities.yaml")
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn cmd(&self, subcommand: &str) -> Command {
        let mut cmd = hydrant_cmd();
        cmd.arg(subcommand)
            .arg("--base")
            .arg(self.base())
            .arg("--overlays")
            .arg(self.overlays())
            .arg("--sot")
            .arg(self.sot())
            .arg("--output")
            .arg(self.output());
        cmd
    }
}

#[test]
fn render_writes_artifacts_then_settles() {
    let s = Scaffold::new();
    s.write_sot("us-east1");

    s.cmd("render")
        .assert()
        .success()
        .stdout(contains("✎"))
        .stdout(contains("app.yaml"));

    let rendered = fs::read_to_string(s.output().join("prod/app.yaml")).expect("read artifact");
    assert_eq!(rendered, "region: us-east1\n");
    let limits = fs::read_to_string(s.output().join("prod/limits.yaml")).expect("read overlay");
    assert_eq!(limits, "tier: prod\n");

    s.cmd("render")
        .assert()
        .success()
        .stdout(contains("already matches"));
}

#[test]
fn dry_run_render_writes_nothing() {
    let s = Scaffold::new();
    s.write_sot("us-east1");

    s.cmd("render")
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(contains("[dry-run]"));

    assert!(!s.output().exists(), "dry-run must not create files");
}

#[test]
fn missing_value_is_a_data_error() {
    let s = Scaffold::new();
    s.write_sot("us-east1");
    fs::write(s.base().join("app.yaml.tera"), "size: {{ size }}\n").expect("rewrite template");

    s.cmd("render")
        .assert()
        .failure()
        .code(2)
        .stderr(contains("size"));

    assert!(!s.output().exists(), "a failed run must produce no output");
}

#[test]
fn template_syntax_error_exits_3() {
    let s = Scaffold::new();
    s.write_sot("us-east1");
    fs::write(s.base().join("app.yaml.tera"), "region: {{ region\n").expect("rewrite template");

    s.cmd("render")
        .assert()
        .failure()
        .code(3)
        .stderr(contains("failed to parse"));
}

#[test]
fn unknown_entity_selection_is_a_data_error() {
    let s = Scaffold::new();
    s.write_sot("us-east1");

    s.cmd("render")
        .arg("--entity")
        .arg("nope")
        .assert()
        .failure()
        .code(2)
        .stderr(contains("nope"));
}

#[test]
fn group_selection_narrows_the_output() {
    let s = Scaffold::new();
    let doc = concat!(
        "entities:\n",
        "  edge-east:\n",
        "    group: prod\n",
        "    region: us-east1\n",
        "  lab-1:\n",
        "    group: staging\n",
        "    region: eu-west4\n",
    );
    fs::write(s.sot(), doc).expect("write sot");

    s.cmd("render")
        .arg("--group")
        .arg("prod")
        .assert()
        .success();

    assert!(s.output().join("prod/app.yaml").exists());
    assert!(
        !s.output().join("staging").exists(),
        "unselected groups must not render"
    );
}

#[test]
fn diff_previews_changes_without_writing() {
    let s = Scaffold::new();
    s.write_sot("us-east1");
    s.cmd("render").assert().success();

    s.write_sot("us-west1");
    s.cmd("diff")
        .assert()
        .success()
        .stdout(contains("-region: us-east1"))
        .stdout(contains("+region: us-west1"));

    let rendered = fs::read_to_string(s.output().join("prod/app.yaml")).expect("read artifact");
    assert_eq!(rendered, "region: us-east1\n", "diff must not write");
}

#[test]
fn diff_reports_no_differences_after_render() {
    let s = Scaffold::new();
    s.write_sot("us-east1");
    s.cmd("render").assert().success();

    s.cmd("diff")
        .assert()
        .success()
        .stdout(contains("No differences."));
}
