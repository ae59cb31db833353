//! Sync protocol behavior over the local review host: idempotent re-runs,
//! compare-and-set conflicts, and best-effort provenance.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::TempDir;

use hydrant_core::{
    Change, Changeset, CommitId, EntitySelector, Fingerprint, HydrationRun, ProvenanceRecord,
    ReviewUnit, ReviewUnitId, RunOutcome,
};
use hydrant_engine::OutputLayout;
use hydrant_sync::{
    is_automation_commit, run_render, run_sync, sync_review_unit, ApplyResult, CommitAuthor,
    HostError, LocalHost, PipelineConfig, ReviewHost, SyncError, SyncOutcome, TriggerEvent,
};

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

struct Fixture {
    _dir: TempDir,
    config: PipelineConfig,
    host: LocalHost,
}

fn fixture() -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();

    fs::create_dir_all(root.join("templates/base")).expect("base dir");
    fs::create_dir_all(root.join("templates/overlays/prod")).expect("overlay dir");
    fs::write(
        root.join("templates/base/app.yaml.tera"),
        "region: {{ region }}\nentity: {{ name }}\n",
    )
    .expect("base template");
    fs::write(
        root.join("templates/overlays/prod/limits.yaml.tera"),
        "tier: {{ group }}\n",
    )
    .expect("overlay template");

    let config = PipelineConfig {
        base_root: root.join("templates/base"),
        overlays_root: root.join("templates/overlays"),
        source_path: root.join("entities.yaml"),
        output_root: root.join("out"),
        selector: EntitySelector::All,
        layout: OutputLayout::PerGroup,
        dry_run: false,
    };
    let host = LocalHost::open(root.join("host"));

    Fixture {
        _dir: dir,
        config,
        host,
    }
}

fn write_sot(config: &PipelineConfig, region: &str) {
    let doc = format!(
        "entities:\n  edge-east:\n    group: prod\n    region: {region}\n"
    );
    fs::write(&config.source_path, doc).expect("write sot");
}

fn write_sot_pair(config: &PipelineConfig, east: Option<&str>, west: Option<&str>) {
    let mut doc = String::from("entities:\n");
    if let Some(region) = east {
        doc.push_str(&format!(
            "  edge-east:\n    group: prod\n    region: {region}\n"
        ));
    }
    if let Some(region) = west {
        doc.push_str(&format!(
            "  edge-west:\n    group: prod\n    region: {region}\n"
        ));
    }
    fs::write(&config.source_path, doc).expect("write sot");
}

fn unit_id() -> ReviewUnitId {
    ReviewUnitId::from("ru-1")
}

fn open_unit(host: &LocalHost) -> ReviewUnit {
    host.init_unit("ru-1", "hydration/auto", "main", "h0")
        .expect("init unit")
}

fn previous_of(host: &LocalHost) -> Option<hydrant_core::HydratedArtifactSet> {
    host.artifact_tree(&unit_id()).expect("artifact tree")
}

fn sync_once(fixture: &Fixture, trigger_commit: &str) -> hydrant_sync::SyncReport {
    run_sync(
        &fixture.config,
        &fixture.host,
        &unit_id(),
        &TriggerEvent::review_unit_updated(trigger_commit),
        previous_of(&fixture.host),
    )
    .expect("run_sync")
}

// ---------------------------------------------------------------------------
// Commit and no-op behavior
// ---------------------------------------------------------------------------

#[test]
fn first_sync_commits_everything_as_added() {
    let f = fixture();
    open_unit(&f.host);
    write_sot(&f.config, "us-east1");

    let report = sync_once(&f, "t1");
    assert_eq!(report.changeset.counts(), (2, 0, 0));
    assert!(report.fingerprint_before.is_none());

    let commit = match report.outcome.expect("outcome") {
        SyncOutcome::Committed {
            commit,
            metadata_recorded,
        } => {
            assert!(metadata_recorded);
            commit
        }
        other => panic!("expected Committed, got: {other:?}"),
    };

    assert_eq!(f.host.get_head(&unit_id()).expect("head"), commit);
    let tree = previous_of(&f.host).expect("tree after commit");
    assert_eq!(
        tree.get(Path::new("prod/app.yaml")),
        Some(b"region: us-east1\nentity: edge-east\n".as_slice())
    );
    assert_eq!(
        tree.get(Path::new("prod/limits.yaml")),
        Some(b"tier: prod\n".as_slice())
    );
}

#[test]
fn unchanged_inputs_sync_to_noop_without_metadata() {
    let f = fixture();
    open_unit(&f.host);
    write_sot(&f.config, "us-east1");

    sync_once(&f, "t1");
    let head_after_first = f.host.get_head(&unit_id()).expect("head");
    let records_after_first = f.host.list_metadata(&unit_id()).expect("metadata").len();
    assert_eq!(records_after_first, 1);

    let second = sync_once(&f, "t2");
    assert!(second.changeset.is_empty());
    assert_eq!(second.outcome, Some(SyncOutcome::NoOp));
    assert_eq!(f.host.get_head(&unit_id()).expect("head"), head_after_first);
    assert_eq!(
        f.host.list_metadata(&unit_id()).expect("metadata").len(),
        records_after_first,
        "a no-op run must not write metadata"
    );
}

#[test]
fn record_change_produces_minimal_changeset_and_stale_retry_conflicts() {
    let f = fixture();
    open_unit(&f.host);

    write_sot(&f.config, "us-east1");
    let first = sync_once(&f, "t1");
    let c1 = match first.outcome.expect("outcome") {
        SyncOutcome::Committed { commit, .. } => commit,
        other => panic!("expected Committed, got: {other:?}"),
    };

    write_sot(&f.config, "us-west1");
    let second = sync_once(&f, "t2");
    assert_eq!(second.changeset.counts(), (0, 1, 0));
    match &second.changeset.changes()[0] {
        Change::Modified {
            path,
            previous,
            contents,
        } => {
            assert_eq!(path, &PathBuf::from("prod/app.yaml"));
            assert!(String::from_utf8_lossy(previous).contains("us-east1"));
            assert!(String::from_utf8_lossy(contents).contains("us-west1"));
        }
        other => panic!("expected Modified, got: {other:?}"),
    }
    let c2 = match second.outcome.expect("outcome") {
        SyncOutcome::Committed { commit, .. } => commit,
        other => panic!("expected Committed, got: {other:?}"),
    };

    let log = f.host.commit_log(&unit_id()).expect("log");
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].parent, c1);

    // A second attempt still targeting the pre-change head must conflict
    // and leave no trace.
    let stale_run = HydrationRun::new(
        CommitId::from("t3"),
        "tv",
        "sh",
        Fingerprint::from("fp"),
        Utc::now(),
    );
    let stale_changeset = Changeset::from_changes(vec![Change::Modified {
        path: PathBuf::from("prod/app.yaml"),
        previous: b"old".to_vec(),
        contents: b"new".to_vec(),
    }]);
    let outcome = sync_review_unit(
        &f.host,
        &unit_id(),
        &stale_run,
        &c1,
        &stale_changeset,
        None,
    )
    .expect("sync_review_unit");

    assert_eq!(
        outcome,
        SyncOutcome::Conflict {
            expected: c1,
            actual: c2.clone(),
        }
    );
    assert_eq!(f.host.get_head(&unit_id()).expect("head"), c2);
    assert_eq!(f.host.commit_log(&unit_id()).expect("log").len(), 2);
}

#[test]
fn changesets_apply_without_silent_loss() {
    let f = fixture();
    open_unit(&f.host);
    let mut config = f.config.clone();
    config.layout = OutputLayout::PerEntity;

    write_sot_pair(&config, Some("us-east1"), Some("us-west1"));
    run_sync(
        &config,
        &f.host,
        &unit_id(),
        &TriggerEvent::review_unit_updated("t1"),
        previous_of(&f.host),
    )
    .expect("first sync");

    let previous = previous_of(&f.host).expect("previous tree");

    // Drop edge-west entirely and move edge-east.
    write_sot_pair(&config, Some("eu-west4"), None);
    let report = run_sync(
        &config,
        &f.host,
        &unit_id(),
        &TriggerEvent::review_unit_updated("t2"),
        Some(previous.clone()),
    )
    .expect("second sync");

    let (added, modified, removed) = report.changeset.counts();
    assert_eq!((added, modified, removed), (0, 1, 2));

    let committed = previous_of(&f.host).expect("tree after commit");
    assert_eq!(report.changeset.apply(Some(&previous)), committed);
    assert!(committed.get(Path::new("edge-west/app.yaml")).is_none());
    assert!(committed.get(Path::new("edge-west/limits.yaml")).is_none());
    assert_eq!(
        committed.get(Path::new("edge-east/app.yaml")),
        Some(b"region: eu-west4\nentity: edge-east\n".as_slice())
    );
}

// ---------------------------------------------------------------------------
// Commit identity and provenance
// ---------------------------------------------------------------------------

#[test]
fn sync_commits_carry_the_automation_identity() {
    let f = fixture();
    open_unit(&f.host);
    write_sot(&f.config, "us-east1");
    sync_once(&f, "t1");

    let log = f.host.commit_log(&unit_id()).expect("log");
    let entry = &log[0];
    assert_eq!(entry.author, CommitAuthor::automation());
    assert!(entry.message.starts_with("[hydrant]"));
    assert!(entry.message.contains("Trigger-Commit: t1"));
    assert!(is_automation_commit(&entry.author, &entry.message));
}

#[test]
fn provenance_links_run_to_commit_and_fingerprints() {
    let f = fixture();
    open_unit(&f.host);
    write_sot(&f.config, "us-east1");
    let first = sync_once(&f, "t1");

    write_sot(&f.config, "us-west1");
    let second = sync_once(&f, "t2");

    let records: Vec<ProvenanceRecord> = f.host.list_metadata(&unit_id()).expect("metadata");
    assert_eq!(records.len(), 2);

    assert_eq!(records[0].run_id, first.run.id);
    assert_eq!(records[0].trigger_commit, CommitId::from("t1"));
    assert_eq!(records[0].outcome, RunOutcome::Committed);
    assert!(records[0].fingerprint_before.is_none());
    assert_eq!(records[0].fingerprint_after, first.run.fingerprint);

    assert_eq!(records[1].fingerprint_before, second.fingerprint_before);
    assert_eq!(records[1].fingerprint_after, second.run.fingerprint);
    let c2 = match second.outcome.expect("outcome") {
        SyncOutcome::Committed { commit, .. } => commit,
        other => panic!("expected Committed, got: {other:?}"),
    };
    assert_eq!(records[1].sync_commit, Some(c2));
}

/// Host wrapper whose metadata endpoint always fails.
struct MetadataLossHost<'a> {
    inner: &'a LocalHost,
}

impl ReviewHost for MetadataLossHost<'_> {
    fn review_unit(&self, id: &ReviewUnitId) -> Result<ReviewUnit, HostError> {
        self.inner.review_unit(id)
    }

    fn commit(
        &self,
        id: &ReviewUnitId,
        parent: &CommitId,
        changeset: &Changeset,
        author: &CommitAuthor,
        message: &str,
    ) -> Result<CommitId, HostError> {
        self.inner.commit(id, parent, changeset, author, message)
    }

    fn append_metadata(
        &self,
        _id: &ReviewUnitId,
        _record: &ProvenanceRecord,
    ) -> Result<(), HostError> {
        Err(HostError::Http {
            detail: "metadata endpoint down".to_string(),
        })
    }

    fn list_metadata(&self, id: &ReviewUnitId) -> Result<Vec<ProvenanceRecord>, HostError> {
        self.inner.list_metadata(id)
    }
}

#[test]
fn metadata_failure_does_not_fail_the_commit() {
    let f = fixture();
    open_unit(&f.host);
    write_sot(&f.config, "us-east1");

    let lossy = MetadataLossHost { inner: &f.host };
    let report = run_sync(
        &f.config,
        &lossy,
        &unit_id(),
        &TriggerEvent::review_unit_updated("t1"),
        None,
    )
    .expect("run_sync");

    let commit = match report.outcome.expect("outcome") {
        SyncOutcome::Committed {
            commit,
            metadata_recorded,
        } => {
            assert!(!metadata_recorded, "append failure must be reported");
            commit
        }
        other => panic!("expected Committed, got: {other:?}"),
    };
    assert_eq!(f.host.get_head(&unit_id()).expect("head"), commit);
    assert!(f.host.list_metadata(&unit_id()).expect("metadata").is_empty());
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

#[test]
fn dry_run_sync_commits_nothing() {
    let f = fixture();
    open_unit(&f.host);
    write_sot(&f.config, "us-east1");

    let mut config = f.config.clone();
    config.dry_run = true;
    let report = run_sync(
        &config,
        &f.host,
        &unit_id(),
        &TriggerEvent::review_unit_updated("t1"),
        None,
    )
    .expect("run_sync");

    assert!(report.outcome.is_none());
    assert_eq!(report.changeset.counts(), (2, 0, 0));
    assert_eq!(f.host.get_head(&unit_id()).expect("head"), CommitId::from("h0"));
    assert!(f.host.commit_log(&unit_id()).expect("log").is_empty());
    assert!(f.host.list_metadata(&unit_id()).expect("metadata").is_empty());
}

#[test]
fn closed_unit_is_refused_before_rendering() {
    let f = fixture();
    open_unit(&f.host);
    f.host.close_unit(&unit_id()).expect("close");
    write_sot(&f.config, "us-east1");

    let err = run_sync(
        &f.config,
        &f.host,
        &unit_id(),
        &TriggerEvent::review_unit_updated("t1"),
        None,
    )
    .expect_err("must fail");
    assert!(matches!(
        err,
        SyncError::Host(HostError::UnitClosed { .. })
    ));
}

#[test]
fn trigger_branch_must_match_the_unit() {
    let f = fixture();
    open_unit(&f.host);
    write_sot(&f.config, "us-east1");

    let mut trigger = TriggerEvent::review_unit_updated("t1");
    trigger.source_branch = Some("feature/wrong".into());

    let err = run_sync(&f.config, &f.host, &unit_id(), &trigger, None).expect_err("must fail");
    assert!(matches!(err, SyncError::BranchMismatch { .. }));
}

#[test]
fn trigger_target_branch_is_cross_checked_too() {
    let f = fixture();
    open_unit(&f.host);
    write_sot(&f.config, "us-east1");

    // Both branches named and correct: the run goes through.
    let mut trigger = TriggerEvent::review_unit_updated("t1");
    trigger.source_branch = Some("hydration/auto".into());
    trigger.target_branch = Some("main".into());
    let report = run_sync(&f.config, &f.host, &unit_id(), &trigger, None).expect("run_sync");
    assert!(matches!(report.outcome, Some(SyncOutcome::Committed { .. })));

    // A wrong merge target is refused before the head is even read.
    trigger.target_branch = Some("release/frozen".into());
    let err = run_sync(&f.config, &f.host, &unit_id(), &trigger, None).expect_err("must fail");
    assert!(matches!(err, SyncError::BranchMismatch { .. }));
}

// ---------------------------------------------------------------------------
// Render flow
// ---------------------------------------------------------------------------

#[test]
fn render_writes_output_root_then_settles() {
    let f = fixture();
    write_sot(&f.config, "us-east1");

    let report = run_render(&f.config).expect("render");
    assert_eq!(report.entity_count, 1);
    assert_eq!(report.changeset.counts(), (2, 0, 0));
    assert!(report
        .applied
        .iter()
        .all(|r| matches!(r, ApplyResult::Written { .. })));

    let on_disk =
        fs::read_to_string(f.config.output_root.join("prod/app.yaml")).expect("read artifact");
    assert_eq!(on_disk, "region: us-east1\nentity: edge-east\n");

    let second = run_render(&f.config).expect("second render");
    assert!(second.changeset.is_empty());
    assert!(second.applied.is_empty());
    assert_eq!(second.fingerprint, report.fingerprint);
}

#[test]
fn dry_run_render_leaves_no_files() {
    let f = fixture();
    write_sot(&f.config, "us-east1");

    let mut config = f.config.clone();
    config.dry_run = true;
    let report = run_render(&config).expect("render");
    assert!(report
        .applied
        .iter()
        .all(|r| matches!(r, ApplyResult::WouldWrite { .. })));
    assert!(!config.output_root.exists());
}
