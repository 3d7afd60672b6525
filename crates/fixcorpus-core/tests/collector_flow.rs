//! End-to-end collection flows over in-memory fakes.

use std::sync::Arc;

use fixcorpus_core::fakes::{RecordingVcs, StaticHosting, VcsOp};
use fixcorpus_core::{
    qualify, split_files, CollectError, Collector, CollectorConfig, CommitPatch, FileChange,
    HandleOutcome, ProcessedLedger, PushTarget, COMMIT_DIFF_FILE,
};

const SLUG: &str = "octocat/hello-world";

fn hunk_text(start: usize, len: usize) -> String {
    format!(
        "@@ -{},{} +{},{} @@\n context\n+fix {}\n context",
        start, len, start, len, start
    )
}

fn file_patch(hunks: &[(usize, usize)]) -> String {
    hunks
        .iter()
        .map(|(start, len)| hunk_text(*start, *len))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A commit plus the raw diff its `.diff` endpoint would serve, built from
/// the same hunks so the two representations agree.
fn commit_for(sha: &str, files: &[(&str, &[(usize, usize)])]) -> (CommitPatch, String) {
    let mut changes = Vec::new();
    let mut raw = String::new();
    for (path, hunks) in files {
        let patch = file_patch(hunks);
        raw.push_str(&format!(
            "diff --git a/{} b/{}\n--- a/{}\n+++ b/{}\n{}\n",
            path, path, path, path, patch
        ));
        changes.push(FileChange {
            path: path.to_string(),
            patch: Some(patch),
        });
    }
    (CommitPatch::new(SLUG, sha, changes), raw)
}

fn collector_with(
    dir: &tempfile::TempDir,
    configure: impl FnOnce(&mut CollectorConfig),
) -> (Arc<StaticHosting>, Arc<RecordingVcs>, Collector) {
    let hosting = Arc::new(StaticHosting::new());
    let vcs = Arc::new(RecordingVcs::new());
    let mut config = CollectorConfig::new(dir.path());
    configure(&mut config);
    let collector = Collector::new(config, hosting.clone(), vcs.clone(), None);
    (hosting, vcs, collector)
}

#[tokio::test]
async fn test_second_handle_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let (hosting, _vcs, collector) = collector_with(&dir, |_| {});
    let (patch, raw) = commit_for("abc123", &[("src/main.rs", &[(10, 3)])]);
    hosting.add_commit(patch, raw);

    let first = collector.handle(SLUG, "abc123").await.unwrap();
    assert!(first.is_collected());

    let second = collector.handle(SLUG, "abc123").await.unwrap();
    assert_eq!(second, HandleOutcome::AlreadyProcessed);
    assert_eq!(
        hosting.commit_fetches(SLUG, "abc123"),
        1,
        "dedup must short-circuit before the fetch"
    );
}

#[tokio::test]
async fn test_shared_collector_runs_from_spawned_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let (hosting, _vcs, collector) = collector_with(&dir, |_| {});
    for sha in ["abc123", "def456"] {
        let (patch, raw) = commit_for(sha, &[("src/main.rs", &[(10, 3)])]);
        hosting.add_commit(patch, raw);
    }
    let collector = Arc::new(collector);

    // `spawn` only takes `Send` futures; a worker pool sharing one
    // collector relies on `handle` staying that way.
    let mut tasks = Vec::new();
    for sha in ["abc123", "def456"] {
        let collector = collector.clone();
        tasks.push(tokio::spawn(async move { collector.handle(SLUG, sha).await }));
    }
    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_collected());
    }
    assert_eq!(collector.state().batch_len(), 2);
}

#[tokio::test]
async fn test_batch_threshold_consolidates_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let (hosting, vcs, collector) = collector_with(&dir, |c| c.batch_size = 3);
    for sha in ["aaa", "bbb", "ccc", "ddd"] {
        let (patch, raw) = commit_for(sha, &[("src/main.rs", &[(10, 3)])]);
        hosting.add_commit(patch, raw);
    }

    collector.handle(SLUG, "aaa").await.unwrap();
    collector.handle(SLUG, "bbb").await.unwrap();
    assert_eq!(vcs.consolidations(), 0);
    assert_eq!(collector.state().batch_len(), 2);

    collector.handle(SLUG, "ccc").await.unwrap();
    assert_eq!(vcs.consolidations(), 1);
    assert_eq!(collector.state().batch_len(), 0, "counter resets at threshold");

    // The next collected commit starts a fresh batch, no retrigger.
    collector.handle(SLUG, "ddd").await.unwrap();
    assert_eq!(vcs.consolidations(), 1);
    assert_eq!(collector.state().batch_len(), 1);

    let ops = vcs.ops();
    assert_eq!(ops[0], VcsOp::StageAll);
    match &ops[1] {
        VcsOp::Commit { message } => {
            assert!(message.contains("batch of 3"), "got message: {}", message)
        }
        other => panic!("expected Commit after StageAll, got {:?}", other),
    }
}

#[tokio::test]
async fn test_push_runs_only_when_target_configured() {
    let dir = tempfile::tempdir().unwrap();
    let (hosting, vcs, collector) = collector_with(&dir, |c| {
        c.batch_size = 1;
        c.push = Some(PushTarget::default());
    });
    let (patch, raw) = commit_for("abc123", &[("src/main.rs", &[(10, 3)])]);
    hosting.add_commit(patch, raw);

    collector.handle(SLUG, "abc123").await.unwrap();
    assert!(vcs.ops().contains(&VcsOp::Push {
        remote: "origin".to_string(),
        refspec: "master:master".to_string(),
    }));

    // Without a target the batch stays local.
    let dir2 = tempfile::tempdir().unwrap();
    let (hosting2, vcs2, collector2) = collector_with(&dir2, |c| c.batch_size = 1);
    let (patch, raw) = commit_for("abc123", &[("src/main.rs", &[(10, 3)])]);
    hosting2.add_commit(patch, raw);

    collector2.handle(SLUG, "abc123").await.unwrap();
    assert!(vcs2
        .ops()
        .iter()
        .all(|op| !matches!(op, VcsOp::Push { .. })));
    assert_eq!(vcs2.consolidations(), 1);
}

#[tokio::test]
async fn test_consolidation_failure_does_not_fail_handle() {
    let dir = tempfile::tempdir().unwrap();
    let (hosting, vcs, collector) = collector_with(&dir, |c| c.batch_size = 1);
    let (patch, raw) = commit_for("abc123", &[("src/main.rs", &[(10, 3)])]);
    hosting.add_commit(patch, raw);
    vcs.set_failing(true);

    let outcome = collector.handle(SLUG, "abc123").await.unwrap();
    assert!(outcome.is_collected(), "consolidation errors stay non-fatal");
    assert!(collector.state().has_processed("abc123"));
    assert_eq!(
        collector.state().batch_len(),
        0,
        "counter resets even when consolidation fails"
    );
}

#[tokio::test]
async fn test_fetch_failure_leaves_commit_retryable() {
    let dir = tempfile::tempdir().unwrap();
    let (hosting, _vcs, collector) = collector_with(&dir, |_| {});
    let (patch, raw) = commit_for("abc123", &[("src/main.rs", &[(10, 3)])]);
    hosting.add_commit(patch, raw);
    hosting.fail_commit(SLUG, "abc123");

    let err = collector.handle(SLUG, "abc123").await.unwrap_err();
    assert!(matches!(err, CollectError::Fetch(_)));
    assert!(err.is_retryable());
    assert!(!collector.state().has_processed("abc123"));
    assert_eq!(collector.state().batch_len(), 0);

    hosting.restore_commit(SLUG, "abc123");
    let outcome = collector.handle(SLUG, "abc123").await.unwrap();
    assert!(outcome.is_collected());
    assert_eq!(hosting.commit_fetches(SLUG, "abc123"), 2);
}

#[tokio::test]
async fn test_raw_diff_failure_still_marks_processed() {
    let dir = tempfile::tempdir().unwrap();
    let (hosting, _vcs, collector) = collector_with(&dir, |_| {});
    let (patch, raw) = commit_for("abc123", &[("src/main.rs", &[(10, 3)])]);
    hosting.add_commit(patch, raw);
    hosting.fail_raw_diff(SLUG, "abc123");

    let err = collector.handle(SLUG, "abc123").await.unwrap_err();
    assert!(matches!(err, CollectError::Fetch(_)));

    // The hunk file made it to disk before the archival step failed, so the
    // commit counts as processed and is not re-fetched.
    let commit_dir = dir.path().join("octocat-hello-world-abc123");
    assert!(commit_dir.join("src-main.rs-10").exists());
    assert!(!commit_dir.join(COMMIT_DIFF_FILE).exists());
    assert!(collector.state().has_processed("abc123"));
    assert_eq!(
        collector.state().batch_len(),
        0,
        "partial persistence does not count toward the batch"
    );

    let second = collector.handle(SLUG, "abc123").await.unwrap();
    assert_eq!(second, HandleOutcome::AlreadyProcessed);
}

#[tokio::test]
async fn test_ledger_seeds_dedup_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("processed.jsonl");
    let hosting = Arc::new(StaticHosting::new());
    let (patch, raw) = commit_for("abc123", &[("src/main.rs", &[(10, 3)])]);
    hosting.add_commit(patch, raw);

    let root = tempfile::tempdir().unwrap();
    let collector = Collector::new(
        CollectorConfig::new(root.path()),
        hosting.clone(),
        Arc::new(RecordingVcs::new()),
        Some(ProcessedLedger::open(&ledger_path).unwrap()),
    );
    collector.handle(SLUG, "abc123").await.unwrap();
    drop(collector);

    // New session, same ledger: the sha must not be fetched again.
    let restarted = Collector::new(
        CollectorConfig::new(root.path()),
        hosting.clone(),
        Arc::new(RecordingVcs::new()),
        Some(ProcessedLedger::open(&ledger_path).unwrap()),
    );
    let outcome = restarted.handle(SLUG, "abc123").await.unwrap();
    assert_eq!(outcome, HandleOutcome::AlreadyProcessed);
    assert_eq!(hosting.commit_fetches(SLUG, "abc123"), 1);
}

#[tokio::test]
async fn test_archived_diff_round_trips_to_qualification() {
    let dir = tempfile::tempdir().unwrap();
    let (hosting, _vcs, collector) = collector_with(&dir, |c| {
        c.filter.filter_multi_hunk = true;
        c.filter.hunk_distance = 600;
    });
    let (patch, raw) = commit_for("abc123", &[("src/main.rs", &[(10, 3), (500, 3)])]);
    hosting.add_commit(patch, raw);

    let outcome = collector.handle(SLUG, "abc123").await.unwrap();
    let commit_dir = match &outcome {
        HandleOutcome::Collected { dir, hunks } => {
            assert_eq!(*hunks, 1, "distance 600 merges the two fragments");
            dir.clone()
        }
        other => panic!("expected Collected, got {:?}", other),
    };

    // Re-parsing the archived diff and re-running qualification yields the
    // same hunks that were persisted.
    let archived = std::fs::read_to_string(commit_dir.join(COMMIT_DIFF_FILE)).unwrap();
    let reparsed = CommitPatch::new(SLUG, "abc123", split_files(&archived));
    let requalified = qualify(&reparsed, &collector.config().filter);

    assert_eq!(requalified.len(), 1);
    assert_eq!(requalified[0].file, "src/main.rs");
    assert_eq!(requalified[0].line, 10);
    let persisted = std::fs::read_to_string(commit_dir.join("src-main.rs-10")).unwrap();
    assert_eq!(requalified[0].content, persisted);
}

#[tokio::test]
async fn test_flattened_name_collision_gets_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let (hosting, _vcs, collector) = collector_with(&dir, |_| {});
    // Both paths flatten to `a-b.rs`, both hunks start at line 5.
    let (patch, raw) = commit_for(
        "abc123",
        &[("a/b.rs", &[(5, 2)]), ("a-b.rs", &[(5, 2)])],
    );
    hosting.add_commit(patch, raw);

    let outcome = collector.handle(SLUG, "abc123").await.unwrap();
    match outcome {
        HandleOutcome::Collected { hunks, dir } => {
            assert_eq!(hunks, 2);
            assert!(dir.join("a-b.rs-5").exists());
            assert!(dir.join("a-b.rs-5-2").exists(), "second taker gets a suffix");
        }
        other => panic!("expected Collected, got {:?}", other),
    }
}
