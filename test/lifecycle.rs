// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{PinnedManifest, RepoFixture};

use anyhow::Result;
use git2::Oid;
use pretty_assertions::assert_eq;
use repatch::{
    GitCli, Layout, Lifecycle, LifecycleError, Operation, Outcome, ProjectRegistry, ResetMode,
    Settings,
};
use std::{
    collections::BTreeMap,
    fs::{read, read_dir, read_to_string, write},
    path::Path,
};

fn open(layout: &Layout, revision: Oid) -> Lifecycle<'_, PinnedManifest, GitCli> {
    let manifest = PinnedManifest::default().pin(layout.source_dir("a/b"), revision);
    Lifecycle::open(layout, manifest, GitCli::default())
}

fn snapshot(dir: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    for entry in read_dir(dir)? {
        let entry = entry?;
        files.insert(entry.file_name().to_string_lossy().into_owned(), read(entry.path())?);
    }

    Ok(files)
}

#[test]
fn rebuild_then_apply_round_trip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let layout = Layout::new(dir.path(), &Settings::default());
    let fixture = RepoFixture::new(layout.source_dir("a/b"))?;
    let upstream = fixture.stage_and_commit("base.txt", "one\n")?;

    let report = open(&layout, upstream).run(Operation::Init {
        path: layout.source_dir("a/b"),
    })?;
    assert!(report.is_success());
    assert_eq!(fixture.head_branch()?, Some("repatch".into()));
    assert!(layout.patches_dir("a/b").join(".keep").is_file());

    fixture.stage_and_commit("base.txt", "two\n")?;
    fixture.stage_and_commit("extra.txt", "extra\n")?;
    let expect = fixture.head_tree()?;

    let lifecycle = open(&layout, upstream);
    let report = lifecycle.rebuild(&["a/b"]);
    assert!(report.is_success());
    let first = snapshot(&layout.patches_dir("a/b"))?;
    assert_eq!(first.len(), 2);
    assert!(first.keys().all(|name| name.ends_with(".patch")));

    let index = read_to_string(layout.index_file())?;
    assert!(index.starts_with("## miscellaneous\n\n"));
    assert_eq!(index.matches("- [`a/b` Change").count(), 2);

    // Nothing new committed, so patch files come out byte-identical.
    let report = lifecycle.rebuild(&[] as &[&str]);
    assert!(report.is_success());
    assert_eq!(snapshot(&layout.patches_dir("a/b"))?, first);

    let report = lifecycle.apply(&["a/b"], ResetMode::Keep);
    assert!(report.is_success());
    assert!(matches!(report.outcome("a/b"), Some(Outcome::Done)));
    assert_eq!(fixture.head_tree()?, expect);
    assert_eq!(fixture.head_branch()?, Some("repatch".into()));

    Ok(())
}

#[test]
fn apply_protects_uncommitted_work() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let layout = Layout::new(dir.path(), &Settings::default());
    let fixture = RepoFixture::new(layout.source_dir("a/b"))?;
    let upstream = fixture.stage_and_commit("base.txt", "one\n")?;
    open(&layout, upstream).init(&layout.source_dir("a/b"))?;
    fixture.stage_and_commit("base.txt", "two\n")?;
    let expect = fixture.head_tree()?;

    write(fixture.path().join("scratch.txt"), "wip\n")?;
    let report = open(&layout, upstream).apply(&["a/b"], ResetMode::Keep);
    assert!(report.is_success());
    assert_eq!(report.skipped(), vec!["a/b"]);
    assert_eq!(fixture.head_tree()?, expect);
    assert_eq!(read_to_string(fixture.path().join("scratch.txt"))?, "wip\n");

    Ok(())
}

#[test]
fn conflict_is_left_for_inspection_then_discarded() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let layout = Layout::new(dir.path(), &Settings::default());
    let fixture = RepoFixture::new(layout.source_dir("a/b"))?;
    let upstream = fixture.stage_and_commit("base.txt", "one\n")?;
    open(&layout, upstream).init(&layout.source_dir("a/b"))?;
    fixture.stage_and_commit("base.txt", "two\n")?;
    let expect = fixture.head_tree()?;
    assert!(open(&layout, upstream).rebuild(&["a/b"]).is_success());

    // Upstream moved on and touched the same line.
    let moved = fixture.commit_detached(upstream, "base.txt", "three\n")?;
    let report = open(&layout, moved).apply(&["a/b"], ResetMode::Keep);
    assert_eq!(report.failed(), vec!["a/b"]);
    assert!(matches!(
        report.outcome("a/b"),
        Some(Outcome::Failed(LifecycleError::Conflict { .. }))
    ));

    // Unmerged entries count as uncommitted work, so a plain apply stays away.
    let report = open(&layout, upstream).apply(&["a/b"], ResetMode::Keep);
    assert_eq!(report.skipped(), vec!["a/b"]);

    // Back on the old pin, discarding aborts the stale session and replays.
    let report = open(&layout, upstream).run(Operation::Apply {
        projects: vec!["a/b".into()],
        discard: true,
    })?;
    assert!(report.is_success());
    assert_eq!(fixture.head_tree()?, expect);

    Ok(())
}

#[test]
fn failed_rebuild_keeps_project_tracked() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let layout = Layout::new(dir.path(), &Settings::default());
    let fixture = RepoFixture::new(layout.source_dir("a/b"))?;
    let upstream = fixture.stage_and_commit("base.txt", "one\n")?;
    open(&layout, upstream).init(&layout.source_dir("a/b"))?;
    fixture.stage_and_commit("base.txt", "two\n")?;
    assert!(open(&layout, upstream).rebuild(&["a/b"]).is_success());
    let before = snapshot(&layout.patches_dir("a/b"))?;

    // Pinned revision was never fetched.
    let missing = Oid::from_str("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef")?;
    let report = open(&layout, missing).rebuild(&["a/b"]);
    assert_eq!(report.failed(), vec!["a/b"]);
    assert_eq!(snapshot(&layout.patches_dir("a/b"))?, before);

    let registry = ProjectRegistry::discover(&layout, &GitCli::default());
    assert!(registry.contains("a/b"));
    assert_eq!(registry.len(), 1);

    Ok(())
}
