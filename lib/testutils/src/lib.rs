// Copyright 2023 The Restack Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;
use restack_lib::backend::{CommitId, FileFlags, Manifest, ManifestEntry, ManifestId};
use restack_lib::bookmarks::BookmarksUpdater;
use restack_lib::commit::Commit;
use restack_lib::commit_builder::CommitBuilder;
use restack_lib::obsolete::InhibitionTracker;
use restack_lib::repo::{MutableRepo, ReadonlyRepo, Repo};
use restack_lib::repo_path::RepoPathBuf;
use restack_lib::restack::{RebaseError, RebaseOptions, Rebaser};
use restack_lib::settings::UserSettings;
use restack_lib::store::Store;
use restack_lib::transaction::Transaction;
use tempfile::TempDir;

use crate::test_backend::TestBackend;

pub mod test_backend;

pub fn new_temp_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("restack-test-")
        .tempdir()
        .unwrap()
}

pub fn base_config() -> config::ConfigBuilder<config::builder::DefaultState> {
    config::Config::builder().add_source(config::File::from_str(
        r#"
            user.name = "Test User"
            user.email = "test.user@example.com"
            debug.commit-timestamp = "2001-02-03T04:05:06+07:00"
        "#,
        config::FileFormat::Toml,
    ))
}

pub fn user_settings() -> UserSettings {
    let config = base_config().build().unwrap();
    UserSettings::from_config(config)
}

pub struct TestRepo {
    _temp_dir: TempDir,
    pub repo: Arc<ReadonlyRepo>,
}

impl TestRepo {
    pub fn init() -> Self {
        Self::init_with_inhibition(Some(Arc::new(InhibitionTracker::default())))
    }

    pub fn init_without_inhibition() -> Self {
        Self::init_with_inhibition(None)
    }

    pub fn init_with_inhibition(inhibition: Option<Arc<InhibitionTracker>>) -> Self {
        let temp_dir = new_temp_dir();

        let repo_dir = temp_dir.path().join("repo");
        fs::create_dir(&repo_dir).unwrap();

        let repo =
            ReadonlyRepo::init(&repo_dir, Box::new(TestBackend::new()), inhibition).unwrap();

        Self {
            _temp_dir: temp_dir,
            repo,
        }
    }
}

pub fn file_entry(store: &Arc<Store>, contents: &str) -> ManifestEntry {
    ManifestEntry {
        file: store.write_file(contents.as_bytes()).unwrap(),
        flags: FileFlags::Normal,
        copy_source: None,
    }
}

pub fn executable_entry(store: &Arc<Store>, contents: &str) -> ManifestEntry {
    ManifestEntry {
        file: store.write_file(contents.as_bytes()).unwrap(),
        flags: FileFlags::Executable,
        copy_source: None,
    }
}

pub fn copied_entry(store: &Arc<Store>, contents: &str, source: &str) -> ManifestEntry {
    ManifestEntry {
        file: store.write_file(contents.as_bytes()).unwrap(),
        flags: FileFlags::Normal,
        copy_source: Some(RepoPathBuf::from_internal_string(source)),
    }
}

pub fn create_manifest(store: &Arc<Store>, path_contents: &[(&str, &str)]) -> ManifestId {
    let mut manifest = Manifest::default();
    for (path, contents) in path_contents {
        manifest.set(
            RepoPathBuf::from_internal_string(path),
            file_entry(store, contents),
        );
    }
    store.write_manifest(manifest).unwrap()
}

/// Writes a commit with the given manifest. Without parents the commit
/// goes on the root.
pub fn write_commit_with_manifest(
    mut_repo: &mut MutableRepo,
    settings: &UserSettings,
    parents: &[&Commit],
    description: &str,
    manifest: Manifest,
) -> Commit {
    let store = mut_repo.store().clone();
    let manifest_id = store.write_manifest(manifest).unwrap();
    let parent_ids = if parents.is_empty() {
        vec![store.root_commit_id().clone()]
    } else {
        parents
            .iter()
            .map(|commit| commit.id().clone())
            .collect_vec()
    };
    let (commit, _created) = CommitBuilder::for_new_commit(settings, &store, parent_ids)
        .set_manifest(manifest_id)
        .set_description(description.to_string())
        .write_to_repo(mut_repo)
        .unwrap();
    commit
}

/// Writes a commit whose manifest is the first parent's manifest with
/// `files` layered on top.
pub fn write_commit_with_files(
    mut_repo: &mut MutableRepo,
    settings: &UserSettings,
    parents: &[&Commit],
    files: &[(&str, &str)],
) -> Commit {
    let store = mut_repo.store().clone();
    let mut manifest = match parents.first() {
        Some(parent) => parent.manifest().unwrap().as_ref().clone(),
        None => Manifest::default(),
    };
    for (path, contents) in files {
        manifest.set(
            RepoPathBuf::from_internal_string(path),
            file_entry(&store, contents),
        );
    }
    let number = rand::random::<u32>();
    write_commit_with_manifest(
        mut_repo,
        settings,
        parents,
        &format!("commit {number}"),
        manifest,
    )
}

pub fn create_random_commit(settings: &UserSettings, store: &Arc<Store>) -> CommitBuilder<'static> {
    let number = rand::random::<u32>();
    CommitBuilder::for_new_commit(settings, store, vec![store.root_commit_id().clone()])
        .set_description(format!("random commit {number}"))
}

pub fn write_random_commit(mut_repo: &mut MutableRepo, settings: &UserSettings) -> Commit {
    let store = mut_repo.store().clone();
    let (commit, _created) = create_random_commit(settings, &store)
        .write_to_repo(mut_repo)
        .unwrap();
    commit
}

pub struct CommitGraphBuilder<'settings, 'repo> {
    settings: &'settings UserSettings,
    mut_repo: &'repo mut MutableRepo,
}

impl<'settings, 'repo> CommitGraphBuilder<'settings, 'repo> {
    pub fn new(
        settings: &'settings UserSettings,
        mut_repo: &'repo mut MutableRepo,
    ) -> CommitGraphBuilder<'settings, 'repo> {
        CommitGraphBuilder { settings, mut_repo }
    }

    pub fn initial_commit(&mut self) -> Commit {
        write_random_commit(self.mut_repo, self.settings)
    }

    pub fn commit_with_parents(&mut self, parents: &[&Commit]) -> Commit {
        let parent_ids = parents
            .iter()
            .map(|commit| commit.id().clone())
            .collect_vec();
        let store = self.mut_repo.store().clone();
        let (commit, _created) = create_random_commit(self.settings, &store)
            .set_parents(parent_ids)
            .write_to_repo(self.mut_repo)
            .unwrap();
        commit
    }
}

/// An in-process stand-in for the external rebase command.
///
/// Commits in the rev set are rewritten in creation order. A parent that
/// was itself rebased maps to its replacement, an obsolete parent maps to
/// the destination, and any other parent is kept. Commits whose parents
/// come out unchanged are skipped without a marker.
pub struct TestRebaser {
    fail_on: Option<CommitId>,
}

impl TestRebaser {
    pub fn new() -> Self {
        TestRebaser { fail_on: None }
    }

    /// A rebaser that reports a conflict when it reaches `commit_id`,
    /// leaving commits rebased before it in the transaction.
    pub fn failing_on(commit_id: CommitId) -> Self {
        TestRebaser {
            fail_on: Some(commit_id),
        }
    }
}

impl Default for TestRebaser {
    fn default() -> Self {
        Self::new()
    }
}

impl Rebaser for TestRebaser {
    fn rebase(
        &self,
        settings: &UserSettings,
        tx: &mut Transaction,
        options: &RebaseOptions,
    ) -> Result<(), RebaseError> {
        let destination = options
            .destination
            .clone()
            .expect("rebase destination must be set");
        let store = tx.repo().store().clone();
        let mut rev_set = options.rev_set.clone();
        rev_set.sort_by_key(|id| store.position(id).unwrap());
        let commits: Vec<Commit> = rev_set
            .iter()
            .map(|id| store.get_commit(id))
            .try_collect()?;
        let mut obsolete_parents = HashSet::new();
        {
            let evolution = tx.repo_mut().evolution()?;
            for commit in &commits {
                for parent in commit.parent_ids() {
                    if evolution.is_obsolete(parent) {
                        obsolete_parents.insert(parent.clone());
                    }
                }
            }
        }
        let mut rebased: HashMap<CommitId, CommitId> = HashMap::new();
        for old in &commits {
            if self.fail_on.as_ref() == Some(old.id()) {
                return Err(RebaseError::Conflict {
                    commit_id: old.id().clone(),
                });
            }
            let new_parent_ids = old
                .parent_ids()
                .iter()
                .map(|parent| {
                    if let Some(new_parent) = rebased.get(parent) {
                        new_parent.clone()
                    } else if obsolete_parents.contains(parent) {
                        destination.clone()
                    } else {
                        parent.clone()
                    }
                })
                .collect_vec();
            if new_parent_ids.as_slice() == old.parent_ids() {
                continue;
            }
            let updater = BookmarksUpdater::new(tx.repo().view(), std::slice::from_ref(old.id()));
            let (new_commit, _created) = CommitBuilder::for_rewrite_from(settings, &store, old)
                .set_parents(new_parent_ids)
                .write_to_repo(tx.repo_mut())?;
            tx.repo_mut().record_obsolete(
                old.id(),
                std::slice::from_ref(new_commit.id()),
                Some(&options.operation),
            );
            updater.apply(tx.repo_mut(), new_commit.id());
            rebased.insert(old.id().clone(), new_commit.id().clone());
        }
        Ok(())
    }
}

pub fn assert_no_forgotten_test_files(test_dir: &Path) {
    let runner_path = test_dir.join("runner.rs");
    let runner = fs::read_to_string(&runner_path).unwrap();
    let entries = fs::read_dir(test_dir).unwrap();
    for entry in entries {
        let path = entry.unwrap().path();
        if let Some(ext) = path.extension() {
            let name = path.file_stem().unwrap();
            if ext == "rs" && name != "runner" {
                let search = format!("mod {};", name.to_str().unwrap());
                assert!(
                    runner.contains(&search),
                    "missing `{search}` declaration in {}",
                    runner_path.display()
                );
            }
        }
    }
}
