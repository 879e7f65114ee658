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

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backend;
use crate::backend::{BackendResult, CommitId, ManifestEntry, ManifestId, Timestamp};
use crate::commit::Commit;
use crate::repo::MutableRepo;
use crate::repo_path::RepoPathBuf;
use crate::settings::{RewriteDatePolicy, UserSettings};
use crate::store::Store;

type FileSourceFn<'a> = Box<dyn Fn(&RepoPathBuf) -> BackendResult<Option<ManifestEntry>> + 'a>;

/// Assembles a commit and writes it to the repository.
///
/// The manifest can be given directly with `set_manifest`, or described
/// lazily with `set_changed_files` as a delta against the first parent.
/// In the lazy form file content is only looked up when the commit is
/// actually written.
pub struct CommitBuilder<'a> {
    store: Arc<Store>,
    commit: backend::Commit,
    changed_files: Option<(Vec<RepoPathBuf>, FileSourceFn<'a>)>,
}

impl<'a> CommitBuilder<'a> {
    pub fn for_new_commit(
        settings: &UserSettings,
        store: &Arc<Store>,
        parents: Vec<CommitId>,
    ) -> CommitBuilder<'a> {
        let commit = backend::Commit {
            parents,
            manifest_id: store.empty_manifest_id().clone(),
            description: String::new(),
            author: settings.user(),
            timestamp: settings.timestamp(),
            extra: BTreeMap::new(),
        };
        CommitBuilder {
            store: store.clone(),
            commit,
            changed_files: None,
        }
    }

    /// Starts from a copy of `predecessor`. The timestamp follows
    /// `rewrite.date-policy`: by default the predecessor's is kept, so a
    /// rewrite that changes nothing reproduces the predecessor.
    pub fn for_rewrite_from(
        settings: &UserSettings,
        store: &Arc<Store>,
        predecessor: &Commit,
    ) -> CommitBuilder<'a> {
        let mut commit = predecessor.data().as_ref().clone();
        if settings.rewrite_date_policy() == RewriteDatePolicy::Current {
            commit.timestamp = settings.timestamp();
        }
        CommitBuilder {
            store: store.clone(),
            commit,
            changed_files: None,
        }
    }

    pub fn set_parents(mut self, parents: Vec<CommitId>) -> Self {
        self.commit.parents = parents;
        self
    }

    pub fn set_manifest(mut self, manifest_id: ManifestId) -> Self {
        self.commit.manifest_id = manifest_id;
        self.changed_files = None;
        self
    }

    /// Describes the manifest as a delta against the first parent: each
    /// path in `files` is resolved through `source_fn` when the commit is
    /// written, with `None` meaning the path is removed.
    pub fn set_changed_files(
        mut self,
        files: Vec<RepoPathBuf>,
        source_fn: FileSourceFn<'a>,
    ) -> Self {
        self.changed_files = Some((files, source_fn));
        self
    }

    pub fn set_description(mut self, description: String) -> Self {
        self.commit.description = description;
        self
    }

    pub fn set_author(mut self, author: String) -> Self {
        self.commit.author = author;
        self
    }

    pub fn set_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.commit.timestamp = timestamp;
        self
    }

    pub fn set_extra(mut self, extra: BTreeMap<String, String>) -> Self {
        self.commit.extra = extra;
        self
    }

    pub fn set_extra_entry(mut self, key: String, value: String) -> Self {
        self.commit.extra.insert(key, value);
        self
    }

    /// Writes the commit and makes it a head. Returns the commit and
    /// whether the store had to create it.
    pub fn write_to_repo(mut self, mut_repo: &mut MutableRepo) -> BackendResult<(Commit, bool)> {
        if let Some((files, source_fn)) = self.changed_files.take() {
            let mut manifest = match self.commit.parents.first() {
                Some(parent_id) => {
                    let parent = self.store.get_commit(parent_id)?;
                    self.store.get_manifest(parent.manifest_id())?.as_ref().clone()
                }
                None => backend::Manifest::default(),
            };
            for path in &files {
                match source_fn(path)? {
                    Some(entry) => manifest.set(path.clone(), entry),
                    None => manifest.remove(path),
                }
            }
            self.commit.manifest_id = self.store.write_manifest(manifest)?;
        }
        let (commit, created) = self.store.write_commit(self.commit)?;
        mut_repo.add_head(&commit);
        Ok((commit, created))
    }
}
