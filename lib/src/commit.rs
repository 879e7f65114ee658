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

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Error, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::backend;
use crate::backend::{BackendResult, CommitId, Manifest, ManifestId, Timestamp};
use crate::repo_path::RepoPathBuf;
use crate::store::Store;

/// Extra-metadata key carrying the branch label.
pub const BRANCH_EXTRA_KEY: &str = "branch";

/// Branch reported for commits without an explicit label.
pub const DEFAULT_BRANCH: &str = "default";

/// In-memory handle to a stored commit.
#[derive(Clone)]
pub struct Commit {
    store: Arc<Store>,
    id: CommitId,
    data: Arc<backend::Commit>,
}

impl Debug for Commit {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.debug_struct("Commit").field("id", &self.id).finish()
    }
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Commit {}

impl Ord for Commit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl PartialOrd for Commit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Commit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Commit {
    pub fn new(store: Arc<Store>, id: CommitId, data: Arc<backend::Commit>) -> Self {
        Commit { store, id, data }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn id(&self) -> &CommitId {
        &self.id
    }

    pub fn parent_ids(&self) -> &[CommitId] {
        &self.data.parents
    }

    pub fn parents(&self) -> BackendResult<Vec<Commit>> {
        self.data
            .parents
            .iter()
            .map(|id| self.store.get_commit(id))
            .collect()
    }

    pub fn manifest_id(&self) -> &ManifestId {
        &self.data.manifest_id
    }

    pub fn manifest(&self) -> BackendResult<Arc<Manifest>> {
        self.store.get_manifest(&self.data.manifest_id)
    }

    pub fn description(&self) -> &str {
        &self.data.description
    }

    pub fn author(&self) -> &str {
        &self.data.author
    }

    pub fn timestamp(&self) -> &Timestamp {
        &self.data.timestamp
    }

    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.data.extra
    }

    pub fn branch(&self) -> &str {
        self.data
            .extra
            .get(BRANCH_EXTRA_KEY)
            .map(String::as_str)
            .unwrap_or(DEFAULT_BRANCH)
    }

    pub fn is_root(&self) -> bool {
        &self.id == self.store.root_commit_id()
    }

    pub fn data(&self) -> &Arc<backend::Commit> {
        &self.data
    }

    /// Paths whose manifest entry differs from the first parent. For a
    /// commit on the root this is every tracked path.
    pub fn changed_files(&self) -> BackendResult<BTreeSet<RepoPathBuf>> {
        let manifest = self.manifest()?;
        let parent_manifest = match self.parent_ids().first() {
            Some(id) => self.store.get_commit(id)?.manifest()?,
            None => self.store.get_manifest(self.store.empty_manifest_id())?,
        };
        Ok(parent_manifest.diff(&manifest))
    }
}
