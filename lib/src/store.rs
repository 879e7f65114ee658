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

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::backend;
use crate::backend::{
    Backend, BackendResult, CommitId, FileId, Manifest, ManifestId, MillisSinceEpoch, Timestamp,
};
use crate::commit::Commit;

/// Wraps a [`Backend`] with caching, the synthetic root commit, and the
/// position table used to order commits by creation.
pub struct Store {
    backend: Box<dyn Backend>,
    root_commit_id: CommitId,
    empty_manifest_id: ManifestId,
    commit_cache: RwLock<HashMap<CommitId, Arc<backend::Commit>>>,
    manifest_cache: RwLock<HashMap<ManifestId, Arc<Manifest>>>,
    // Local creation order, like a revision number. Identical content
    // written twice keeps its original position.
    positions: RwLock<HashMap<CommitId, u64>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.debug_struct("Store")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl Store {
    pub fn new(backend: Box<dyn Backend>) -> BackendResult<Arc<Self>> {
        let (empty_manifest_id, _) = backend.write_manifest(&Manifest::default())?;
        let root_commit_id = CommitId::new(vec![0; backend.hash_length()]);
        let store = Store {
            backend,
            root_commit_id: root_commit_id.clone(),
            empty_manifest_id,
            commit_cache: Default::default(),
            manifest_cache: Default::default(),
            positions: Default::default(),
        };
        store.positions.write().unwrap().insert(root_commit_id, 0);
        Ok(Arc::new(store))
    }

    pub fn hash_length(&self) -> usize {
        self.backend.hash_length()
    }

    pub fn root_commit_id(&self) -> &CommitId {
        &self.root_commit_id
    }

    pub fn empty_manifest_id(&self) -> &ManifestId {
        &self.empty_manifest_id
    }

    pub fn root_commit(self: &Arc<Self>) -> Commit {
        let data = Arc::new(self.make_root_commit());
        Commit::new(self.clone(), self.root_commit_id.clone(), data)
    }

    fn make_root_commit(&self) -> backend::Commit {
        backend::Commit {
            parents: vec![],
            manifest_id: self.empty_manifest_id.clone(),
            description: String::new(),
            author: String::new(),
            timestamp: Timestamp {
                timestamp: MillisSinceEpoch(0),
                tz_offset: 0,
            },
            extra: BTreeMap::new(),
        }
    }

    pub fn get_commit(self: &Arc<Self>, id: &CommitId) -> BackendResult<Commit> {
        if *id == self.root_commit_id {
            return Ok(self.root_commit());
        }
        let data = {
            let cache = self.commit_cache.read().unwrap();
            cache.get(id).cloned()
        };
        let data = match data {
            Some(data) => data,
            None => {
                let data = Arc::new(self.backend.read_commit(id)?);
                self.commit_cache
                    .write()
                    .unwrap()
                    .insert(id.clone(), data.clone());
                data
            }
        };
        Ok(Commit::new(self.clone(), id.clone(), data))
    }

    /// Writes a commit through the backend. `created` is false when the
    /// backend already had a commit with identical content; the existing id
    /// is returned and no position is consumed.
    pub fn write_commit(
        self: &Arc<Self>,
        commit: backend::Commit,
    ) -> BackendResult<(Commit, bool)> {
        let (id, created) = self.backend.write_commit(&commit)?;
        if created {
            let mut positions = self.positions.write().unwrap();
            let next = positions.len() as u64;
            positions.entry(id.clone()).or_insert(next);
        }
        let data = Arc::new(commit);
        self.commit_cache
            .write()
            .unwrap()
            .insert(id.clone(), data.clone());
        Ok((Commit::new(self.clone(), id, data), created))
    }

    pub fn get_manifest(&self, id: &ManifestId) -> BackendResult<Arc<Manifest>> {
        {
            let cache = self.manifest_cache.read().unwrap();
            if let Some(manifest) = cache.get(id) {
                return Ok(manifest.clone());
            }
        }
        let manifest = Arc::new(self.backend.read_manifest(id)?);
        self.manifest_cache
            .write()
            .unwrap()
            .insert(id.clone(), manifest.clone());
        Ok(manifest)
    }

    pub fn write_manifest(&self, manifest: Manifest) -> BackendResult<ManifestId> {
        let (id, _created) = self.backend.write_manifest(&manifest)?;
        self.manifest_cache
            .write()
            .unwrap()
            .insert(id.clone(), Arc::new(manifest));
        Ok(id)
    }

    pub fn get_file(&self, id: &FileId) -> BackendResult<Vec<u8>> {
        self.backend.read_file(id)
    }

    pub fn write_file(&self, contents: &[u8]) -> BackendResult<FileId> {
        self.backend.write_file(contents)
    }

    /// Creation order of a commit, with the root commit at 0. Only known
    /// for commits written through this store.
    pub fn position(&self, id: &CommitId) -> Option<u64> {
        self.positions.read().unwrap().get(id).copied()
    }
}
