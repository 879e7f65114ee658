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

use std::collections::HashMap;
use std::fmt::{Debug, Error, Formatter};
use std::sync::{Mutex, MutexGuard};

use blake2::Blake2b512;
use blake2::Digest;
use restack_lib::backend::{
    Backend, BackendError, BackendResult, Commit, CommitId, FileFlags, FileId, Manifest,
    ManifestId,
};

const HASH_LENGTH: usize = 20;

#[derive(Default)]
struct TestBackendData {
    commits: HashMap<CommitId, Commit>,
    manifests: HashMap<ManifestId, Manifest>,
    files: HashMap<FileId, Vec<u8>>,
}

fn hash_field(hasher: &mut Blake2b512, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn hash_commit(commit: &Commit) -> Vec<u8> {
    let mut hasher = Blake2b512::default();
    hasher.update((commit.parents.len() as u64).to_le_bytes());
    for parent in &commit.parents {
        hash_field(&mut hasher, parent.as_bytes());
    }
    hash_field(&mut hasher, commit.manifest_id.as_bytes());
    hash_field(&mut hasher, commit.description.as_bytes());
    hash_field(&mut hasher, commit.author.as_bytes());
    hasher.update(commit.timestamp.timestamp.0.to_le_bytes());
    hasher.update(commit.timestamp.tz_offset.to_le_bytes());
    hasher.update((commit.extra.len() as u64).to_le_bytes());
    for (key, value) in &commit.extra {
        hash_field(&mut hasher, key.as_bytes());
        hash_field(&mut hasher, value.as_bytes());
    }
    hasher.finalize()[..HASH_LENGTH].to_vec()
}

fn hash_manifest(manifest: &Manifest) -> Vec<u8> {
    let mut hasher = Blake2b512::default();
    for (path, entry) in manifest.entries() {
        hash_field(&mut hasher, path.as_internal_str().as_bytes());
        hash_field(&mut hasher, entry.file.as_bytes());
        let flag_byte = match entry.flags {
            FileFlags::Normal => 0u8,
            FileFlags::Executable => 1u8,
            FileFlags::Symlink => 2u8,
        };
        hasher.update([flag_byte]);
        match &entry.copy_source {
            Some(source) => hash_field(&mut hasher, source.as_internal_str().as_bytes()),
            None => hasher.update(u64::MAX.to_le_bytes()),
        }
    }
    hasher.finalize()[..HASH_LENGTH].to_vec()
}

/// An in-memory, content-addressed backend for tests. Writing identical
/// content twice returns the same id with `created = false`, which is
/// exactly the behavior the rewrite idempotence guarantees lean on.
pub struct TestBackend {
    data: Mutex<TestBackendData>,
}

impl TestBackend {
    pub fn new() -> Self {
        TestBackend {
            data: Mutex::new(TestBackendData::default()),
        }
    }

    fn locked_data(&self) -> MutexGuard<'_, TestBackendData> {
        self.data.lock().unwrap()
    }
}

impl Default for TestBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for TestBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.debug_struct("TestBackend").finish_non_exhaustive()
    }
}

impl Backend for TestBackend {
    fn hash_length(&self) -> usize {
        HASH_LENGTH
    }

    fn read_commit(&self, id: &CommitId) -> BackendResult<Commit> {
        match self.locked_data().commits.get(id).cloned() {
            None => Err(BackendError::ObjectNotFound {
                object_type: "commit".to_string(),
                hash: id.hex(),
            }),
            Some(commit) => Ok(commit),
        }
    }

    fn write_commit(&self, contents: &Commit) -> BackendResult<(CommitId, bool)> {
        let id = CommitId::new(hash_commit(contents));
        let created = self
            .locked_data()
            .commits
            .insert(id.clone(), contents.clone())
            .is_none();
        Ok((id, created))
    }

    fn read_manifest(&self, id: &ManifestId) -> BackendResult<Manifest> {
        match self.locked_data().manifests.get(id).cloned() {
            None => Err(BackendError::ObjectNotFound {
                object_type: "manifest".to_string(),
                hash: id.hex(),
            }),
            Some(manifest) => Ok(manifest),
        }
    }

    fn write_manifest(&self, contents: &Manifest) -> BackendResult<(ManifestId, bool)> {
        let id = ManifestId::new(hash_manifest(contents));
        let created = self
            .locked_data()
            .manifests
            .insert(id.clone(), contents.clone())
            .is_none();
        Ok((id, created))
    }

    fn read_file(&self, id: &FileId) -> BackendResult<Vec<u8>> {
        match self.locked_data().files.get(id).cloned() {
            None => Err(BackendError::ObjectNotFound {
                object_type: "file".to_string(),
                hash: id.hex(),
            }),
            Some(contents) => Ok(contents),
        }
    }

    fn write_file(&self, contents: &[u8]) -> BackendResult<FileId> {
        let mut hasher = Blake2b512::default();
        hasher.update(contents);
        let id = FileId::new(hasher.finalize()[..HASH_LENGTH].to_vec());
        self.locked_data()
            .files
            .insert(id.clone(), contents.to_vec());
        Ok(id)
    }
}
