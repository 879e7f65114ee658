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

use thiserror::Error;

use crate::repo_path::RepoPathBuf;

/// Identifies a commit by the hash of its content.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct CommitId(Vec<u8>);

impl Debug for CommitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.debug_tuple("CommitId").field(&self.hex()).finish()
    }
}

impl CommitId {
    pub fn new(value: Vec<u8>) -> Self {
        Self(value)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        CommitId(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.clone()
    }

    pub fn from_hex(hex: &str) -> Self {
        CommitId(hex::decode(hex).unwrap())
    }

    pub fn hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// Identifies a manifest by the hash of its content.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct ManifestId(Vec<u8>);

impl Debug for ManifestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.debug_tuple("ManifestId").field(&self.hex()).finish()
    }
}

impl ManifestId {
    pub fn new(value: Vec<u8>) -> Self {
        Self(value)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        ManifestId(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.clone()
    }

    pub fn from_hex(hex: &str) -> Self {
        ManifestId(hex::decode(hex).unwrap())
    }

    pub fn hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// Identifies a file revision by the hash of its content.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub struct FileId(Vec<u8>);

impl Debug for FileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.debug_tuple("FileId").field(&self.hex()).finish()
    }
}

impl FileId {
    pub fn new(value: Vec<u8>) -> Self {
        Self(value)
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        FileId(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.clone()
    }

    pub fn from_hex(hex: &str) -> Self {
        FileId(hex::decode(hex).unwrap())
    }

    pub fn hex(&self) -> String {
        hex::encode(&self.0)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
pub struct MillisSinceEpoch(pub i64);

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Timestamp {
    pub timestamp: MillisSinceEpoch,
    pub tz_offset: i32,
}

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(chrono::offset::Local::now())
    }

    pub fn from_datetime<Tz: chrono::TimeZone<Offset = chrono::offset::FixedOffset>>(
        datetime: chrono::DateTime<Tz>,
    ) -> Self {
        Self {
            timestamp: MillisSinceEpoch(datetime.timestamp_millis()),
            tz_offset: datetime.offset().local_minus_utc() / 60,
        }
    }
}

/// Mode flags for a tracked file.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
pub enum FileFlags {
    Normal,
    Executable,
    Symlink,
}

/// One manifest slot: which file revision a path maps to, its flags, and
/// where it was copied from in the parent, if anywhere.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ManifestEntry {
    pub file: FileId,
    pub flags: FileFlags,
    pub copy_source: Option<RepoPathBuf>,
}

/// Snapshot of all tracked paths in a commit.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Manifest {
    entries: BTreeMap<RepoPathBuf, ManifestEntry>,
}

impl Manifest {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &RepoPathBuf) -> Option<&ManifestEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &RepoPathBuf) -> bool {
        self.entries.contains_key(path)
    }

    pub fn set(&mut self, path: RepoPathBuf, entry: ManifestEntry) {
        self.entries.insert(path, entry);
    }

    pub fn remove(&mut self, path: &RepoPathBuf) {
        self.entries.remove(path);
    }

    pub fn entries(&self) -> impl Iterator<Item = (&RepoPathBuf, &ManifestEntry)> {
        self.entries.iter()
    }

    /// Paths whose entry differs between the two manifests, including paths
    /// only present on one side.
    pub fn diff(&self, other: &Manifest) -> BTreeSet<RepoPathBuf> {
        let mut paths = BTreeSet::new();
        for (path, entry) in &self.entries {
            if other.get(path) != Some(entry) {
                paths.insert(path.clone());
            }
        }
        for path in other.entries.keys() {
            if !self.contains(path) {
                paths.insert(path.clone());
            }
        }
        paths
    }
}

/// Commit data as stored by a backend. The in-memory handle around it is
/// `commit::Commit`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Commit {
    pub parents: Vec<CommitId>,
    pub manifest_id: ManifestId,
    pub description: String,
    /// Combined "Name <email>" author string.
    pub author: String,
    pub timestamp: Timestamp,
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Object {hash} of type {object_type} not found")]
    ObjectNotFound { object_type: String, hash: String },
    #[error("Error when reading object {hash} of type {object_type}: {source}")]
    ReadObject {
        object_type: String,
        hash: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Unexpected error from backend: {0}")]
    Other(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage for commits, manifests, and file revisions.
///
/// Writes are content addressed: storing byte-identical content a second
/// time must return the same id with `created = false` instead of creating
/// a new object. That flag is what lets a rewrite to identical content be
/// reported as "no new commit created".
pub trait Backend: Send + Sync + Debug {
    fn hash_length(&self) -> usize;

    fn read_commit(&self, id: &CommitId) -> BackendResult<Commit>;

    fn write_commit(&self, contents: &Commit) -> BackendResult<(CommitId, bool)>;

    fn read_manifest(&self, id: &ManifestId) -> BackendResult<Manifest>;

    fn write_manifest(&self, contents: &Manifest) -> BackendResult<(ManifestId, bool)>;

    fn read_file(&self, id: &FileId) -> BackendResult<Vec<u8>>;

    fn write_file(&self, contents: &[u8]) -> BackendResult<FileId>;
}
