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

use std::collections::HashSet;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::backend::{Backend, BackendResult, CommitId};
use crate::bookmarks::BookmarkMove;
use crate::commit::Commit;
use crate::evolution::Evolution;
use crate::lock::FileLock;
use crate::obsolete::{InhibitionTracker, ObsoleteMarker, ObsoleteStore};
use crate::store::Store;
use crate::transaction::Transaction;
use crate::view::View;

pub trait Repo {
    fn store(&self) -> &Arc<Store>;
    fn view(&self) -> &View;
    fn inhibition(&self) -> Option<&Arc<InhibitionTracker>>;
}

/// An immutable snapshot of the repository. Changes go through
/// [`ReadonlyRepo::start_transaction`], which yields a new snapshot on
/// commit; existing snapshots stay valid.
pub struct ReadonlyRepo {
    repo_path: PathBuf,
    store: Arc<Store>,
    view: View,
    obsolete_store: Arc<ObsoleteStore>,
    inhibition: Option<Arc<InhibitionTracker>>,
    evolution: OnceCell<Evolution>,
}

impl Debug for ReadonlyRepo {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.debug_struct("ReadonlyRepo")
            .field("repo_path", &self.repo_path)
            .finish_non_exhaustive()
    }
}

impl ReadonlyRepo {
    /// Creates a repository at `repo_path` on top of `backend`. Passing
    /// `None` for `inhibition` turns every inhibition operation into a
    /// no-op; obsolete commits then hide as soon as nothing else keeps
    /// them.
    pub fn init(
        repo_path: &Path,
        backend: Box<dyn Backend>,
        inhibition: Option<Arc<InhibitionTracker>>,
    ) -> BackendResult<Arc<ReadonlyRepo>> {
        let store = Store::new(backend)?;
        let view = View::new(store.root_commit_id().clone());
        Ok(Arc::new(ReadonlyRepo {
            repo_path: repo_path.to_path_buf(),
            store,
            view,
            obsolete_store: Arc::new(ObsoleteStore::default()),
            inhibition,
            evolution: OnceCell::new(),
        }))
    }

    pub(crate) fn successor(base: &Arc<ReadonlyRepo>, view: View) -> Arc<ReadonlyRepo> {
        Arc::new(ReadonlyRepo {
            repo_path: base.repo_path.clone(),
            store: base.store.clone(),
            view,
            obsolete_store: base.obsolete_store.clone(),
            inhibition: base.inhibition.clone(),
            evolution: OnceCell::new(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn obsolete_store(&self) -> &Arc<ObsoleteStore> {
        &self.obsolete_store
    }

    /// Evolution state of this snapshot, calculated on first use.
    pub fn evolution(&self) -> BackendResult<&Evolution> {
        self.evolution.get_or_try_init(|| {
            let markers = self.obsolete_store.snapshot();
            let inhibited = match &self.inhibition {
                Some(tracker) => tracker.snapshot(),
                None => HashSet::new(),
            };
            Evolution::calculate(&self.store, &self.view, &markers, &inhibited)
        })
    }

    pub fn start_transaction(self: &Arc<ReadonlyRepo>, description: &str) -> Transaction {
        Transaction::new(self, description)
    }

    /// Takes the working-copy lock. By convention this is acquired before
    /// the store lock and released after it.
    pub fn lock_working_copy(&self) -> FileLock {
        FileLock::lock(self.repo_path.join("wlock"))
    }

    pub fn lock_store(&self) -> FileLock {
        FileLock::lock(self.repo_path.join("lock"))
    }
}

impl Repo for ReadonlyRepo {
    fn store(&self) -> &Arc<Store> {
        &self.store
    }

    fn view(&self) -> &View {
        &self.view
    }

    fn inhibition(&self) -> Option<&Arc<InhibitionTracker>> {
        self.inhibition.as_ref()
    }
}

/// The in-transaction state of the repository: a mutable view plus the
/// markers, deferred deinhibits and bookmark moves recorded so far.
pub struct MutableRepo {
    base_repo: Arc<ReadonlyRepo>,
    view: View,
    pending_markers: Vec<ObsoleteMarker>,
    pending_deinhibits: Vec<CommitId>,
    bookmark_moves: Vec<BookmarkMove>,
    evolution: Option<Evolution>,
}

impl MutableRepo {
    pub(crate) fn new(base_repo: &Arc<ReadonlyRepo>) -> MutableRepo {
        MutableRepo {
            base_repo: base_repo.clone(),
            view: base_repo.view.clone(),
            pending_markers: vec![],
            pending_deinhibits: vec![],
            bookmark_moves: vec![],
            evolution: None,
        }
    }

    pub fn base_repo(&self) -> &Arc<ReadonlyRepo> {
        &self.base_repo
    }

    pub fn add_head(&mut self, commit: &Commit) {
        self.view.add_head(commit.id(), commit.parent_ids());
        self.evolution = None;
    }

    pub fn set_bookmark(&mut self, name: String, target: CommitId) {
        self.view.set_bookmark(name, target);
        self.evolution = None;
    }

    pub fn remove_bookmark(&mut self, name: &str) {
        self.view.remove_bookmark(name);
        self.evolution = None;
    }

    /// Records that `precursor` was superseded by `successors` (none means
    /// pruned). The marker becomes shared state when the transaction
    /// commits but already affects this transaction's evolution queries.
    pub fn record_obsolete(
        &mut self,
        precursor: &CommitId,
        successors: &[CommitId],
        operation: Option<&str>,
    ) {
        assert_ne!(
            precursor,
            self.base_repo.store.root_commit_id(),
            "cannot obsolete the root commit"
        );
        assert!(
            !successors.contains(precursor),
            "obsolescence marker cycle: {precursor:?}"
        );
        self.pending_markers.push(ObsoleteMarker {
            precursor: precursor.clone(),
            successors: successors.to_vec(),
            operation: operation.map(|operation| operation.to_string()),
        });
        self.evolution = None;
    }

    /// Drops inhibition marks from `ids`, letting the commits hide again.
    ///
    /// Without an inhibition tracker this is a no-op. Inside an
    /// [`crate::obsolete::InhibitOverride`] scope the marks are removed
    /// immediately; otherwise removal is deferred to transaction commit,
    /// where it runs before the closing re-inhibit pass.
    pub fn deinhibit(&mut self, ids: &[CommitId]) {
        match &self.base_repo.inhibition {
            None => {
                tracing::debug!("inhibition not active, ignoring deinhibit");
                return;
            }
            Some(tracker) if tracker.override_active() => tracker.deinhibit(ids),
            Some(_) => self.pending_deinhibits.extend(ids.iter().cloned()),
        }
        self.evolution = None;
    }

    pub(crate) fn record_bookmark_move(&mut self, bookmark_move: BookmarkMove) {
        self.bookmark_moves.push(bookmark_move);
    }

    pub fn bookmark_moves(&self) -> &[BookmarkMove] {
        &self.bookmark_moves
    }

    /// Evolution state as of the pending changes, recalculated after each
    /// mutation.
    pub fn evolution(&mut self) -> BackendResult<&Evolution> {
        if self.evolution.is_none() {
            let mut markers = self.base_repo.obsolete_store.snapshot();
            markers.extend(self.pending_markers.iter().cloned());
            let inhibited = match &self.base_repo.inhibition {
                Some(tracker) => tracker.snapshot(),
                None => HashSet::new(),
            };
            self.evolution = Some(Evolution::calculate(
                &self.base_repo.store,
                &self.view,
                &markers,
                &inhibited,
            )?);
        }
        Ok(self.evolution.as_ref().unwrap())
    }

    pub(crate) fn into_parts(self) -> (View, Vec<ObsoleteMarker>, Vec<CommitId>) {
        (self.view, self.pending_markers, self.pending_deinhibits)
    }
}

impl Repo for MutableRepo {
    fn store(&self) -> &Arc<Store> {
        &self.base_repo.store
    }

    fn view(&self) -> &View {
        &self.view
    }

    fn inhibition(&self) -> Option<&Arc<InhibitionTracker>> {
        self.base_repo.inhibition.as_ref()
    }
}
