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

use std::sync::Arc;

use crate::backend::BackendResult;
use crate::evolution::Evolution;
use crate::repo::{MutableRepo, ReadonlyRepo, Repo};

/// A set of changes to the repository that is published atomically by
/// [`Transaction::commit`] and abandoned when dropped without committing.
///
/// Commits written through the transaction's store survive a rollback as
/// unreferenced objects; the view, obsolescence markers and bookmark
/// moves do not.
pub struct Transaction {
    repo: Option<MutableRepo>,
    description: String,
}

impl Transaction {
    pub(crate) fn new(base: &Arc<ReadonlyRepo>, description: &str) -> Transaction {
        Transaction {
            repo: Some(MutableRepo::new(base)),
            description: description.to_string(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn repo(&self) -> &MutableRepo {
        self.repo.as_ref().unwrap()
    }

    pub fn repo_mut(&mut self) -> &mut MutableRepo {
        self.repo.as_mut().unwrap()
    }

    /// Publishes the pending changes and returns the repository snapshot
    /// containing them.
    ///
    /// Markers recorded in the transaction are appended to the shared
    /// marker log, then deferred deinhibits are applied. Unless an
    /// inhibit-override scope is active, commits that are obsolete but
    /// still visible in the new view are then (re-)inhibited, so their
    /// visibility no longer depends on what keeps them alive today.
    pub fn commit(mut self) -> BackendResult<Arc<ReadonlyRepo>> {
        let mut_repo = self.repo.take().unwrap();
        let base_repo = mut_repo.base_repo().clone();
        let bookmark_move_count = mut_repo.bookmark_moves().len();
        let (view, markers, deinhibits) = mut_repo.into_parts();
        let marker_count = markers.len();

        base_repo.obsolete_store().add_markers(markers);
        if let Some(tracker) = base_repo.inhibition() {
            tracker.deinhibit(&deinhibits);
            if !tracker.override_active() {
                let all_markers = base_repo.obsolete_store().snapshot();
                let inhibited = tracker.snapshot();
                let evolution =
                    Evolution::calculate(base_repo.store(), &view, &all_markers, &inhibited)?;
                tracker.inhibit(&evolution.visible_obsolete());
            }
        }
        tracing::debug!(
            description = self.description,
            markers = marker_count,
            bookmark_moves = bookmark_move_count,
            "committed transaction"
        );
        Ok(ReadonlyRepo::successor(&base_repo, view))
    }

    /// Abandons the transaction without logging a rollback.
    pub fn discard(mut self) {
        self.repo = None;
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.repo.is_some() {
            tracing::debug!(description = self.description, "rolled back transaction");
        }
    }
}
