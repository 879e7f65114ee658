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
use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use crate::backend::{BackendError, CommitId};
use crate::obsolete::InhibitOverride;
use crate::repo::{MutableRepo, ReadonlyRepo, Repo};
use crate::settings::UserSettings;
use crate::transaction::Transaction;

/// Operation tag recorded on markers for restacked commits.
pub const REBASE_OPERATION: &str = "rebase";

const PREAMEND_SUFFIX: &str = ".preamend";

/// Options for the external rebase primitive. `rev_set` and `destination`
/// are filled in by [`restack_once`]; the rest pass through from the
/// caller.
#[derive(Debug, Clone)]
pub struct RebaseOptions {
    pub rev_set: Vec<CommitId>,
    pub destination: Option<CommitId>,
    pub operation: String,
    pub merge_tool: Option<String>,
}

impl Default for RebaseOptions {
    fn default() -> Self {
        RebaseOptions {
            rev_set: vec![],
            destination: None,
            operation: REBASE_OPERATION.to_string(),
            merge_tool: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RebaseError {
    #[error("merge conflict while rebasing {}", commit_id.hex())]
    Conflict { commit_id: CommitId },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Error)]
pub enum RestackError {
    #[error(transparent)]
    Rebase(#[from] RebaseError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// The external rebase primitive: reparents every commit in
/// `options.rev_set` onto `options.destination` (or onto the rebased
/// version of its parent when that parent is in the set too).
///
/// Implementations must, per rebased commit, record an obsolescence
/// marker tagged with `options.operation` and retarget its bookmarks,
/// all against the given transaction; and must skip commits whose
/// parents end up unchanged rather than produce self-markers.
pub trait Rebaser {
    fn rebase(
        &self,
        settings: &UserSettings,
        tx: &mut Transaction,
        options: &RebaseOptions,
    ) -> Result<(), RebaseError>;
}

/// Rebases all unstabilized descendants of `rev`'s precursors onto `rev`.
///
/// With `children_only`, only direct children of the precursors move;
/// their own descendants are left for later calls. `inhibit_override`
/// opens an inhibit-override scope around the rebase and cleanup so that
/// commits obsoleted mid-transaction can hide immediately; it is closed
/// again on every exit path.
///
/// Returns the repository snapshot with the restacked commits, or the
/// unchanged input snapshot when the precursors have no descendants. A
/// rebase failure propagates unchanged and publishes nothing; the stale
/// bookmark and inhibition cleanup only runs after a successful rebase.
#[instrument(skip_all, fields(rev = %rev.hex()))]
pub fn restack_once(
    settings: &UserSettings,
    repo: &Arc<ReadonlyRepo>,
    rebaser: &dyn Rebaser,
    rev: &CommitId,
    options: &RebaseOptions,
    children_only: bool,
    inhibit_override: bool,
) -> Result<Arc<ReadonlyRepo>, RestackError> {
    let _wlock = repo.lock_working_copy();
    let _lock = repo.lock_store();

    let evolution = repo.evolution()?;
    let all_precursors = evolution.all_precursors(rev);
    let descendants = evolution.visible_descendants(&all_precursors, children_only);
    if descendants.is_empty() {
        return Ok(repo.clone());
    }
    tracing::debug!(
        precursors = all_precursors.len(),
        descendants = descendants.len(),
        "restacking"
    );

    let mut rebase_options = options.clone();
    rebase_options.rev_set = descendants;
    rebase_options.destination = Some(rev.clone());
    // Restacked commits must show up as rebased regardless of which
    // command triggered the restack.
    rebase_options.operation = REBASE_OPERATION.to_string();

    let mut tx = repo.start_transaction("restack");
    {
        let _override_guard = match repo.inhibition() {
            Some(tracker) if inhibit_override => Some(InhibitOverride::new(tracker)),
            _ => None,
        };
        rebaser.rebase(settings, &mut tx, &rebase_options)?;

        clear_preamend_bookmarks(tx.repo_mut(), &all_precursors);

        // Let the precursors hide, and with them any of their ancestors
        // no longer reachable from rev. Re-running this for each step of
        // a stacked operation is fine: a transaction close re-inhibits
        // whatever still has unstabilized descendants, and the final step
        // releases the whole stack.
        let stale = tx.repo_mut().evolution()?.only(&all_precursors, rev);
        tx.repo_mut().deinhibit(&stale);
    }
    Ok(tx.commit()?)
}

/// Deletes leftover `*.preamend` bookmarks pointing at any of `revs`.
/// Calling commands leave these behind as recovery breadcrumbs; once the
/// commits they protect have been restacked away from, they only leak.
fn clear_preamend_bookmarks(mut_repo: &mut MutableRepo, revs: &HashSet<CommitId>) {
    let stale: Vec<String> = mut_repo
        .view()
        .bookmarks()
        .iter()
        .filter(|(name, target)| name.ends_with(PREAMEND_SUFFIX) && revs.contains(*target))
        .map(|(name, _)| name.clone())
        .collect();
    for name in &stale {
        tracing::debug!(bookmark = %name, "removing stale preamend bookmark");
        mut_repo.remove_bookmark(name);
    }
}
