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
use std::io;
use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;

use crate::backend::{BackendError, BackendResult, CommitId, ManifestEntry, Timestamp};
use crate::bookmarks::BookmarksUpdater;
use crate::commit::{Commit, BRANCH_EXTRA_KEY, DEFAULT_BRANCH};
use crate::commit_builder::CommitBuilder;
use crate::copies::path_copies;
use crate::repo::{ReadonlyRepo, Repo};
use crate::repo_path::RepoPathBuf;
use crate::settings::UserSettings;

/// Interactive hook for finalizing a rewritten commit's description.
pub trait DescriptionEditor {
    fn edit_description(&self, draft: &str) -> io::Result<String>;
}

/// Caller-supplied overrides for the commit produced by [`rewrite`]. Any
/// field left unset falls back to the corresponding value from the commit
/// being rewritten.
#[derive(Default)]
pub struct CommitOptions<'a> {
    pub message: Option<String>,
    pub user: Option<String>,
    pub date: Option<Timestamp>,
    pub extra: Option<BTreeMap<String, String>>,
    pub editor: Option<&'a dyn DescriptionEditor>,
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("cannot amend merge changesets")]
    MergeChangeset,
    #[error("failed to edit commit description")]
    EditDescription(#[from] io::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Outcome of a [`rewrite`]: the repository snapshot containing the new
/// commit, the commit itself, and whether the store had to create it.
/// `created` is false when the rewrite reproduced an existing commit
/// byte for byte.
#[derive(Debug)]
pub struct Rewritten {
    pub repo: Arc<ReadonlyRepo>,
    pub new_commit: Commit,
    pub created: bool,
}

/// Commits a single new version of `old` that folds in the changes from
/// `updates`, parented on `new_parents`.
///
/// `head` is the fully resolved state after all updates: retained files
/// take their content from it, and its branch wins. Bookmarks on `old`
/// and on any of the updates move to the new commit in the same
/// transaction. On any failure nothing is published.
///
/// Obsolescence is the caller's concern: whether `old` and the updates
/// should be marked obsolete depends on the command semantics, so no
/// markers are recorded here.
#[instrument(skip_all, fields(old = %old.id().hex()))]
pub fn rewrite(
    repo: &Arc<ReadonlyRepo>,
    settings: &UserSettings,
    old: &Commit,
    updates: &[Commit],
    head: &Commit,
    new_parents: Vec<CommitId>,
    options: &CommitOptions,
) -> Result<Rewritten, RewriteError> {
    if old.parent_ids().len() > 1 {
        return Err(RewriteError::MergeChangeset);
    }
    let _wlock = repo.lock_working_copy();
    let _lock = repo.lock_store();
    let mut tx = repo.start_transaction("rewrite");

    let base = match old.parent_ids().first() {
        Some(parent_id) => repo.store().get_commit(parent_id)?,
        None => repo.store().root_commit(),
    };
    let mut old_ids = vec![old.id().clone()];
    old_ids.extend(updates.iter().map(|update| update.id().clone()));
    let bookmarks_updater = BookmarksUpdater::new(tx.repo().view(), &old_ids);

    let mut files: BTreeSet<RepoPathBuf> = old.changed_files()?;
    for update in updates {
        files.extend(update.changed_files()?);
    }

    // Recompute copies between base and head so that a rename reverted
    // within the range leaves no provenance behind.
    let copied = path_copies(&base, head)?;

    // Drop paths the range as a whole did not touch: identical content
    // and flags on both sides, or absent from both.
    let base_manifest = base.manifest()?;
    let head_manifest = head.manifest()?;
    files.retain(
        |path| match (base_manifest.get(path), head_manifest.get(path)) {
            (None, None) => false,
            (Some(base_entry), Some(head_entry)) => {
                base_entry.file != head_entry.file || base_entry.flags != head_entry.flags
            }
            _ => true,
        },
    );

    let mut description = match &options.message {
        Some(message) => message.clone(),
        None => old.description().to_string(),
    };
    if let Some(editor) = options.editor {
        description = editor.edit_description(&description)?;
    }

    let mut extra = old.extra().clone();
    if let Some(overrides) = &options.extra {
        extra.extend(overrides.clone());
    }
    // The default branch is stored implicitly, so forcing head's branch
    // must not leave an explicit "default" entry behind.
    if head.branch() == DEFAULT_BRANCH {
        extra.remove(BRANCH_EXTRA_KEY);
    } else {
        extra.insert(BRANCH_EXTRA_KEY.to_string(), head.branch().to_string());
    }

    let source_fn = {
        let head_manifest = head_manifest.clone();
        move |path: &RepoPathBuf| -> BackendResult<Option<ManifestEntry>> {
            Ok(head_manifest.get(path).map(|entry| ManifestEntry {
                file: entry.file.clone(),
                flags: entry.flags,
                copy_source: copied.get(path).cloned(),
            }))
        }
    };

    let mut builder = CommitBuilder::for_rewrite_from(settings, repo.store(), old)
        .set_parents(new_parents)
        .set_changed_files(files.into_iter().collect(), Box::new(source_fn))
        .set_description(description)
        .set_extra(extra);
    if let Some(user) = &options.user {
        builder = builder.set_author(user.clone());
    }
    if let Some(date) = options.date {
        builder = builder.set_timestamp(date);
    }

    let (new_commit, created) = builder.write_to_repo(tx.repo_mut())?;
    bookmarks_updater.apply(tx.repo_mut(), new_commit.id());
    let repo = tx.commit()?;
    tracing::debug!(new = %new_commit.id().hex(), created, "rewrote commit");
    Ok(Rewritten {
        repo,
        new_commit,
        created,
    })
}
