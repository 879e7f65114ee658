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

use crate::backend::CommitId;
use crate::repo::MutableRepo;
use crate::view::View;

/// Record of bookmarks retargeted together inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkMove {
    pub names: Vec<String>,
    pub new_target: CommitId,
}

/// Retargets bookmarks from rewritten commits to their replacements.
///
/// The affected bookmark names are captured when the updater is created,
/// so a rewrite can decide up front which bookmarks follow it and apply
/// the move once the replacement commit exists.
pub struct BookmarksUpdater {
    names: Vec<String>,
}

impl BookmarksUpdater {
    pub fn new(view: &View, old_ids: &[CommitId]) -> Self {
        let old_ids: HashSet<&CommitId> = old_ids.iter().collect();
        let names = view
            .bookmarks()
            .iter()
            .filter(|(_, target)| old_ids.contains(target))
            .map(|(name, _)| name.clone())
            .collect();
        BookmarksUpdater { names }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Points every captured bookmark at `new_target`. A call that moves
    /// at least one bookmark is logged as a single move.
    pub fn apply(&self, mut_repo: &mut MutableRepo, new_target: &CommitId) {
        if self.names.is_empty() {
            return;
        }
        for name in &self.names {
            mut_repo.set_bookmark(name.clone(), new_target.clone());
        }
        tracing::debug!(
            bookmarks = ?self.names,
            to = %new_target.hex(),
            "retargeted bookmarks"
        );
        mut_repo.record_bookmark_move(BookmarkMove {
            names: self.names.clone(),
            new_target: new_target.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(hex: &str) -> CommitId {
        CommitId::from_hex(hex)
    }

    #[test]
    fn test_captures_bookmarks_on_old_commits() {
        let mut view = View::new(id("00"));
        view.set_bookmark("feature".to_string(), id("0a"));
        view.set_bookmark("other".to_string(), id("0b"));
        view.set_bookmark("stale".to_string(), id("0a"));
        let updater = BookmarksUpdater::new(&view, &[id("0a")]);
        assert_eq!(updater.names(), ["feature", "stale"]);
    }

    #[test]
    fn test_captures_across_several_olds() {
        let mut view = View::new(id("00"));
        view.set_bookmark("one".to_string(), id("0a"));
        view.set_bookmark("two".to_string(), id("0b"));
        view.set_bookmark("three".to_string(), id("0c"));
        let updater = BookmarksUpdater::new(&view, &[id("0a"), id("0b")]);
        assert_eq!(updater.names(), ["one", "two"]);
    }

    #[test]
    fn test_empty_when_nothing_points_at_olds() {
        let mut view = View::new(id("00"));
        view.set_bookmark("main".to_string(), id("0b"));
        let updater = BookmarksUpdater::new(&view, &[id("0a")]);
        assert!(updater.is_empty());
    }
}
