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

use std::collections::{BTreeMap, HashSet};

use crate::backend::CommitId;

/// The visible state of a repository snapshot: anonymous heads plus named
/// bookmarks.
///
/// Heads accumulate; a head made obsolete by a rewrite stays in the set so
/// the old history remains reachable for ancestry walks even once it is
/// hidden from default views.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct View {
    head_ids: HashSet<CommitId>,
    bookmarks: BTreeMap<String, CommitId>,
}

impl View {
    pub fn new(root_commit_id: CommitId) -> Self {
        View {
            head_ids: HashSet::from([root_commit_id]),
            bookmarks: BTreeMap::new(),
        }
    }

    pub fn heads(&self) -> &HashSet<CommitId> {
        &self.head_ids
    }

    pub fn add_head(&mut self, head_id: &CommitId, parent_ids: &[CommitId]) {
        self.head_ids.insert(head_id.clone());
        for parent_id in parent_ids {
            self.head_ids.remove(parent_id);
        }
    }

    /// Bookmark name to target id. A name maps to exactly one id; a removed
    /// name is simply absent.
    pub fn bookmarks(&self) -> &BTreeMap<String, CommitId> {
        &self.bookmarks
    }

    pub fn get_bookmark(&self, name: &str) -> Option<&CommitId> {
        self.bookmarks.get(name)
    }

    pub fn set_bookmark(&mut self, name: String, target: CommitId) {
        self.bookmarks.insert(name, target);
    }

    pub fn remove_bookmark(&mut self, name: &str) {
        self.bookmarks.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_head_replaces_parent() {
        let root = CommitId::from_hex("000000");
        let mut view = View::new(root.clone());
        let a = CommitId::from_hex("aaa111");
        let b = CommitId::from_hex("bbb222");
        view.add_head(&a, std::slice::from_ref(&root));
        assert_eq!(view.heads(), &HashSet::from([a.clone()]));
        // A sibling head keeps the existing one.
        view.add_head(&b, std::slice::from_ref(&root));
        assert_eq!(view.heads(), &HashSet::from([a, b]));
    }

    #[test]
    fn test_bookmark_removal_leaves_no_trace() {
        let mut view = View::new(CommitId::from_hex("000000"));
        view.set_bookmark("feature".to_string(), CommitId::from_hex("aaa111"));
        assert!(view.get_bookmark("feature").is_some());
        view.remove_bookmark("feature");
        assert!(view.get_bookmark("feature").is_none());
        assert!(view.bookmarks().is_empty());
    }
}
