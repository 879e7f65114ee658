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

//! Derived graph state: which commits are obsolete, which are hidden, and
//! the ancestry/descendant/successor queries the rewriting layers need.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use itertools::Itertools;

use crate::backend::{BackendResult, CommitId};
use crate::dag_walk;
use crate::obsolete::ObsoleteMarker;
use crate::store::Store;
use crate::view::View;

/// Snapshot of the evolution state of a repository: the reachable commit
/// graph joined with the obsolescence-marker graph and the transient
/// inhibition set.
///
/// A commit is *obsolete* when any marker names it as precursor (including
/// prune markers with no successors). An obsolete commit is *hidden*
/// unless something keeps it visible: an inhibition mark, a bookmark, or a
/// visible descendant that still needs it as an ancestor.
#[derive(Debug, Clone)]
pub struct Evolution {
    parents: HashMap<CommitId, Vec<CommitId>>,
    children: HashMap<CommitId, HashSet<CommitId>>,
    positions: HashMap<CommitId, u64>,
    successors: HashMap<CommitId, Vec<CommitId>>,
    precursors: HashMap<CommitId, Vec<CommitId>>,
    obsolete: HashSet<CommitId>,
    hidden: HashSet<CommitId>,
}

impl Evolution {
    /// Walks the commit graph from the view's heads and joins it with the
    /// marker graph and the inhibition snapshot.
    pub fn calculate(
        store: &Arc<Store>,
        view: &View,
        markers: &[ObsoleteMarker],
        inhibited: &HashSet<CommitId>,
    ) -> BackendResult<Evolution> {
        let mut parents: HashMap<CommitId, Vec<CommitId>> = HashMap::new();
        let mut work: Vec<CommitId> = view.heads().iter().cloned().collect();
        while let Some(id) = work.pop() {
            if parents.contains_key(&id) {
                continue;
            }
            let commit = store.get_commit(&id)?;
            let parent_ids = commit.parent_ids().to_vec();
            for parent_id in &parent_ids {
                if !parents.contains_key(parent_id) {
                    work.push(parent_id.clone());
                }
            }
            parents.insert(id, parent_ids);
        }
        let positions = parents
            .keys()
            .map(|id| (id.clone(), store.position(id).unwrap_or(0)))
            .collect();
        let bookmark_targets = view.bookmarks().values().cloned().collect();
        Ok(Self::from_graph(
            parents,
            positions,
            &bookmark_targets,
            markers,
            inhibited,
        ))
    }

    fn from_graph(
        parents: HashMap<CommitId, Vec<CommitId>>,
        positions: HashMap<CommitId, u64>,
        bookmark_targets: &HashSet<CommitId>,
        markers: &[ObsoleteMarker],
        inhibited: &HashSet<CommitId>,
    ) -> Evolution {
        let mut children: HashMap<CommitId, HashSet<CommitId>> = HashMap::new();
        for id in parents.keys() {
            children.entry(id.clone()).or_default();
        }
        for (id, parent_ids) in &parents {
            for parent_id in parent_ids {
                children
                    .entry(parent_id.clone())
                    .or_default()
                    .insert(id.clone());
            }
        }

        let mut successors: HashMap<CommitId, Vec<CommitId>> = HashMap::new();
        let mut precursors: HashMap<CommitId, Vec<CommitId>> = HashMap::new();
        let mut obsolete: HashSet<CommitId> = HashSet::new();
        for marker in markers {
            obsolete.insert(marker.precursor.clone());
            let entry = successors.entry(marker.precursor.clone()).or_default();
            for successor in &marker.successors {
                entry.push(successor.clone());
                precursors
                    .entry(successor.clone())
                    .or_default()
                    .push(marker.precursor.clone());
            }
        }

        // Hidden = hideable commits whose entire visible future is gone.
        // Keeping a commit keeps all of its ancestors, so an obsolete
        // commit with an unstabilized descendant stays visible until the
        // descendant has been restacked away from it.
        let graph_heads: Vec<CommitId> = parents
            .keys()
            .filter(|id| children.get(*id).is_some_and(|c| c.is_empty()))
            .cloned()
            .collect();
        let order = dag_walk::topo_order_reverse(
            graph_heads,
            |id: &CommitId| id.clone(),
            |id: &CommitId| parents.get(id).cloned().unwrap_or_default(),
        );
        let mut kept: HashSet<CommitId> = HashSet::new();
        for id in &order {
            let hideable = obsolete.contains(id) && !inhibited.contains(id);
            if !hideable || bookmark_targets.contains(id) || kept.contains(id) {
                kept.insert(id.clone());
                for parent_id in parents.get(id).into_iter().flatten() {
                    kept.insert(parent_id.clone());
                }
            }
        }
        let hidden = parents
            .keys()
            .filter(|id| !kept.contains(*id))
            .cloned()
            .collect();

        Evolution {
            parents,
            children,
            positions,
            successors,
            precursors,
            obsolete,
            hidden,
        }
    }

    /// Named as precursor by at least one marker.
    pub fn is_obsolete(&self, id: &CommitId) -> bool {
        self.obsolete.contains(id)
    }

    /// Reachable from a head but filtered from view.
    pub fn is_hidden(&self, id: &CommitId) -> bool {
        self.hidden.contains(id)
    }

    /// Reachable from a head and not hidden.
    pub fn is_visible(&self, id: &CommitId) -> bool {
        self.parents.contains_key(id) && !self.hidden.contains(id)
    }

    /// Obsolete commits that are still visible (suspended or inhibited).
    pub fn visible_obsolete(&self) -> Vec<CommitId> {
        self.obsolete
            .iter()
            .filter(|id| self.is_visible(id))
            .cloned()
            .collect()
    }

    /// The most recently created visible commit reachable from `rev` over
    /// successor edges, or `rev` itself when every successor is hidden or
    /// pruned away.
    pub fn latest_successor(&self, rev: &CommitId) -> CommitId {
        let mut seen: HashSet<CommitId> = HashSet::from([rev.clone()]);
        let mut work: Vec<CommitId> = self.successors.get(rev).cloned().unwrap_or_default();
        let mut candidates: Vec<CommitId> = vec![];
        while let Some(id) = work.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            for next in self.successors.get(&id).into_iter().flatten() {
                work.push(next.clone());
            }
            if self.is_visible(&id) {
                candidates.push(id);
            }
        }
        candidates
            .into_iter()
            .max_by_key(|id| self.positions.get(id).copied().unwrap_or(0))
            .unwrap_or_else(|| rev.clone())
    }

    /// Transitive marker precursors of `rev`, including `rev` itself.
    pub fn all_precursors(&self, rev: &CommitId) -> HashSet<CommitId> {
        dag_walk::dfs(
            vec![rev.clone()],
            |id: &CommitId| id.clone(),
            |id: &CommitId| self.precursors.get(id).cloned().unwrap_or_default(),
        )
        .collect()
    }

    /// Visible commits descending from `revs` (directly with
    /// `children_only`, else transitively), excluding `revs` themselves,
    /// ordered by creation.
    pub fn visible_descendants(&self, revs: &HashSet<CommitId>, children_only: bool) -> Vec<CommitId> {
        let mut result: HashSet<CommitId> = HashSet::new();
        if children_only {
            for rev in revs {
                for child in self.children.get(rev).into_iter().flatten() {
                    if !revs.contains(child) && self.is_visible(child) {
                        result.insert(child.clone());
                    }
                }
            }
        } else {
            // A hidden commit cannot have visible descendants, so the walk
            // only needs to continue through visible children.
            let mut work: Vec<CommitId> = revs.iter().cloned().collect();
            let mut seen: HashSet<CommitId> = work.iter().cloned().collect();
            while let Some(id) = work.pop() {
                for child in self.children.get(&id).into_iter().flatten() {
                    if seen.insert(child.clone()) && self.is_visible(child) {
                        if !revs.contains(child) {
                            result.insert(child.clone());
                        }
                        work.push(child.clone());
                    }
                }
            }
        }
        result
            .into_iter()
            .sorted_by_key(|id| self.positions.get(id).copied().unwrap_or(0))
            .collect()
    }

    /// For the sub-DAG of `revs` and their visible descendants, maps each
    /// member to its direct children within the sub-DAG. Computed once so
    /// callers can look up children without re-walking descendants.
    pub fn child_relationships(
        &self,
        revs: &[CommitId],
    ) -> HashMap<CommitId, HashSet<CommitId>> {
        let mut members: HashSet<CommitId> = revs.iter().cloned().collect();
        let descendants = self.visible_descendants(&members, false);
        members.extend(descendants);
        let mut map: HashMap<CommitId, HashSet<CommitId>> = HashMap::new();
        for member in &members {
            map.entry(member.clone()).or_default();
        }
        for member in &members {
            for parent_id in self.parents.get(member).into_iter().flatten() {
                if members.contains(parent_id) {
                    map.get_mut(parent_id).unwrap().insert(member.clone());
                }
            }
        }
        map
    }

    /// Ancestors of `heads` (inclusive) that are not ancestors of
    /// `excluded_head` (inclusive), ordered by creation.
    pub fn only(&self, heads: &HashSet<CommitId>, excluded_head: &CommitId) -> Vec<CommitId> {
        let included = self.ancestors(heads.iter().cloned());
        let excluded = self.ancestors(std::iter::once(excluded_head.clone()));
        included
            .difference(&excluded)
            .cloned()
            .sorted_by_key(|id| self.positions.get(id).copied().unwrap_or(0))
            .collect()
    }

    fn ancestors(&self, start: impl IntoIterator<Item = CommitId>) -> HashSet<CommitId> {
        dag_walk::dfs(
            start,
            |id: &CommitId| id.clone(),
            |id: &CommitId| self.parents.get(id).cloned().unwrap_or_default(),
        )
        .collect()
    }
}
