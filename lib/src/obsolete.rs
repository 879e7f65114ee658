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
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::backend::CommitId;

/// Records that `precursor` was superseded by `successors`. An empty
/// successor list means the commit was pruned.
///
/// The `operation` tag names the command that recorded the marker, for
/// provenance display.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ObsoleteMarker {
    pub precursor: CommitId,
    pub successors: Vec<CommitId>,
    pub operation: Option<String>,
}

/// Append-only log of obsolescence markers, shared by every snapshot of a
/// repository. Markers are never edited or removed; new information is
/// expressed by appending more markers.
#[derive(Debug, Default)]
pub struct ObsoleteStore {
    markers: RwLock<Vec<ObsoleteMarker>>,
}

impl ObsoleteStore {
    pub fn add_markers(&self, markers: Vec<ObsoleteMarker>) {
        self.markers.write().unwrap().extend(markers);
    }

    pub fn snapshot(&self) -> Vec<ObsoleteMarker> {
        self.markers.read().unwrap().clone()
    }
}

/// The optional visibility-inhibition subsystem: a transient set of
/// obsolete commits that must not be hidden yet.
///
/// Repositories carry `Option<Arc<InhibitionTracker>>`; when absent, every
/// inhibition operation is a no-op. The set lives for the process, not in
/// storage, because it only bridges the windows inside multi-step
/// rewrites.
#[derive(Debug, Default)]
pub struct InhibitionTracker {
    inhibited: RwLock<HashSet<CommitId>>,
    override_depth: AtomicUsize,
}

impl InhibitionTracker {
    pub fn inhibit(&self, ids: &[CommitId]) {
        self.inhibited.write().unwrap().extend(ids.iter().cloned());
    }

    pub fn deinhibit(&self, ids: &[CommitId]) {
        let mut inhibited = self.inhibited.write().unwrap();
        for id in ids {
            inhibited.remove(id);
        }
    }

    pub fn is_inhibited(&self, id: &CommitId) -> bool {
        self.inhibited.read().unwrap().contains(id)
    }

    pub fn snapshot(&self) -> HashSet<CommitId> {
        self.inhibited.read().unwrap().clone()
    }

    /// While active, deinhibit calls take effect immediately instead of
    /// being deferred to transaction close, and the close-time re-inhibit
    /// pass is skipped.
    pub fn override_active(&self) -> bool {
        self.override_depth.load(Ordering::SeqCst) > 0
    }
}

/// Scoped enablement of the inhibit override. The override stays active
/// for the guard's lifetime and is restored on drop, on success and error
/// paths alike.
#[derive(Debug)]
pub struct InhibitOverride<'a> {
    tracker: &'a InhibitionTracker,
}

impl<'a> InhibitOverride<'a> {
    pub fn new(tracker: &'a InhibitionTracker) -> Self {
        tracker.override_depth.fetch_add(1, Ordering::SeqCst);
        InhibitOverride { tracker }
    }
}

impl Drop for InhibitOverride<'_> {
    fn drop(&mut self) {
        self.tracker.override_depth.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_isolated() {
        let store = ObsoleteStore::default();
        store.add_markers(vec![ObsoleteMarker {
            precursor: CommitId::from_hex("aaa111"),
            successors: vec![CommitId::from_hex("bbb222")],
            operation: Some("amend".to_string()),
        }]);
        let snapshot = store.snapshot();
        store.add_markers(vec![ObsoleteMarker {
            precursor: CommitId::from_hex("ccc333"),
            successors: vec![],
            operation: None,
        }]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_inhibit_deinhibit() {
        let tracker = InhibitionTracker::default();
        let a = CommitId::from_hex("aaa111");
        let b = CommitId::from_hex("bbb222");
        tracker.inhibit(&[a.clone(), b.clone()]);
        assert!(tracker.is_inhibited(&a));
        tracker.deinhibit(std::slice::from_ref(&a));
        assert!(!tracker.is_inhibited(&a));
        assert!(tracker.is_inhibited(&b));
        // Deinhibiting an unknown id is fine.
        tracker.deinhibit(&[CommitId::from_hex("ddd444")]);
    }

    #[test]
    fn test_override_scopes_nest() {
        let tracker = InhibitionTracker::default();
        assert!(!tracker.override_active());
        {
            let _outer = InhibitOverride::new(&tracker);
            assert!(tracker.override_active());
            {
                let _inner = InhibitOverride::new(&tracker);
                assert!(tracker.override_active());
            }
            assert!(tracker.override_active());
        }
        assert!(!tracker.override_active());
    }
}
