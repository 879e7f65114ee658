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

use maplit::hashset;
use restack_lib::commit_builder::CommitBuilder;
use restack_lib::obsolete::InhibitOverride;
use restack_lib::repo::Repo;
use testutils::{write_commit_with_files, write_random_commit, TestRepo};

#[test]
fn test_commit_publishes_view_and_markers() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init();
    let repo0 = test_repo.repo.clone();
    let root_id = repo0.store().root_commit_id().clone();
    // Calculated now so markers recorded below cannot leak into this
    // snapshot's lazily-initialized evolution.
    assert!(!repo0.evolution().unwrap().is_obsolete(&root_id));

    let mut tx = repo0.start_transaction("first");
    let a = write_random_commit(tx.repo_mut(), &settings);
    tx.repo_mut().set_bookmark("book".to_string(), a.id().clone());
    let repo1 = tx.commit().unwrap();

    assert!(repo1.view().heads().contains(a.id()));
    assert_eq!(repo1.view().get_bookmark("book"), Some(a.id()));
    // The base snapshot is unaffected.
    assert_eq!(repo0.view().heads(), &hashset! {root_id});
    assert!(repo0.view().bookmarks().is_empty());

    let mut tx = repo1.start_transaction("second");
    let (a2, _created) = CommitBuilder::for_rewrite_from(&settings, repo1.store(), &a)
        .set_description("a amended".to_string())
        .write_to_repo(tx.repo_mut())
        .unwrap();
    tx.repo_mut()
        .record_obsolete(a.id(), std::slice::from_ref(a2.id()), Some("amend"));
    let repo2 = tx.commit().unwrap();

    let markers = repo2.obsolete_store().snapshot();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].precursor, *a.id());
    assert_eq!(markers[0].successors, [a2.id().clone()]);
    assert_eq!(markers[0].operation.as_deref(), Some("amend"));
    assert!(repo2.evolution().unwrap().is_obsolete(a.id()));
    // The pinned snapshot still answers from before the marker existed.
    assert!(!repo0.evolution().unwrap().is_obsolete(a.id()));
}

#[test]
fn test_drop_rolls_back() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init();
    let repo = &test_repo.repo;

    let commit_id;
    {
        let mut tx = repo.start_transaction("abandoned");
        let a = write_random_commit(tx.repo_mut(), &settings);
        tx.repo_mut().set_bookmark("book".to_string(), a.id().clone());
        tx.repo_mut().record_obsolete(a.id(), &[], Some("prune"));
        commit_id = a.id().clone();
    }

    assert!(!repo.view().heads().contains(&commit_id));
    assert!(repo.view().bookmarks().is_empty());
    assert!(repo.obsolete_store().snapshot().is_empty());
    // The commit object itself survives in the store, unreferenced.
    assert!(repo.store().get_commit(&commit_id).is_ok());
}

#[test]
fn test_discard_abandons_changes() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init();
    let repo = &test_repo.repo;

    let mut tx = repo.start_transaction("discarded");
    let a = write_random_commit(tx.repo_mut(), &settings);
    let commit_id = a.id().clone();
    tx.discard();

    assert!(!repo.view().heads().contains(&commit_id));
}

#[test]
fn test_deferred_deinhibit_applies_at_commit() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init();
    let repo = &test_repo.repo;
    let tracker = repo.inhibition().unwrap().clone();

    let mut tx = repo.start_transaction("setup");
    let a = write_commit_with_files(tx.repo_mut(), &settings, &[], &[("a", "1")]);
    tx.repo_mut().set_bookmark("pin".to_string(), a.id().clone());
    let repo = tx.commit().unwrap();

    let mut tx = repo.start_transaction("amend");
    let (a2, _created) = CommitBuilder::for_rewrite_from(&settings, repo.store(), &a)
        .set_description("a amended".to_string())
        .write_to_repo(tx.repo_mut())
        .unwrap();
    tx.repo_mut()
        .record_obsolete(a.id(), std::slice::from_ref(a2.id()), Some("amend"));
    let repo = tx.commit().unwrap();
    // The bookmark kept the precursor visible, so the transaction close
    // inhibited it.
    assert!(tracker.is_inhibited(a.id()));

    let mut tx = repo.start_transaction("unpin");
    tx.repo_mut().remove_bookmark("pin");
    tx.repo_mut().deinhibit(std::slice::from_ref(a.id()));
    // Removal is deferred while the transaction is open.
    assert!(tracker.is_inhibited(a.id()));
    let repo = tx.commit().unwrap();

    assert!(!tracker.is_inhibited(a.id()));
    assert!(repo.evolution().unwrap().is_hidden(a.id()));
}

#[test]
fn test_deinhibit_is_immediate_under_override() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init();
    let repo = &test_repo.repo;
    let tracker = repo.inhibition().unwrap().clone();

    let mut tx = repo.start_transaction("setup");
    let a = write_commit_with_files(tx.repo_mut(), &settings, &[], &[("a", "1")]);
    tx.repo_mut().set_bookmark("pin".to_string(), a.id().clone());
    let repo = tx.commit().unwrap();

    let mut tx = repo.start_transaction("amend");
    let (_a2, _created) = CommitBuilder::for_rewrite_from(&settings, repo.store(), &a)
        .set_description("a amended".to_string())
        .write_to_repo(tx.repo_mut())
        .unwrap();
    tx.repo_mut().record_obsolete(a.id(), &[], Some("amend"));
    let repo = tx.commit().unwrap();
    assert!(tracker.is_inhibited(a.id()));

    let mut tx = repo.start_transaction("unpin");
    tx.repo_mut().remove_bookmark("pin");
    let repo = {
        let _guard = InhibitOverride::new(&tracker);
        tx.repo_mut().deinhibit(std::slice::from_ref(a.id()));
        // Immediate effect inside the override scope.
        assert!(!tracker.is_inhibited(a.id()));
        tx.commit().unwrap()
    };

    assert!(!tracker.override_active());
    // The closing re-inhibit pass was skipped, so nothing re-protected
    // the commit and it hides.
    assert!(repo.evolution().unwrap().is_hidden(a.id()));
    assert!(tracker.snapshot().is_empty());
}

#[test]
fn test_without_inhibition_subsystem() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init_without_inhibition();
    let repo = &test_repo.repo;
    assert!(repo.inhibition().is_none());

    let mut tx = repo.start_transaction("setup");
    let a = write_commit_with_files(tx.repo_mut(), &settings, &[], &[("a", "1")]);
    tx.repo_mut().set_bookmark("pin".to_string(), a.id().clone());
    let repo = tx.commit().unwrap();

    let mut tx = repo.start_transaction("amend");
    let (a2, _created) = CommitBuilder::for_rewrite_from(&settings, repo.store(), &a)
        .set_description("a amended".to_string())
        .write_to_repo(tx.repo_mut())
        .unwrap();
    tx.repo_mut()
        .record_obsolete(a.id(), std::slice::from_ref(a2.id()), Some("amend"));
    let repo = tx.commit().unwrap();
    // The bookmark alone keeps the precursor visible.
    assert!(repo.evolution().unwrap().is_visible(a.id()));

    let mut tx = repo.start_transaction("unpin");
    tx.repo_mut().remove_bookmark("pin");
    // A no-op without the subsystem.
    tx.repo_mut().deinhibit(std::slice::from_ref(a.id()));
    let repo = tx.commit().unwrap();
    assert!(repo.evolution().unwrap().is_hidden(a.id()));
}

#[test]
fn test_mut_repo_evolution_sees_pending_markers() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init();
    let repo = &test_repo.repo;

    let mut tx = repo.start_transaction("setup");
    let a = write_random_commit(tx.repo_mut(), &settings);
    let repo = tx.commit().unwrap();

    let mut tx = repo.start_transaction("prune");
    tx.repo_mut().record_obsolete(a.id(), &[], Some("prune"));
    assert!(tx.repo_mut().evolution().unwrap().is_obsolete(a.id()));
    // The base snapshot does not see the pending marker.
    assert!(!repo.evolution().unwrap().is_obsolete(a.id()));
    tx.discard();
}

#[test]
#[should_panic(expected = "cannot obsolete the root commit")]
fn test_record_obsolete_root_panics() {
    let test_repo = TestRepo::init();
    let repo = &test_repo.repo;
    let root_id = repo.store().root_commit_id().clone();

    let mut tx = repo.start_transaction("bad");
    tx.repo_mut().record_obsolete(&root_id, &[], None);
}

#[test]
#[should_panic(expected = "obsolescence marker cycle")]
fn test_record_obsolete_self_cycle_panics() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init();
    let repo = &test_repo.repo;

    let mut tx = repo.start_transaction("setup");
    let a = write_random_commit(tx.repo_mut(), &settings);
    tx.repo_mut()
        .record_obsolete(a.id(), std::slice::from_ref(a.id()), None);
}
