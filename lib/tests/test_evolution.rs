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

use maplit::{hashmap, hashset};
use pretty_assertions::assert_eq;
use restack_lib::commit_builder::CommitBuilder;
use restack_lib::repo::Repo;
use testutils::{write_commit_with_files, write_random_commit, CommitGraphBuilder, TestRepo};

#[test]
fn test_amended_stack_state() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init();
    let repo = &test_repo.repo;

    // b was amended to b2 while c still sits on b:
    //
    // c
    // b b2
    // |/
    // a
    let mut tx = repo.start_transaction("test");
    let a = write_commit_with_files(tx.repo_mut(), &settings, &[], &[("a", "1")]);
    let b = write_commit_with_files(tx.repo_mut(), &settings, &[&a], &[("b", "1")]);
    let c = write_commit_with_files(tx.repo_mut(), &settings, &[&b], &[("c", "1")]);
    let repo = tx.commit().unwrap();

    let mut tx = repo.start_transaction("amend");
    let (b2, _created) = CommitBuilder::for_rewrite_from(&settings, repo.store(), &b)
        .set_description("b amended".to_string())
        .write_to_repo(tx.repo_mut())
        .unwrap();
    tx.repo_mut()
        .record_obsolete(b.id(), std::slice::from_ref(b2.id()), Some("amend"));
    let repo = tx.commit().unwrap();

    let evolution = repo.evolution().unwrap();
    assert!(evolution.is_obsolete(b.id()));
    assert!(!evolution.is_obsolete(b2.id()));
    // c still needs b, so b is suspended rather than hidden.
    assert!(!evolution.is_hidden(b.id()));
    assert!(evolution.is_visible(b.id()));
    assert!(evolution.is_visible(c.id()));
    assert_eq!(evolution.latest_successor(b.id()), b2.id().clone());
    assert_eq!(evolution.latest_successor(c.id()), c.id().clone());
    assert_eq!(
        evolution.all_precursors(b2.id()),
        hashset! {b2.id().clone(), b.id().clone()}
    );
    assert_eq!(
        evolution.visible_descendants(&hashset! {b.id().clone(), b2.id().clone()}, false),
        [c.id().clone()]
    );
    assert_eq!(
        evolution.only(&evolution.all_precursors(b2.id()), b2.id()),
        [b.id().clone()]
    );
    assert_eq!(evolution.visible_obsolete(), [b.id().clone()]);
    // The transaction close protected the suspended commit.
    assert!(repo.inhibition().unwrap().is_inhibited(b.id()));
}

#[test]
fn test_amended_leaf_hides() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init();
    let repo = &test_repo.repo;

    let mut tx = repo.start_transaction("test");
    let a = write_commit_with_files(tx.repo_mut(), &settings, &[], &[("a", "1")]);
    let repo = tx.commit().unwrap();

    let mut tx = repo.start_transaction("amend");
    let (a2, _created) = CommitBuilder::for_rewrite_from(&settings, repo.store(), &a)
        .set_description("a amended".to_string())
        .write_to_repo(tx.repo_mut())
        .unwrap();
    tx.repo_mut()
        .record_obsolete(a.id(), std::slice::from_ref(a2.id()), Some("amend"));
    let repo = tx.commit().unwrap();

    let evolution = repo.evolution().unwrap();
    assert!(evolution.is_hidden(a.id()));
    assert!(evolution.is_visible(a2.id()));
    assert_eq!(evolution.latest_successor(a.id()), a2.id().clone());
    // Nothing kept a visible, so nothing was inhibited either.
    assert!(!repo.inhibition().unwrap().is_inhibited(a.id()));
    // The hidden commit stays a head for ancestry walks.
    assert!(repo.view().heads().contains(a.id()));
}

#[test]
fn test_latest_successor_follows_chains() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init();
    let repo = &test_repo.repo;

    let mut tx = repo.start_transaction("test");
    let a = write_commit_with_files(tx.repo_mut(), &settings, &[], &[("a", "1")]);
    let repo = tx.commit().unwrap();

    // Amend twice: a -> a2 -> a3.
    let mut tx = repo.start_transaction("amends");
    let (a2, _created) = CommitBuilder::for_rewrite_from(&settings, repo.store(), &a)
        .set_description("second".to_string())
        .write_to_repo(tx.repo_mut())
        .unwrap();
    tx.repo_mut()
        .record_obsolete(a.id(), std::slice::from_ref(a2.id()), Some("amend"));
    let (a3, _created) = CommitBuilder::for_rewrite_from(&settings, repo.store(), &a2)
        .set_description("third".to_string())
        .write_to_repo(tx.repo_mut())
        .unwrap();
    tx.repo_mut()
        .record_obsolete(a2.id(), std::slice::from_ref(a3.id()), Some("amend"));
    let repo = tx.commit().unwrap();

    let evolution = repo.evolution().unwrap();
    assert!(evolution.is_hidden(a.id()));
    assert!(evolution.is_hidden(a2.id()));
    assert_eq!(evolution.latest_successor(a.id()), a3.id().clone());
    assert_eq!(evolution.latest_successor(a2.id()), a3.id().clone());
}

#[test]
fn test_latest_successor_divergence_prefers_newest_visible() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init();
    let repo = &test_repo.repo;

    let mut tx = repo.start_transaction("test");
    let a = write_commit_with_files(tx.repo_mut(), &settings, &[], &[("a", "1")]);
    let repo = tx.commit().unwrap();

    // Two competing successors; y is created after x.
    let mut tx = repo.start_transaction("diverge");
    let (x, _created) = CommitBuilder::for_rewrite_from(&settings, repo.store(), &a)
        .set_description("x".to_string())
        .write_to_repo(tx.repo_mut())
        .unwrap();
    let (y, _created) = CommitBuilder::for_rewrite_from(&settings, repo.store(), &a)
        .set_description("y".to_string())
        .write_to_repo(tx.repo_mut())
        .unwrap();
    tx.repo_mut()
        .record_obsolete(a.id(), std::slice::from_ref(x.id()), Some("amend"));
    tx.repo_mut()
        .record_obsolete(a.id(), std::slice::from_ref(y.id()), Some("amend"));
    let repo = tx.commit().unwrap();
    assert_eq!(
        repo.evolution().unwrap().latest_successor(a.id()),
        y.id().clone()
    );

    // Pruning y moves the answer back to x.
    let mut tx = repo.start_transaction("prune");
    tx.repo_mut().record_obsolete(y.id(), &[], None);
    let repo = tx.commit().unwrap();
    let evolution = repo.evolution().unwrap();
    assert!(evolution.is_hidden(y.id()));
    assert_eq!(evolution.latest_successor(a.id()), x.id().clone());
}

#[test]
fn test_pruned_leaf_has_no_successor() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init();
    let repo = &test_repo.repo;

    let mut tx = repo.start_transaction("test");
    let a = write_random_commit(tx.repo_mut(), &settings);
    let repo = tx.commit().unwrap();

    let mut tx = repo.start_transaction("prune");
    tx.repo_mut().record_obsolete(a.id(), &[], Some("prune"));
    let repo = tx.commit().unwrap();

    let evolution = repo.evolution().unwrap();
    assert!(evolution.is_obsolete(a.id()));
    assert!(evolution.is_hidden(a.id()));
    assert_eq!(evolution.latest_successor(a.id()), a.id().clone());
}

#[test]
fn test_bookmark_keeps_obsolete_commit_visible() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init();
    let repo = &test_repo.repo;

    let mut tx = repo.start_transaction("test");
    let a = write_commit_with_files(tx.repo_mut(), &settings, &[], &[("a", "1")]);
    tx.repo_mut()
        .set_bookmark("pin".to_string(), a.id().clone());
    let repo = tx.commit().unwrap();

    let mut tx = repo.start_transaction("amend");
    let (a2, _created) = CommitBuilder::for_rewrite_from(&settings, repo.store(), &a)
        .set_description("a amended".to_string())
        .write_to_repo(tx.repo_mut())
        .unwrap();
    tx.repo_mut()
        .record_obsolete(a.id(), std::slice::from_ref(a2.id()), Some("amend"));
    let repo = tx.commit().unwrap();

    let evolution = repo.evolution().unwrap();
    assert!(evolution.is_obsolete(a.id()));
    assert!(evolution.is_visible(a.id()));
    assert!(repo.inhibition().unwrap().is_inhibited(a.id()));
}

#[test]
fn test_child_relationships() {
    let settings = testutils::user_settings();
    let test_repo = TestRepo::init();
    let repo = &test_repo.repo;

    // c
    // b d
    // |/
    // a
    let mut tx = repo.start_transaction("test");
    let mut graph_builder = CommitGraphBuilder::new(&settings, tx.repo_mut());
    let a = graph_builder.initial_commit();
    let b = graph_builder.commit_with_parents(&[&a]);
    let c = graph_builder.commit_with_parents(&[&b]);
    let d = graph_builder.commit_with_parents(&[&a]);
    let repo = tx.commit().unwrap();

    let evolution = repo.evolution().unwrap();
    assert_eq!(
        evolution.child_relationships(std::slice::from_ref(a.id())),
        hashmap! {
            a.id().clone() => hashset! {b.id().clone(), d.id().clone()},
            b.id().clone() => hashset! {c.id().clone()},
            c.id().clone() => hashset! {},
            d.id().clone() => hashset! {},
        }
    );
}
