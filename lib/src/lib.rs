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

//! History-rewriting engine: obsolescence-aware graph queries, a
//! changeset rewrite primitive, and restacking of unstabilized
//! descendants onto rewritten commits.

#![warn(missing_docs)]
#![deny(unused_must_use)]
#![forbid(unsafe_code)]

pub mod backend;
pub mod bookmarks;
pub mod commit;
pub mod commit_builder;
pub mod copies;
pub mod dag_walk;
pub mod evolution;
pub mod lock;
pub mod obsolete;
pub mod repo;
pub mod repo_path;
pub mod restack;
pub mod rewrite;
pub mod settings;
pub mod store;
pub mod transaction;
pub mod view;
