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

//! Code for working with copies and renames.

use std::collections::HashMap;

use crate::backend::BackendResult;
use crate::commit::Commit;
use crate::repo_path::RepoPathBuf;

/// Maps each path in `head` to the path it was copied from in `base`.
///
/// Copy information is recorded on the manifest entry of the commit that
/// introduced the destination path, so only commits between `base` and
/// `head` that introduce a path contribute. Chains fold down to their
/// origin (a->b then b->c reports c->a) and a path that ends up copied
/// onto itself is not reported. Commits are followed along first parents;
/// when `base` is not found that way the result is empty.
pub fn path_copies(
    base: &Commit,
    head: &Commit,
) -> BackendResult<HashMap<RepoPathBuf, RepoPathBuf>> {
    let mut chain: Vec<Commit> = vec![];
    let mut current = head.clone();
    while current.id() != base.id() {
        if current.is_root() {
            return Ok(HashMap::new());
        }
        let mut parents = current.parents()?;
        if parents.is_empty() {
            return Ok(HashMap::new());
        }
        chain.push(current);
        current = parents.remove(0);
    }
    chain.reverse();

    let base_manifest = base.manifest()?;
    let mut prev_manifest = base_manifest.clone();
    let mut copies: HashMap<RepoPathBuf, RepoPathBuf> = HashMap::new();
    for commit in &chain {
        let manifest = commit.manifest()?;
        for (path, entry) in manifest.entries() {
            if prev_manifest.contains(path) {
                continue;
            }
            if let Some(source) = &entry.copy_source {
                let resolved = copies
                    .get(source)
                    .cloned()
                    .unwrap_or_else(|| source.clone());
                copies.insert(path.clone(), resolved);
            }
        }
        prev_manifest = manifest;
    }
    let head_manifest = prev_manifest;
    copies.retain(|dst, src| {
        dst != src && head_manifest.contains(dst) && base_manifest.contains(src)
    });
    Ok(copies)
}
