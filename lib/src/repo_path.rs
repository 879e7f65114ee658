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

use std::fmt::{Debug, Error, Formatter};

/// A path to a file tracked in the repository, relative to the repository
/// root, with `/` as the separator on all platforms.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepoPathBuf {
    value: String,
}

impl Debug for RepoPathBuf {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        f.write_fmt(format_args!("{:?}", &self.value))
    }
}

impl RepoPathBuf {
    pub fn from_internal_string(value: &str) -> Self {
        assert!(!value.starts_with('/'));
        assert!(!value.ends_with('/'));
        RepoPathBuf {
            value: value.to_owned(),
        }
    }

    pub fn as_internal_str(&self) -> &str {
        &self.value
    }

    pub fn to_internal_string(&self) -> String {
        self.value.clone()
    }
}

impl From<&str> for RepoPathBuf {
    fn from(value: &str) -> Self {
        RepoPathBuf::from_internal_string(value)
    }
}
