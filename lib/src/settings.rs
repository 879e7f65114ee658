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

use std::path::PathBuf;

use chrono::DateTime;

use crate::backend::Timestamp;

#[derive(Debug, Clone)]
pub struct UserSettings {
    config: config::Config,
}

/// Which timestamp a rewritten commit gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RewriteDatePolicy {
    /// Keep the predecessor's timestamp. Rewriting a commit without
    /// changing anything then reproduces it exactly.
    #[default]
    Original,
    /// Stamp the rewrite with the current time.
    Current,
}

impl UserSettings {
    pub fn from_config(config: config::Config) -> Self {
        UserSettings { config }
    }

    /// Settings from `$RESTACK_CONFIG` if set, otherwise from an optional
    /// `~/.restackconfig`.
    pub fn for_user() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = std::env::var_os("RESTACK_CONFIG") {
            builder = builder.add_source(
                config::File::from(PathBuf::from(path)).format(config::FileFormat::Toml),
            );
        } else if let Some(home_dir) = dirs::home_dir() {
            builder = builder.add_source(
                config::File::from(home_dir.join(".restackconfig"))
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }
        Ok(UserSettings {
            config: builder.build()?,
        })
    }

    pub fn config(&self) -> &config::Config {
        &self.config
    }

    pub fn user_name(&self) -> String {
        self.config
            .get_string("user.name")
            .unwrap_or_else(|_| "(no name configured)".to_string())
    }

    pub fn user_email(&self) -> String {
        self.config
            .get_string("user.email")
            .unwrap_or_else(|_| "(no email configured)".to_string())
    }

    /// Combined `Name <email>` form used in commit author fields.
    pub fn user(&self) -> String {
        format!("{} <{}>", self.user_name(), self.user_email())
    }

    pub fn rewrite_date_policy(&self) -> RewriteDatePolicy {
        match self.config.get_string("rewrite.date-policy").as_deref() {
            Ok("current") => RewriteDatePolicy::Current,
            Ok("original") | Err(_) => RewriteDatePolicy::Original,
            Ok(other) => {
                tracing::warn!(value = other, "unknown rewrite.date-policy, using original");
                RewriteDatePolicy::Original
            }
        }
    }

    /// Fixed commit timestamp from `debug.commit-timestamp` (RFC 3339),
    /// used to make tests deterministic.
    pub fn commit_timestamp(&self) -> Option<Timestamp> {
        let value = self.config.get_string("debug.commit-timestamp").ok()?;
        match DateTime::parse_from_rfc3339(&value) {
            Ok(datetime) => Some(Timestamp::from_datetime(datetime)),
            Err(err) => {
                tracing::warn!(%err, "invalid debug.commit-timestamp");
                None
            }
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        self.commit_timestamp().unwrap_or_else(Timestamp::now)
    }
}
