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

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::time::Duration;

use backoff::{retry, ExponentialBackoff};

/// An exclusive advisory lock, held for as long as the value is alive.
///
/// Acquisition retries with exponential backoff while another process
/// holds the lock file and gives up after ten seconds.
pub struct FileLock {
    path: PathBuf,
    _file: File,
}

impl FileLock {
    pub fn lock(path: PathBuf) -> FileLock {
        let mut options = OpenOptions::new();
        options.create_new(true);
        options.write(true);
        let try_create_lock_file = || match options.open(&path) {
            Ok(file) => Ok(FileLock {
                path: path.clone(),
                _file: file,
            }),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(backoff::Error::Transient {
                    err,
                    retry_after: None,
                })
            }
            Err(err) => Err(backoff::Error::Permanent(err)),
        };
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(1),
            max_elapsed_time: Some(Duration::from_secs(10)),
            ..Default::default()
        };
        match retry(backoff, try_create_lock_file) {
            Ok(lock) => lock,
            Err(err) => panic!(
                "failed to create lock file {}: {}",
                path.to_string_lossy(),
                err
            ),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        std::fs::remove_file(&self.path).expect("failed to delete lock file");
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::max;
    use std::io::{Read, Write};
    use std::thread;

    use super::*;

    #[test]
    fn lock_basic() {
        let temp_dir = testutils::new_temp_dir();
        let lock_path = temp_dir.path().join("test.lock");
        assert!(!lock_path.exists());
        {
            let _lock = FileLock::lock(lock_path.clone());
            assert!(lock_path.exists());
        }
        assert!(!lock_path.exists());
    }

    #[test]
    fn lock_concurrent() {
        let temp_dir = testutils::new_temp_dir();
        let counter_path = temp_dir.path().join("counter");
        let lock_path = temp_dir.path().join("counter.lock");
        std::fs::write(&counter_path, 0u32.to_le_bytes()).unwrap();
        let num_threads = max(num_cpus::get(), 4);
        thread::scope(|s| {
            for _ in 0..num_threads {
                s.spawn(|| {
                    let _lock = FileLock::lock(lock_path.clone());
                    let mut buf = [0u8; 4];
                    let mut file = OpenOptions::new().read(true).open(&counter_path).unwrap();
                    file.read_exact(&mut buf).unwrap();
                    let value = u32::from_le_bytes(buf);
                    thread::sleep(Duration::from_millis(1));
                    let mut file = OpenOptions::new().write(true).open(&counter_path).unwrap();
                    file.write_all(&(value + 1).to_le_bytes()).unwrap();
                });
            }
        });
        let mut buf = [0u8; 4];
        let mut file = OpenOptions::new().read(true).open(&counter_path).unwrap();
        file.read_exact(&mut buf).unwrap();
        assert_eq!(u32::from_le_bytes(buf), num_threads as u32);
    }
}
