//
//   Copyright 2018, 2019 Delphix
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
//   Unless required by applicable law or agreed to in writing, software
//   distributed under the License is distributed on an "AS IS" BASIS,
//   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//   See the License for the specific language governing permissions and
//   limitations under the License.
//

#![allow(dead_code)]

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

// Find an executable produced by the Cargo build
pub fn find_exec(name: &str) -> PathBuf {

    // Find the path where Cargo has placed the executables by looking at this test process's
    // executable, which was also built by Cargo.
    let this_exec = std::env::current_exe().unwrap();
    let exec_dir = this_exec.parent().unwrap().parent().unwrap();

    exec_dir.join(name)
}

pub fn edgewait() -> Command {
    let mut cmd = Command::new(find_exec("edgewait"));
    cmd.stdin(Stdio::null());
    cmd
}

// Run edgewait to completion with the given arguments
pub fn run_edgewait(args: &[&str]) -> Output {
    edgewait().args(args).output().unwrap()
}

// An empty file unique to this test process and test name, removed when dropped so a failing test
// doesn't leave it behind.
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(name: &str) -> Self {
        let path = std::env::temp_dir()
            .join(format!("edgewait-test-{}-{}", std::process::id(), name));
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != io::ErrorKind::NotFound {
                panic!("Failed to remove {:?}: {:?}", path, e.kind())
            }
        }
        File::create(&path).unwrap();
        ScratchFile { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

pub fn assert_failed_with(output: &Output, pattern: &str) {
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(1), "stderr:\n{}", stderr);
    if !stderr.contains(pattern) {
        panic!("String '{}' not found in command output:\n\n{}\n\n", pattern, stderr);
    }
    assert_eq!(stderr.lines().count(), 1, "expected a single diagnostic line:\n{}", stderr);
}
