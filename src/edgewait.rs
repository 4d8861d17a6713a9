//
//   Copyright 2019 Delphix
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

extern crate getopts;
extern crate nix;

use getopts::Options;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::unistd::{lseek, read, Whence};
use std::env;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io;
use std::os::unix::io::{AsFd, AsRawFd};
use std::path::{Path, PathBuf};

//
// Sysfs attribute files (GPIO 'value' being the usual one) report an edge by raising POLLPRI and
// POLLERR on the open descriptor once sysfs_notify() runs for the attribute. The kernel only
// arms that notification after the attribute has been read through the descriptor, so we read
// from the end before waiting. A regular file never raises either condition, so waiting on one
// blocks until a signal arrives.
//

fn edge_events() -> PollFlags {
    PollFlags::POLLPRI | PollFlags::POLLERR
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArguments,
    OpenFailed,
    SeekFailed,
    ReadFailed,
    WaitFailed,
}

#[derive(Debug)]
pub enum WaitError {
    InvalidArguments(String),
    OpenFailed { path: PathBuf, source: io::Error },
    SeekFailed(Errno),
    ReadFailed(Errno),
    WaitFailed(Errno),
}

impl WaitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WaitError::InvalidArguments(_) => ErrorKind::InvalidArguments,
            WaitError::OpenFailed { .. } => ErrorKind::OpenFailed,
            WaitError::SeekFailed(_) => ErrorKind::SeekFailed,
            WaitError::ReadFailed(_) => ErrorKind::ReadFailed,
            WaitError::WaitFailed(_) => ErrorKind::WaitFailed,
        }
    }
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WaitError::InvalidArguments(reason) => write!(f, "invalid arguments: {}", reason),
            WaitError::OpenFailed { path, source } => {
                write!(f, "open {}: {}", path.display(), source)
            }
            WaitError::SeekFailed(errno) => write!(f, "seek to end: {}", errno.desc()),
            WaitError::ReadFailed(errno) => write!(f, "discard read: {}", errno.desc()),
            WaitError::WaitFailed(errno) => write!(f, "wait for edge: {}", errno.desc()),
        }
    }
}

impl Error for WaitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WaitError::InvalidArguments(_) => None,
            WaitError::OpenFailed { source, .. } => Some(source),
            WaitError::SeekFailed(errno)
            | WaitError::ReadFailed(errno)
            | WaitError::WaitFailed(errno) => Some(errno),
        }
    }
}

// The descriptor operations performed between opening the attribute file and exiting. AttrFile is
// the real implementation; anything standing in for a device only has to answer these three calls
// the way the kernel would.
pub trait EdgeSource {
    // Move the read cursor to the end of the file.
    fn seek_to_end(&mut self) -> nix::Result<()>;

    // Read a single byte at the cursor, returning how many bytes were read.
    fn discard(&mut self) -> nix::Result<usize>;

    // Block until the descriptor reports POLLPRI or POLLERR, returning the reported events.
    fn wait(&mut self) -> nix::Result<PollFlags>;
}

// Read-only handle on a kernel attribute file. Closed when dropped.
pub struct AttrFile {
    file: File,
}

impl AttrFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WaitError> {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => Ok(AttrFile { file }),
            Err(e) => Err(WaitError::OpenFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

impl EdgeSource for AttrFile {
    fn seek_to_end(&mut self) -> nix::Result<()> {
        lseek(self.file.as_raw_fd(), 0, Whence::SeekEnd)?;
        Ok(())
    }

    fn discard(&mut self) -> nix::Result<usize> {
        let mut buf = [0u8; 1];
        read(self.file.as_raw_fd(), &mut buf)
    }

    fn wait(&mut self) -> nix::Result<PollFlags> {
        let mut fds = [PollFd::new(self.file.as_fd(), edge_events())];
        poll(&mut fds, PollTimeout::NONE)?;
        Ok(fds[0].revents().unwrap_or(PollFlags::empty()))
    }
}

// Seek to the end of 'source', throw away whatever is there, and block until it reports an edge.
// The first failing step ends the sequence.
//
// Only a failing discard read is an error. Reading zero bytes at end-of-file is the normal case,
// and the byte itself is never looked at.
pub fn wait_for_edge<S: EdgeSource>(source: &mut S) -> Result<PollFlags, WaitError> {
    source.seek_to_end().map_err(WaitError::SeekFailed)?;
    source.discard().map_err(WaitError::ReadFailed)?;
    source.wait().map_err(WaitError::WaitFailed)
}

pub fn run<P: AsRef<Path>>(path: P) -> Result<PollFlags, WaitError> {
    let mut file = AttrFile::open(path)?;
    wait_for_edge(&mut file)
}

// Every argument after the program name is taken as a path, so '-h', '--' and names starting with
// '-' are all just paths. Anything but exactly one of them is a usage error.
pub fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<PathBuf, WaitError> {
    match args {
        [path] => Ok(PathBuf::from(AsRef::<str>::as_ref(path))),
        _ => Err(WaitError::InvalidArguments(format!(
            "expected exactly one path, got {}",
            args.len()
        ))),
    }
}

pub fn exit_status(result: &Result<PollFlags, WaitError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

fn usage_err(program: &str) -> ! {
    print!("{} <path>\n", Options::new().short_usage(program));
    std::process::exit(1);
}

pub fn edgewait_main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(|p| p.as_str()).unwrap_or("edgewait");
    let rest = if args.is_empty() { &args[..] } else { &args[1..] };

    let path = match parse_args(rest) {
        Ok(path) => path,
        Err(e) => {
            eprint!("{}: {}\n", program, e);
            usage_err(program);
        }
    };

    let result = run(&path);
    if let Err(e) = &result {
        eprint!("{}: {}\n", program, e);
    }
    std::process::exit(exit_status(&result));
}
