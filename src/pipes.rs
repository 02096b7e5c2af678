use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::unistd;
use tracing::debug;

use crate::errors::{MexecError, MexecResult};

/// One pipe connecting stage `i` to stage `i + 1`.
///
/// Each end is owned; taking or closing an end moves it out, so it can be
/// released exactly once.
#[derive(Debug)]
pub struct Pipe {
    read: Option<OwnedFd>,
    write: Option<OwnedFd>,
}

impl Pipe {
    /// Both ends are numbered above the standard descriptors, so wiring a
    /// child's stdin/stdout can never clobber another pipe end.
    pub fn new() -> MexecResult<Self> {
        let (read, write) = unistd::pipe().map_err(MexecError::PipeCreation)?;
        let read = lift_above_stdio(read).map_err(MexecError::PipeCreation)?;
        let write = lift_above_stdio(write).map_err(MexecError::PipeCreation)?;
        Ok(Self {
            read: Some(read),
            write: Some(write),
        })
    }

    pub fn take_read(&mut self) -> Option<OwnedFd> {
        self.read.take()
    }

    pub fn take_write(&mut self) -> Option<OwnedFd> {
        self.write.take()
    }

    pub fn close_read(&mut self) {
        drop(self.read.take());
    }

    pub fn close_write(&mut self) {
        drop(self.write.take());
    }

    pub fn open_ends(&self) -> usize {
        self.read.is_some() as usize + self.write.is_some() as usize
    }
}

/// The pipes of one pipeline, indexed by the stage that writes into them.
#[derive(Debug, Default)]
pub struct PipeSet {
    pipes: Vec<Pipe>,
}

impl PipeSet {
    /// Room for the `stages - 1` pipes a pipeline of `stages` needs.
    pub fn for_stages(stages: usize) -> Self {
        Self {
            pipes: Vec::with_capacity(stages.saturating_sub(1)),
        }
    }

    /// Create the next pipe and return its index.
    pub fn create(&mut self) -> MexecResult<usize> {
        let pipe = Pipe::new()?;
        self.pipes.push(pipe);
        let index = self.pipes.len() - 1;
        debug!(index, "created pipe");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Pipe> {
        self.pipes.get_mut(index)
    }

    pub fn take_read(&mut self, index: usize) -> Option<OwnedFd> {
        self.pipes.get_mut(index).and_then(Pipe::take_read)
    }

    pub fn take_write(&mut self, index: usize) -> Option<OwnedFd> {
        self.pipes.get_mut(index).and_then(Pipe::take_write)
    }

    /// Number of descriptors this process still holds across all pipes.
    pub fn open_ends(&self) -> usize {
        self.pipes.iter().map(Pipe::open_ends).sum()
    }

    /// Close every end still held. Safe to call any number of times.
    pub fn close_all(&mut self) {
        for pipe in &mut self.pipes {
            pipe.close_read();
            pipe.close_write();
        }
    }
}

impl Drop for PipeSet {
    fn drop(&mut self) {
        let open = self.open_ends();
        if open > 0 {
            debug!(open, "closing pipe ends left open");
        }
        self.close_all();
    }
}

/// Lowest descriptor number a pipe end may occupy.
const FIRST_NON_STDIO_FD: RawFd = 3;

/// Move `fd` to a number above stderr if it landed on a standard descriptor,
/// which happens when the host runs with stdin, stdout or stderr closed.
pub fn lift_above_stdio(fd: OwnedFd) -> Result<OwnedFd, Errno> {
    if fd.as_raw_fd() >= FIRST_NON_STDIO_FD {
        return Ok(fd);
    }
    let lifted = Errno::result(unsafe {
        libc::fcntl(fd.as_raw_fd(), libc::F_DUPFD, FIRST_NON_STDIO_FD)
    })?;
    // SAFETY: F_DUPFD returned a fresh descriptor nothing else owns.
    Ok(unsafe { OwnedFd::from_raw_fd(lifted) })
}

/// Make `target` refer to the same open file as `fd`, consuming `fd`.
///
/// When `fd` already is `target` it is kept open rather than closed.
pub fn redirect(fd: OwnedFd, target: RawFd) -> Result<(), Errno> {
    if fd.as_raw_fd() == target {
        let _ = fd.into_raw_fd();
        return Ok(());
    }
    Errno::result(unsafe { libc::dup2(fd.as_raw_fd(), target) })?;
    Ok(())
}
