//! Error type for the pipeline engine.
//!
//! Every host-level failure carries the OS error that caused it so the
//! binary can exit with that errno.

use std::ffi::NulError;
use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MexecError {
    /// The named input file could not be opened
    #[error("{}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading a line from the input failed
    #[error("read error: {0}")]
    Read(#[from] io::Error),

    /// A line held no tokens
    #[error("line {line}: empty command")]
    EmptyCommand { line: usize },

    /// An argument contained an interior NUL byte
    #[error("stage {stage}: argument contains a NUL byte")]
    InvalidArgument {
        stage: usize,
        #[source]
        source: NulError,
    },

    #[error("pipe error: {0}")]
    PipeCreation(#[source] Errno),

    #[error("fork error: {0}")]
    Spawn(#[source] Errno),

    #[error("waitpid: {0}")]
    Wait(#[source] Errno),
}

pub type MexecResult<T> = Result<T, MexecError>;

impl MexecError {
    /// Exit code the host program terminates with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            MexecError::Open { source, .. } | MexecError::Read(source) => {
                source.raw_os_error().unwrap_or(libc::EIO)
            }
            MexecError::EmptyCommand { .. } | MexecError::InvalidArgument { .. } => libc::EINVAL,
            MexecError::PipeCreation(errno) | MexecError::Spawn(errno) | MexecError::Wait(errno) => {
                *errno as i32
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_open_error_uses_os_code() {
        let err = MexecError::Open {
            path: PathBuf::from("missing.txt"),
            source: io::Error::from_raw_os_error(libc::ENOENT),
        };
        assert_eq!(err.exit_code(), libc::ENOENT);
        assert!(err.to_string().starts_with("missing.txt: "));
    }

    #[test]
    fn test_read_error_without_errno_falls_back_to_eio() {
        let err: MexecError = io::Error::new(io::ErrorKind::InvalidData, "bad utf-8").into();
        assert!(matches!(err, MexecError::Read(_)));
        assert_eq!(err.exit_code(), libc::EIO);
    }

    #[test]
    fn test_nix_errors_keep_errno() {
        assert_eq!(MexecError::PipeCreation(Errno::EMFILE).exit_code(), libc::EMFILE);
        assert_eq!(MexecError::Spawn(Errno::EAGAIN).exit_code(), libc::EAGAIN);
        assert_eq!(MexecError::Wait(Errno::ECHILD).exit_code(), libc::ECHILD);
    }

    #[test]
    fn test_command_errors_are_einval() {
        assert_eq!(MexecError::EmptyCommand { line: 3 }.exit_code(), libc::EINVAL);

        let source = CString::new("a\0b").unwrap_err();
        let err = MexecError::InvalidArgument { stage: 0, source };
        assert_eq!(err.exit_code(), libc::EINVAL);
    }
}
