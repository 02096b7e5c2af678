use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::errors::{MexecError, MexecResult};

/// How the supervisor reacts to the first failing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Reap every stage, then report the first non-zero status in stage order.
    #[default]
    WaitAll,
    /// Stop at the first non-zero status, leaving later stages unreaped.
    StopEarly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
    Success,
    Failed { stage: usize, code: i32 },
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Success)
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineResult::Success => 0,
            PipelineResult::Failed { code, .. } => *code,
        }
    }
}

/// Exit code for a terminal wait status; `None` while the child is still around.
///
/// Death by signal is reported as `128 + signo`.
pub fn status_code(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, sig, _) => Some(128 + sig as i32),
        _ => None,
    }
}

/// A spawned stage, valid once `fork` has returned in the parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub stage: usize,
    pub pid: Pid,
    pub program: String,
}

impl ProcessRecord {
    /// Block until the process terminates and return its exit code.
    pub fn wait(&self) -> MexecResult<i32> {
        loop {
            let status = waitpid(self.pid, None).map_err(MexecError::Wait)?;
            if let Some(code) = status_code(status) {
                debug!(stage = self.stage, pid = %self.pid, code, "stage finished");
                return Ok(code);
            }
        }
    }
}

/// Spawned processes, one per stage, in stage order.
#[derive(Debug, Default)]
pub struct ProcessTable {
    records: Vec<ProcessRecord>,
}

impl ProcessTable {
    pub fn with_capacity(stages: usize) -> Self {
        Self {
            records: Vec::with_capacity(stages),
        }
    }

    pub fn push(&mut self, record: ProcessRecord) {
        debug_assert_eq!(record.stage, self.records.len());
        self.records.push(record);
    }

    /// Wait on every record in stage order and aggregate the outcome.
    pub fn wait_all(self, policy: WaitPolicy) -> MexecResult<PipelineResult> {
        let mut result = PipelineResult::Success;

        for (i, record) in self.records.iter().enumerate() {
            let code = record.wait()?;
            if code == 0 || !result.is_success() {
                continue;
            }

            result = PipelineResult::Failed {
                stage: record.stage,
                code,
            };
            if policy == WaitPolicy::StopEarly {
                let unreaped = self.records.len() - i - 1;
                if unreaped > 0 {
                    warn!(
                        stage = record.stage,
                        program = %record.program,
                        unreaped,
                        "stopping at first failed stage"
                    );
                }
                return Ok(result);
            }
        }

        Ok(result)
    }

    /// Reap whatever has already exited without blocking.
    ///
    /// Used when building the pipeline fails partway and the remaining
    /// records will never be waited on.
    pub fn reclaim(&mut self) {
        for record in self.records.drain(..) {
            match waitpid(record.pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => {
                    warn!(stage = record.stage, pid = %record.pid, program = %record.program, "stage left running");
                }
                Ok(status) => {
                    debug!(stage = record.stage, program = %record.program, ?status, "reaped stage");
                }
                Err(errno) => {
                    warn!(stage = record.stage, pid = %record.pid, %errno, "could not reap stage");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::Signal;

    #[test]
    fn test_exit_status_codes() {
        let pid = Pid::from_raw(42);
        assert_eq!(status_code(WaitStatus::Exited(pid, 0)), Some(0));
        assert_eq!(status_code(WaitStatus::Exited(pid, 3)), Some(3));
        assert_eq!(
            status_code(WaitStatus::Signaled(pid, Signal::SIGKILL, false)),
            Some(128 + 9)
        );
        assert_eq!(status_code(WaitStatus::StillAlive), None);
        assert_eq!(status_code(WaitStatus::Continued(pid)), None);
    }

    #[test]
    fn test_pipeline_result_exit_code() {
        assert_eq!(PipelineResult::Success.exit_code(), 0);
        assert!(PipelineResult::Success.is_success());

        let failed = PipelineResult::Failed { stage: 1, code: 2 };
        assert_eq!(failed.exit_code(), 2);
        assert!(!failed.is_success());
    }

    #[test]
    fn test_default_policy_waits_for_all() {
        assert_eq!(WaitPolicy::default(), WaitPolicy::WaitAll);
    }

    #[test]
    fn test_empty_table_is_success() {
        let table = ProcessTable::with_capacity(0);
        assert!(table.records.is_empty());
        assert_eq!(table.wait_all(WaitPolicy::StopEarly).unwrap(), PipelineResult::Success);
    }

    #[test]
    fn test_wait_on_unknown_pid_fails() {
        let record = ProcessRecord {
            stage: 0,
            pid: Pid::from_raw(i32::MAX),
            program: "ghost".into(),
        };
        match record.wait() {
            Err(err @ MexecError::Wait(_)) => assert_eq!(err.exit_code(), libc::ECHILD),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
