//! Pipeline construction: one pipe between each pair of neighbouring
//! stages, one forked process per stage.
//!
//! Descriptor discipline, per stage `i` of `n`:
//!
//! * the parent creates pipe `i` (unless `i` is last) and forks;
//! * the child takes the read end of pipe `i - 1` as stdin and the write end
//!   of pipe `i` as stdout, closes every other pipe end it inherited, and
//!   execs;
//! * the parent closes the write end of pipe `i` and the read end of pipe
//!   `i - 1`, both of which now belong to children.
//!
//! After the last fork the parent holds no pipe descriptors at all.

use std::ffi::CString;

use nix::errno::Errno;
use nix::unistd::{self, ForkResult};
use tracing::debug;

use crate::command::Stage;
use crate::errors::{MexecError, MexecResult};
use crate::jobs::{PipelineResult, ProcessRecord, ProcessTable, WaitPolicy};
use crate::pipes::{self, PipeSet};
use crate::signal_handler;

pub struct PipelineBuilder<'a> {
    stages: &'a [Stage],
    pipes: PipeSet,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(stages: &'a [Stage]) -> Self {
        Self {
            stages,
            pipes: PipeSet::for_stages(stages.len()),
        }
    }

    /// Spawn every stage and return their records.
    ///
    /// On failure the pipes are closed and any stage that already exited is
    /// reaped before the error is returned.
    pub fn spawn_all(mut self) -> MexecResult<ProcessTable> {
        // Everything the children need is allocated before the first fork.
        let stages = self.stages;
        let argvs = stages
            .iter()
            .map(Stage::c_argv)
            .collect::<MexecResult<Vec<_>>>()?;

        let mut table = ProcessTable::with_capacity(stages.len());
        for (i, (stage, argv)) in stages.iter().zip(&argvs).enumerate() {
            if let Err(err) = self.spawn_stage(i, stage, argv, &mut table) {
                self.pipes.close_all();
                table.reclaim();
                return Err(err);
            }
        }

        debug_assert_eq!(self.pipes.len(), stages.len().saturating_sub(1));
        debug_assert_eq!(self.pipes.open_ends(), 0);
        Ok(table)
    }

    fn spawn_stage(
        &mut self,
        i: usize,
        stage: &Stage,
        argv: &[CString],
        table: &mut ProcessTable,
    ) -> MexecResult<()> {
        let last = i + 1 == self.stages.len();

        if !last {
            self.pipes.create()?;
        }

        // SAFETY: the parent is single-threaded while the pipeline is built,
        // and the child only rewires descriptors before exec or _exit.
        match unsafe { unistd::fork() }.map_err(MexecError::Spawn)? {
            ForkResult::Child => exec_stage(i, stage, argv, &mut self.pipes, self.stages.len()),
            ForkResult::Parent { child } => {
                debug!(stage = i, pid = %child, program = stage.program(), "spawned stage");
                table.push(ProcessRecord {
                    stage: i,
                    pid: child,
                    program: stage.program().to_string(),
                });

                if let Some(pipe) = self.pipes.get_mut(i) {
                    pipe.close_write();
                }
                if i > 0 {
                    if let Some(pipe) = self.pipes.get_mut(i - 1) {
                        pipe.close_read();
                    }
                }
                Ok(())
            }
        }
    }
}

/// Child side of a fork: wire stdin/stdout, drop every other pipe end, exec.
fn exec_stage(i: usize, stage: &Stage, argv: &[CString], pipes: &mut PipeSet, stages: usize) -> ! {
    if let Err(errno) = signal_handler::restore_default_dispositions() {
        child_exit("signal", errno);
    }

    if stages > 1 {
        let stdout = if i + 1 < stages { pipes.take_write(i) } else { None };
        let stdin = if i > 0 { pipes.take_read(i - 1) } else { None };

        let wired = stdout
            .map_or(Ok(()), |fd| pipes::redirect(fd, libc::STDOUT_FILENO))
            .and_then(|()| stdin.map_or(Ok(()), |fd| pipes::redirect(fd, libc::STDIN_FILENO)));
        if let Err(errno) = wired {
            child_exit("dup2", errno);
        }

        pipes.close_all();
    }

    match unistd::execvp(&argv[0], argv) {
        Ok(never) => match never {},
        Err(errno) => child_exit(stage.program(), errno),
    }
}

fn child_exit(what: &str, errno: Errno) -> ! {
    eprintln!("{}: {}", what, errno.desc());
    // SAFETY: _exit skips the parent's atexit handlers and buffered output,
    // which this copy of the address space must not run.
    unsafe { libc::_exit(errno as i32) }
}

/// Build and supervise a pipeline over `stages`.
///
/// No stages means nothing to run and counts as success.
pub fn run(stages: &[Stage], policy: WaitPolicy) -> MexecResult<PipelineResult> {
    if stages.is_empty() {
        debug!("empty pipeline");
        return Ok(PipelineResult::Success);
    }

    let table = PipelineBuilder::new(stages).spawn_all()?;
    table.wait_all(policy)
}
