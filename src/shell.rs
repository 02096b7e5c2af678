use std::path::PathBuf;

use tracing::{debug, info};

use crate::command::parse_pipeline;
use crate::errors::MexecResult;
use crate::input::LineSource;
use crate::jobs::{PipelineResult, WaitPolicy};
use crate::pipeline;

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Read stages from this file instead of stdin
    pub input: Option<PathBuf>,
    pub policy: WaitPolicy,
}

/// Top-level driver: read the lines, build the stages, run them.
pub struct Runner {
    config: Config,
}

impl Runner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn run(&self) -> MexecResult<PipelineResult> {
        // The input handle is closed before any stage is forked.
        let lines = LineSource::open(self.config.input.as_deref())?.read_all()?;
        let stages = parse_pipeline(&lines)?;
        debug!(stages = stages.len(), policy = ?self.config.policy, "pipeline parsed");

        let result = pipeline::run(&stages, self.config.policy)?;
        info!(?result, "pipeline finished");
        Ok(result)
    }
}
