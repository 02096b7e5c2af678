//! Run newline-separated commands as one pipeline, in the manner of
//! `cmd1 | cmd2 | ... | cmdN`.

pub mod command;
pub mod errors;
pub mod input;
pub mod jobs;
pub mod pipeline;
pub mod pipes;
pub mod shell;
pub mod signal_handler;

pub use command::{parse_pipeline, split_args, Stage};
pub use errors::{MexecError, MexecResult};
pub use input::LineSource;
pub use jobs::{PipelineResult, ProcessRecord, ProcessTable, WaitPolicy};
pub use pipeline::PipelineBuilder;
pub use pipes::{Pipe, PipeSet};
pub use shell::{Config, Runner};
