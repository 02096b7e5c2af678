use std::ffi::CString;

use crate::errors::{MexecError, MexecResult};

/// Split a raw line into argument tokens. Whitespace is the only delimiter.
pub fn split_args(line: &str) -> Vec<String> {
    line.split_whitespace().map(|s| s.to_string()).collect()
}

/// One element of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub index: usize,
    pub argv: Vec<String>,
}

impl Stage {
    /// Build the stage at `index` from its raw line.
    ///
    /// A line with no tokens is rejected instead of being spawned with an
    /// empty argument vector.
    pub fn parse(index: usize, line: &str) -> MexecResult<Self> {
        let argv = split_args(line);
        if argv.is_empty() {
            return Err(MexecError::EmptyCommand { line: index + 1 });
        }
        Ok(Self { index, argv })
    }

    pub fn program(&self) -> &str {
        self.argv.first().map_or("", String::as_str)
    }

    /// Argument vector in the form `execvp` consumes.
    pub fn c_argv(&self) -> MexecResult<Vec<CString>> {
        if self.argv.is_empty() {
            return Err(MexecError::EmptyCommand {
                line: self.index + 1,
            });
        }
        self.argv
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<_, _>>()
            .map_err(|source| MexecError::InvalidArgument {
                stage: self.index,
                source,
            })
    }
}

/// Turn every raw line into a stage, failing on the first empty one.
pub fn parse_pipeline<S: AsRef<str>>(lines: &[S]) -> MexecResult<Vec<Stage>> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| Stage::parse(i, line.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_any_whitespace() {
        assert_eq!(split_args("ls  -l\t/tmp\n"), vec!["ls", "-l", "/tmp"]);
    }

    #[test]
    fn test_no_quoting_semantics() {
        assert_eq!(split_args("echo 'a b'"), vec!["echo", "'a", "b'"]);
    }

    #[test]
    fn test_blank_line_is_empty() {
        assert!(split_args("   \t ").is_empty());
        assert!(split_args("").is_empty());
    }

    #[test]
    fn test_stage_parse() {
        let stage = Stage::parse(2, "tr a-z A-Z").unwrap();
        assert_eq!(stage.index, 2);
        assert_eq!(stage.program(), "tr");
        assert_eq!(stage.argv, vec!["tr", "a-z", "A-Z"]);
    }

    #[test]
    fn test_whitespace_only_line_is_rejected() {
        let err = Stage::parse(1, "  \r").unwrap_err();
        assert!(matches!(err, MexecError::EmptyCommand { line: 2 }));
    }

    #[test]
    fn test_parse_pipeline_reports_first_empty_line() {
        let lines = ["echo hi", "cat", "", "wc -l"];
        let err = parse_pipeline(&lines).unwrap_err();
        assert!(matches!(err, MexecError::EmptyCommand { line: 3 }));
    }

    #[test]
    fn test_parse_pipeline_keeps_order() {
        let lines = vec!["echo hi".to_string(), "cat".to_string()];
        let stages = parse_pipeline(&lines).unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].argv, vec!["echo", "hi"]);
        assert_eq!(stages[1].index, 1);
    }

    #[test]
    fn test_c_argv_rejects_empty_argv() {
        let stage = Stage {
            index: 4,
            argv: Vec::new(),
        };
        assert_eq!(stage.program(), "");
        assert!(matches!(
            stage.c_argv(),
            Err(MexecError::EmptyCommand { line: 5 })
        ));
    }

    #[test]
    fn test_c_argv_rejects_nul() {
        let stage = Stage {
            index: 0,
            argv: vec!["echo".into(), "a\0b".into()],
        };
        assert!(matches!(
            stage.c_argv(),
            Err(MexecError::InvalidArgument { stage: 0, .. })
        ));
    }
}
