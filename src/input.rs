use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::errors::{MexecError, MexecResult};

/// Where pipeline lines are read from: standard input or a named file.
pub struct LineSource {
    reader: Box<dyn BufRead>,
}

impl LineSource {
    /// Open `path` for reading, or fall back to standard input.
    pub fn open(path: Option<&Path>) -> MexecResult<Self> {
        match path {
            Some(path) => {
                let file = File::open(path).map_err(|source| MexecError::Open {
                    path: path.to_path_buf(),
                    source,
                })?;
                debug!(path = %path.display(), "reading pipeline from file");
                Ok(Self::from_reader(BufReader::new(file)))
            }
            None => {
                debug!("reading pipeline from stdin");
                Ok(Self::from_reader(BufReader::new(io::stdin())))
            }
        }
    }

    pub fn from_reader<R: BufRead + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }

    /// Consume the source, yielding one raw line per stage.
    ///
    /// Lines have no length limit; the trailing newline is stripped.
    pub fn lines(self) -> impl Iterator<Item = MexecResult<String>> {
        self.reader.lines().map(|line| line.map_err(MexecError::from))
    }

    /// Read every line up front and release the underlying handle.
    pub fn read_all(self) -> MexecResult<Vec<String>> {
        self.lines().collect()
    }
}
