//! Error types

use crate::system;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // pre-check
    #[error("Cannot find required tool `{0}`. {1}")]
    MissingTool(String, String),

    // fs
    #[error("Cannot find `{0}`")]
    NotFound(String),
    #[error("Invalid path `{0}`: {1}")]
    InvalidPath(String, std::io::Error),
    #[error("Cannot read file `{0}`: {1}")]
    ReadFile(String, std::io::Error),
    #[error("Cannot write file `{0}`: {1}")]
    WriteFile(String, std::io::Error),

    // process
    #[error("error spawning `{0}`: {1}")]
    SpawnChild(String, std::io::Error),
    #[error("error executing `{0}`: {1}")]
    WaitForChild(String, std::io::Error),
    #[error("`{0}` exited with status `{1}`")]
    CommandFailed(String, std::process::ExitStatus),

    // scope / parse
    #[error("variable `{0}` is not defined in this scope")]
    MissingVariable(String),
    #[error("malformed line in `{0}`: {1}")]
    MalformedLine(String, String),
    #[error("failed to parse boolean expression `{0}`")]
    BoolParserException(String),

    // model
    #[error("no model found for architecture `{0}`")]
    ModelNotFound(String),
    #[error("malformed kconfig dump at `{0}` line {1}: {2}")]
    MalformedDump(String, usize, String),

    #[error("parsing regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("Cannot parse `{0}`: {1}")]
    ParseJson(String, serde_json::Error),
}

impl Error {
    pub fn print(&self) {
        system::errorln!("Fatal", "{}", self);
    }
}
