use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Result of a single CMake invocation.
pub type ExecResult = Result<(), Error>;

/// Everything that can go wrong between reading the settings and reaping the child.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to read configuration file {path}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("command line is empty")]
    EmptyCommandLine,

    #[error("executable '{program}' not found")]
    ExecutableNotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("failed to launch '{program}'")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not create working folder {path}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not delete working folder {path}")]
    RemoveDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed while waiting for the child process")]
    Wait(#[source] std::io::Error),

    #[error("CMake returned with abnormal exit code: {code}")]
    AbnormalExit { code: i32 },

    #[error("CMake did not finish within {after:?} and was terminated")]
    Timeout { after: Duration },
}

impl Error {
    /// True for the failures that happen before the child ever runs.
    pub fn is_launch_error(&self) -> bool {
        matches!(
            self,
            Error::ExecutableNotFound { .. } | Error::Launch { .. } | Error::EmptyCommandLine
        )
    }

    /// Process exit code to report at the outer boundary.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::AbnormalExit { code } if *code != 0 => *code,
            _ => 1,
        }
    }
}
