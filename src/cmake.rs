use std::path::PathBuf;

use crate::error::Error;

pub const UNIX_MAKEFILES: &str = "Unix Makefiles";
pub const MINGW_MAKEFILES: &str = "MinGW Makefiles";

/// Generators whose native tool understands `-j <N>`.
pub fn accepts_parallel_jobs(generator: &str) -> bool {
    generator == UNIX_MAKEFILES || generator == MINGW_MAKEFILES
}

/// Resolve a program name or path the same way the child spawn would.
pub fn locate_executable(program: &str) -> Result<PathBuf, Error> {
    which::which(program).map_err(|source| Error::ExecutableNotFound {
        program: program.to_string(),
        source,
    })
}
