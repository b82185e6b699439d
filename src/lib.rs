//! # cmake-tasks
//!
//! Drive CMake configure and build steps from a declarative configuration.
//!
//! The crate turns a [`BuildConfiguration`] into CMake command lines, picks a
//! sensible `-j` value for Makefile generators, runs the result as a child
//! process and streams its output into `tracing` (or any [`LogSink`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use cmake_tasks::Cmd;
//!
//! // Configure, then build
//! let result = Cmd::default()
//!     .set_source_folder("./native")
//!     .set_working_folder("./build/cmake")
//!     .set_generator("Unix Makefiles")
//!     .add_define("CMAKE_EXPORT_COMPILE_COMMANDS", "ON")
//!     .set_build_config("Release")
//!     .run();
//!
//! assert!(result.is_ok());
//! ```
//!
//! ```
//! use cmake_tasks::{BuildConfiguration, Phase, args};
//!
//! // Inspect the command line without running anything
//! let mut config = BuildConfiguration::default();
//! config.source_folder = "/proj/src".into();
//! config.install_prefix = Some("/usr/local".into());
//!
//! let argv = args::command_line(&config, Phase::Configure);
//! assert_eq!(argv[1], "-DCMAKE_INSTALL_PREFIX=/usr/local");
//! ```

pub mod args;
pub mod cmake;
pub mod cmd;
pub mod config;
pub mod error;
pub mod runner;
pub mod sink;

pub use args::Phase;
pub use cmd::Cmd;
pub use config::BuildConfiguration;
pub use error::{Error, ExecResult};
pub use sink::{LogSink, MemorySink, TracingSink};
