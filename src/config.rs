use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::Error;

/// File looked up when a directory is handed to [`BuildConfiguration::from_path`].
pub const CONFIG_FILE_NAME: &str = "cmake-tasks.json";

/// Build root used when nothing else is supplied.
pub const DEFAULT_BUILD_ROOT: &str = "build";

/// Settings for one configure or build invocation.
///
/// Every optional field that is `None` (or empty) contributes nothing to the
/// generated command line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfiguration {
    #[serde(default = "default_executable")]
    pub executable: String,
    pub generator: Option<String>,
    pub source_folder: PathBuf,
    pub working_folder: PathBuf,
    #[serde(alias = "env")]
    pub environment: IndexMap<String, String>,

    // configure phase
    pub configuration_types: Option<String>,
    pub install_prefix: Option<String>,
    pub platform: Option<String>,
    pub toolset: Option<String>,
    pub build_shared_libs: Option<bool>,
    pub build_static_libs: Option<bool>,
    #[serde(alias = "defs")]
    pub definitions: IndexMap<String, String>,

    // build phase
    pub build_config: Option<String>,
    pub build_target: Option<String>,
    pub build_clean: bool,
    /// Overrides the host-derived `-j` value for Makefile generators.
    pub jobs: Option<usize>,
    /// Seconds before a running CMake child is killed.
    pub timeout: Option<u64>,
}

impl Default for BuildConfiguration {
    fn default() -> Self {
        Self::with_build_root(DEFAULT_BUILD_ROOT)
    }
}

impl BuildConfiguration {
    /// Defaults rooted at `build_root`: `<root>/cmake` and `<root>/src/main/cpp`.
    pub fn with_build_root<T>(build_root: T) -> Self
    where
        T: Into<PathBuf>,
    {
        let root = build_root.into();
        Self {
            executable: default_executable(),
            generator: None,
            source_folder: root.join("src").join("main").join("cpp"),
            working_folder: root.join("cmake"),
            environment: IndexMap::new(),
            configuration_types: None,
            install_prefix: None,
            platform: None,
            toolset: None,
            build_shared_libs: None,
            build_static_libs: None,
            definitions: IndexMap::new(),
            build_config: None,
            build_target: None,
            build_clean: false,
            jobs: None,
            timeout: None,
        }
    }

    /// Load settings from a JSON file, or from `cmake-tasks.json` inside a directory.
    ///
    /// Relative folders in the file are resolved against the file's directory.
    pub fn from_path<T>(path: T) -> Result<Self, Error>
    where
        T: Into<PathBuf>,
    {
        let path = path.into();

        let path = if path.is_dir() {
            path.join(CONFIG_FILE_NAME)
        } else {
            path
        };

        let content = std::fs::read_to_string(&path).map_err(|source| Error::ReadConfig {
            path: path.clone(),
            source,
        })?;
        let mut config: BuildConfiguration =
            serde_json::from_str(&content).map_err(|source| Error::ParseConfig {
                path: path.clone(),
                source,
            })?;

        if let Some(base) = path.parent() {
            config.rebase(base);
        }

        tracing::debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Anchor relative source and working folders at `base`.
    pub fn rebase(&mut self, base: &Path) {
        if self.source_folder.is_relative() {
            self.source_folder = base.join(&self.source_folder);
        }
        if self.working_folder.is_relative() {
            self.working_folder = base.join(&self.working_folder);
        }
    }

    /// Generator name, treating an empty string as absent.
    pub fn generator(&self) -> Option<&str> {
        non_empty(&self.generator)
    }

    /// Fails when the settings cannot possibly produce a valid configure run.
    pub fn validate_for_configure(&self) -> Result<(), Error> {
        self.validate_executable()?;
        if !self.source_folder.is_dir() {
            return Err(Error::Configuration(format!(
                "source folder {} does not exist",
                self.source_folder.display()
            )));
        }
        Ok(())
    }

    pub fn validate_for_build(&self) -> Result<(), Error> {
        self.validate_executable()
    }

    fn validate_executable(&self) -> Result<(), Error> {
        if self.executable.trim().is_empty() {
            return Err(Error::Configuration("executable must not be empty".into()));
        }
        Ok(())
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn default_executable() -> String {
    "cmake".to_string()
}
