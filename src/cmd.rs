use std::{
    path::PathBuf,
    sync::{
        Arc,
        mpsc::{self, Receiver},
    },
    thread,
    time::Duration,
};

use crate::{
    args::{self, Phase},
    cmake,
    config::BuildConfiguration,
    error::{Error, ExecResult},
    runner::{self, RunOptions},
    sink::{LogSink, TracingSink},
};

/// Builder for CMake configure and build invocations.
pub struct Cmd {
    config: BuildConfiguration,
    sink: Arc<dyn LogSink>,
}

impl Default for Cmd {
    fn default() -> Self {
        Self::new()
    }
}

impl Cmd {
    pub fn new() -> Self {
        Self::from_config(BuildConfiguration::default())
    }

    pub fn from_config(config: BuildConfiguration) -> Self {
        Self {
            config,
            sink: Arc::new(TracingSink),
        }
    }

    pub fn config(&self) -> &BuildConfiguration {
        &self.config
    }

    pub fn set_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn set_executable<T>(mut self, executable: T) -> Self
    where
        T: Into<String>,
    {
        self.config.executable = executable.into();
        self
    }

    pub fn set_generator<T>(mut self, generator: T) -> Self
    where
        T: Into<String>,
    {
        self.config.generator = Some(generator.into());
        self
    }

    pub fn set_source_folder<T>(mut self, path: T) -> Self
    where
        T: Into<PathBuf>,
    {
        self.config.source_folder = path.into();
        self
    }

    pub fn set_working_folder<T>(mut self, path: T) -> Self
    where
        T: Into<PathBuf>,
    {
        self.config.working_folder = path.into();
        self
    }

    pub fn add_env<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.config.environment.insert(key.into(), value.into());
        self
    }

    pub fn set_configuration_types<T>(mut self, types: T) -> Self
    where
        T: Into<String>,
    {
        self.config.configuration_types = Some(types.into());
        self
    }

    pub fn set_install_prefix<T>(mut self, prefix: T) -> Self
    where
        T: Into<String>,
    {
        self.config.install_prefix = Some(prefix.into());
        self
    }

    pub fn set_platform<T>(mut self, platform: T) -> Self
    where
        T: Into<String>,
    {
        self.config.platform = Some(platform.into());
        self
    }

    pub fn set_toolset<T>(mut self, toolset: T) -> Self
    where
        T: Into<String>,
    {
        self.config.toolset = Some(toolset.into());
        self
    }

    pub fn set_build_shared_libs(mut self, enabled: bool) -> Self {
        self.config.build_shared_libs = Some(enabled);
        self
    }

    pub fn set_build_static_libs(mut self, enabled: bool) -> Self {
        self.config.build_static_libs = Some(enabled);
        self
    }

    pub fn add_define<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.config.definitions.insert(key.into(), value.into());
        self
    }

    pub fn set_build_config<T>(mut self, build_config: T) -> Self
    where
        T: Into<String>,
    {
        self.config.build_config = Some(build_config.into());
        self
    }

    pub fn set_build_target<T>(mut self, target: T) -> Self
    where
        T: Into<String>,
    {
        self.config.build_target = Some(target.into());
        self
    }

    pub fn set_build_clean(mut self, clean: bool) -> Self {
        self.config.build_clean = clean;
        self
    }

    pub fn set_jobs(mut self, jobs: usize) -> Self {
        self.config.jobs = Some(jobs);
        self
    }

    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout.as_secs());
        self
    }

    /// The argv that [`Cmd::configure`] or [`Cmd::build`] would run.
    ///
    /// The executable is resolved up front so the `-E env` prefix and the real
    /// invocation name the same binary, even though the latter runs inside the
    /// working folder.
    pub fn command_line(&self, phase: Phase) -> Vec<String> {
        match cmake::locate_executable(&self.config.executable) {
            Ok(resolved) => {
                let mut config = self.config.clone();
                let resolved = std::path::absolute(&resolved).unwrap_or(resolved);
                config.executable = resolved.to_string_lossy().into_owned();
                args::command_line(&config, phase)
            }
            // left as configured; the runner reports the launch error
            Err(_) => args::command_line(&self.config, phase),
        }
    }

    pub fn configure(&self) -> ExecResult {
        self.config.validate_for_configure()?;
        self.execute(Phase::Configure)
    }

    pub fn build(&self) -> ExecResult {
        self.config.validate_for_build()?;
        self.execute(Phase::Build)
    }

    /// Configure, then build only if configuring succeeded.
    pub fn run(&self) -> ExecResult {
        self.configure()?;
        self.build()
    }

    /// Configure and build on a background thread.
    pub fn spawn(self) -> Receiver<ExecResult> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let _ = tx.send(self.run());
        });

        rx
    }

    /// Delete the working folder so the next configure starts from scratch.
    pub fn clean(&self) -> ExecResult {
        let folder = &self.config.working_folder;
        if !folder.exists() {
            tracing::debug!("nothing to clean at {}", folder.display());
            return Ok(());
        }

        tracing::info!("deleting folder {}", folder.display());
        std::fs::remove_dir_all(folder).map_err(|source| Error::RemoveDirectory {
            path: folder.clone(),
            source,
        })
    }

    fn execute(&self, phase: Phase) -> ExecResult {
        tracing::debug!("running cmake {phase} in {}", self.config.working_folder.display());
        let cmd_line = self.command_line(phase);
        let options = RunOptions {
            label: task_label(phase).to_string(),
            timeout: self.config.timeout.map(Duration::from_secs),
        };

        runner::execute(
            &cmd_line,
            &self.config.working_folder,
            &options,
            self.sink.as_ref(),
        )
    }
}

fn task_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Configure => "cmakeConfigure",
        Phase::Build => "cmakeBuild",
    }
}
