use std::{
    io::IsTerminal,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use cmake_tasks::{BuildConfiguration, Cmd, Error, config::CONFIG_FILE_NAME};
use tracing_subscriber::{EnvFilter, fmt};

/// Configure and build CMake projects.
#[derive(Parser, Debug)]
#[command(name = "cmake-tasks", version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file, or a directory containing `cmake-tasks.json`.
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Root for the default source and working folders when no settings file is used.
    #[arg(long, global = true, default_value = "build", env = "CMAKE_TASKS_BUILD_ROOT")]
    build_root: PathBuf,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate build files from the source folder.
    Configure(ConfigureArgs),
    /// Configure, then build with the generator's native tool.
    Build(BuildArgs),
    /// Delete the working folder.
    Clean(CommonArgs),
}

#[derive(Args, Debug, Default)]
struct CommonArgs {
    /// CMake binary to invoke.
    #[arg(long)]
    executable: Option<String>,

    /// Folder CMake runs in and writes its cache to.
    #[arg(long)]
    working: Option<PathBuf>,

    /// CMake generator, e.g. "Unix Makefiles".
    #[arg(short = 'G', long)]
    generator: Option<String>,

    /// Extra environment for CMake, as KEY=VALUE.
    #[arg(long = "env", value_parser = parse_key_value)]
    environment: Vec<(String, String)>,

    /// Kill CMake after this many seconds.
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Args, Debug, Default)]
struct ConfigureArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Folder holding the top-level CMakeLists.txt.
    #[arg(long)]
    source: Option<PathBuf>,

    #[arg(short = 'A', long)]
    platform: Option<String>,

    #[arg(short = 'T', long)]
    toolset: Option<String>,

    #[arg(long)]
    configuration_types: Option<String>,

    #[arg(long)]
    install_prefix: Option<String>,

    #[arg(long)]
    shared_libs: Option<bool>,

    #[arg(long)]
    static_libs: Option<bool>,

    /// Cache definitions, as KEY=VALUE.
    #[arg(short = 'D', value_parser = parse_key_value)]
    definitions: Vec<(String, String)>,
}

#[derive(Args, Debug)]
struct BuildArgs {
    #[command(flatten)]
    configure: ConfigureArgs,

    /// Build configuration, e.g. Release.
    #[arg(long = "config")]
    build_config: Option<String>,

    #[arg(long)]
    target: Option<String>,

    #[arg(long)]
    clean_first: bool,

    /// Parallel jobs for Makefile generators.
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Build without running configure first.
    #[arg(long)]
    skip_configure: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tracing::debug!("parsed arguments: {:?}", cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:?}");
            eprintln!("Error: {err:#}");
            let code = err
                .downcast_ref::<Error>()
                .map(Error::exit_code)
                .unwrap_or(1);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .compact()
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.file.as_ref(), &cli.build_root)?;

    match cli.command {
        Command::Configure(args) => {
            apply_configure(&mut config, args);
            Cmd::from_config(config)
                .configure()
                .context("cmake configure failed")?;
        }
        Command::Build(args) => {
            apply_configure(&mut config, args.configure);
            if args.build_config.is_some() {
                config.build_config = args.build_config;
            }
            if args.target.is_some() {
                config.build_target = args.target;
            }
            config.build_clean |= args.clean_first;
            if args.jobs.is_some() {
                config.jobs = args.jobs;
            }

            let cmd = Cmd::from_config(config);
            if !args.skip_configure {
                cmd.configure().context("cmake configure failed")?;
            }
            cmd.build().context("cmake build failed")?;
        }
        Command::Clean(args) => {
            apply_common(&mut config, args);
            Cmd::from_config(config).clean()?;
        }
    }

    Ok(())
}

fn load_config(file: Option<&PathBuf>, build_root: &Path) -> anyhow::Result<BuildConfiguration> {
    if let Some(path) = file {
        return BuildConfiguration::from_path(path)
            .with_context(|| format!("could not load settings from {}", path.display()));
    }

    let default = PathBuf::from(CONFIG_FILE_NAME);
    if default.is_file() {
        return Ok(BuildConfiguration::from_path(default)?);
    }

    Ok(BuildConfiguration::with_build_root(build_root))
}

fn apply_common(config: &mut BuildConfiguration, args: CommonArgs) {
    if let Some(executable) = args.executable {
        config.executable = executable;
    }
    if let Some(working) = args.working {
        config.working_folder = working;
    }
    if args.generator.is_some() {
        config.generator = args.generator;
    }
    config.environment.extend(args.environment);
    if args.timeout.is_some() {
        config.timeout = args.timeout;
    }
}

fn apply_configure(config: &mut BuildConfiguration, args: ConfigureArgs) {
    apply_common(config, args.common);
    if let Some(source) = args.source {
        config.source_folder = source;
    }
    if args.platform.is_some() {
        config.platform = args.platform;
    }
    if args.toolset.is_some() {
        config.toolset = args.toolset;
    }
    if args.configuration_types.is_some() {
        config.configuration_types = args.configuration_types;
    }
    if args.install_prefix.is_some() {
        config.install_prefix = args.install_prefix;
    }
    if args.shared_libs.is_some() {
        config.build_shared_libs = args.shared_libs;
    }
    if args.static_libs.is_some() {
        config.build_static_libs = args.static_libs;
    }
    config.definitions.extend(args.definitions);
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_pairs() {
        assert_eq!(
            parse_key_value("FOO=1").unwrap(),
            ("FOO".to_string(), "1".to_string())
        );
        assert_eq!(
            parse_key_value("PATHS=a=b").unwrap(),
            ("PATHS".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("FOO").is_err());
        assert!(parse_key_value("=1").is_err());
    }

    #[test]
    fn cli_overrides_file_values() {
        let mut config = BuildConfiguration::with_build_root("/b");
        config.generator = Some("Ninja".into());

        let args = ConfigureArgs {
            common: CommonArgs {
                generator: Some("Unix Makefiles".into()),
                environment: vec![("CC".into(), "gcc".into())],
                ..Default::default()
            },
            shared_libs: Some(true),
            definitions: vec![("FOO".into(), "1".into())],
            ..Default::default()
        };
        apply_configure(&mut config, args);

        assert_eq!(config.generator(), Some("Unix Makefiles"));
        assert_eq!(config.build_shared_libs, Some(true));
        assert_eq!(config.environment["CC"], "gcc");
        assert_eq!(config.definitions["FOO"], "1");
        assert_eq!(config.working_folder, PathBuf::from("/b/cmake"));
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
