use std::{
    io::{BufRead, BufReader, Read},
    path::Path,
    process::{Child, Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use crate::{
    cmake,
    error::{Error, ExecResult},
    sink::LogSink,
};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Knobs for a single child process run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Name used in log lines, e.g. `cmakeConfigure`.
    pub label: String,
    /// Kill the child if it is still running after this long.
    pub timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            label: "cmake".to_string(),
            timeout: None,
        }
    }
}

/// Run `cmd_line` inside `working_folder` and forward its output to `sink`.
///
/// The working folder is created first if needed. Stdout and stderr are drained
/// concurrently so a chatty stderr can never block the child.
pub fn execute(
    cmd_line: &[String],
    working_folder: &Path,
    options: &RunOptions,
    sink: &dyn LogSink,
) -> ExecResult {
    let (program, args) = cmd_line.split_first().ok_or(Error::EmptyCommandLine)?;

    ensure_working_folder(working_folder)?;

    tracing::info!("{} - exec: {}", options.label, cmd_line.join(" "));

    let resolved = cmake::locate_executable(program).inspect_err(|err| {
        sink.error(&format!("{} - {err}", options.label));
    })?;

    let mut command = Command::new(&resolved);
    command
        .args(args)
        .current_dir(working_folder)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // CMake forks the native build tool and compilers; a group lets a timeout reach all of them.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt as _;
        command.process_group(0);
    }

    let mut child = command
        .spawn()
        .map_err(|source| {
            sink.error(&format!("{} - failed to launch {program}: {source}", options.label));
            Error::Launch {
                program: program.clone(),
                source,
            }
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let header = format!("{} - ERRORS:", options.label);

    let status = thread::scope(|scope| {
        if let Some(stdout) = stdout {
            scope.spawn(move || forward_stdout(stdout, sink));
        }
        if let Some(stderr) = stderr {
            let header = header.as_str();
            scope.spawn(move || forward_stderr(stderr, header, sink));
        }
        wait_for_exit(&mut child, options.timeout)
    })?;

    match exit_code(status) {
        0 => {
            tracing::debug!("{} - finished successfully", options.label);
            Ok(())
        }
        code => {
            tracing::error!("{} - CMake returned with abnormal exit code: {code}", options.label);
            Err(Error::AbnormalExit { code })
        }
    }
}

/// Create `path` and its parents unless it is already a directory.
pub fn ensure_working_folder(path: &Path) -> Result<(), Error> {
    if path.is_dir() {
        tracing::debug!("working folder {} already exists", path.display());
        return Ok(());
    }

    std::fs::create_dir_all(path).map_err(|source| Error::CreateDirectory {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("created working folder {}", path.display());
    Ok(())
}

fn forward_stdout(stream: impl Read, sink: &dyn LogSink) {
    for line in BufReader::new(stream).lines().map_while(Result::ok) {
        sink.info(&line);
    }
}

fn forward_stderr(stream: impl Read, header: &str, sink: &dyn LogSink) {
    let mut lines = BufReader::new(stream).lines().map_while(Result::ok).peekable();
    if lines.peek().is_none() {
        return;
    }

    sink.error(header);
    for line in lines {
        sink.error(&line);
    }
}

fn wait_for_exit(child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus, Error> {
    let Some(limit) = timeout else {
        return child.wait().map_err(Error::Wait);
    };

    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait().map_err(Error::Wait)? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            tracing::warn!("child exceeded {limit:?}, killing it");
            kill_tree(child);
            child.wait().map_err(Error::Wait)?;
            return Err(Error::Timeout { after: limit });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: killpg has no memory-safety preconditions; the group was created at spawn.
        unsafe { libc::killpg(pgid, libc::SIGKILL) };
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

fn exit_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt as _;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal: Option<i32> = None;

    match status.code() {
        Some(code) => code,
        None => signal.map(|s| 128 + s).unwrap_or(1),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    #[test]
    fn success_forwards_stdout_only() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();

        execute(
            &sh("echo one; echo two"),
            dir.path(),
            &RunOptions::default(),
            &sink,
        )
        .unwrap();

        assert_eq!(sink.info_lines(), ["one", "two"]);
        assert!(sink.error_lines().is_empty());
    }

    #[test]
    fn stderr_gets_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let options = RunOptions {
            label: "cmakeConfigure".into(),
            timeout: None,
        };

        execute(&sh("echo bad >&2; echo worse >&2"), dir.path(), &options, &sink).unwrap();

        assert_eq!(
            sink.error_lines(),
            ["cmakeConfigure - ERRORS:", "bad", "worse"]
        );
    }

    #[test]
    fn non_zero_exit_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();

        let err = execute(&sh("exit 1"), dir.path(), &RunOptions::default(), &sink).unwrap_err();
        assert!(matches!(err, Error::AbnormalExit { code: 1 }));
        assert_eq!(err.exit_code(), 1);

        let err = execute(&sh("exit 7"), dir.path(), &RunOptions::default(), &sink).unwrap_err();
        assert!(matches!(err, Error::AbnormalExit { code: 7 }));
    }

    #[test]
    fn runs_inside_a_freshly_created_working_folder() {
        let dir = tempfile::tempdir().unwrap();
        let working = dir.path().join("nested").join("cmake");
        let sink = MemorySink::new();

        execute(&sh("pwd"), &working, &RunOptions::default(), &sink).unwrap();

        assert!(working.is_dir());
        let reported = std::path::PathBuf::from(&sink.info_lines()[0]);
        assert_eq!(
            reported.canonicalize().unwrap(),
            working.canonicalize().unwrap()
        );
    }

    #[test]
    fn existing_working_folder_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        ensure_working_folder(dir.path()).unwrap();
        ensure_working_folder(dir.path()).unwrap();
    }

    #[test]
    fn working_folder_blocked_by_a_file_fails_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, "").unwrap();
        let sink = MemorySink::new();

        let err = execute(&sh("echo hi"), &file, &RunOptions::default(), &sink).unwrap_err();
        assert!(matches!(err, Error::CreateDirectory { .. }));
        assert!(sink.info_lines().is_empty());
    }

    #[test]
    fn missing_executable_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let cmd_line = vec!["no-such-cmake-here".to_string(), "--version".to_string()];

        let err = execute(&cmd_line, dir.path(), &RunOptions::default(), &sink).unwrap_err();
        assert!(err.is_launch_error());
        assert_eq!(sink.error_lines().len(), 1);
    }

    #[test]
    fn empty_command_line_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = execute(&[], dir.path(), &RunOptions::default(), &MemorySink::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyCommandLine));
    }

    #[test]
    fn hung_child_is_killed_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions {
            label: "cmakeBuild".into(),
            timeout: Some(Duration::from_millis(200)),
        };

        let started = Instant::now();
        let err = execute(&sh("exec sleep 30"), dir.path(), &options, &MemorySink::new()).unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn timeout_also_kills_grandchildren() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let options = RunOptions {
            label: "cmakeBuild".into(),
            timeout: Some(Duration::from_millis(200)),
        };

        // no exec: the sleep is a grandchild still holding the output pipes
        let started = Instant::now();
        let err = execute(&sh("sleep 5; echo late"), dir.path(), &options, &sink).unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(sink.info_lines().is_empty());
    }

    #[test]
    fn large_stderr_does_not_deadlock() {
        let dir = tempfile::tempdir().unwrap();
        let sink = MemorySink::new();
        let script = "i=0; while [ $i -lt 5000 ]; do echo err-$i >&2; i=$((i+1)); done; echo done";

        execute(&sh(script), dir.path(), &RunOptions::default(), &sink).unwrap();

        assert_eq!(sink.info_lines(), ["done"]);
        assert_eq!(sink.error_lines().len(), 5001);
    }
}
