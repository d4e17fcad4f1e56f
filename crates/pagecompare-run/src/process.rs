//! Running external programs with a wall-clock limit.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::error::CollaboratorError;

/// How often a running child is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run `command` to completion, killing it if it outlives `timeout`.
///
/// Standard output and error are appended to `log` when given and
/// discarded otherwise, so concurrent workers never interleave output
/// on the terminal.
///
/// # Errors
///
/// Returns [`CollaboratorError::Spawn`] if the program cannot start,
/// [`CollaboratorError::Failed`] on a non-zero exit,
/// [`CollaboratorError::TimedOut`] if it was killed, and
/// [`CollaboratorError::Io`] if the log cannot be opened or waiting
/// fails.
pub fn run_with_timeout(
    command: &mut Command,
    timeout: Duration,
    log: Option<&Path>,
) -> Result<(), CollaboratorError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let io_err = |source| CollaboratorError::Io {
        program: program.clone(),
        source,
    };

    let (stdout, stderr) = match log {
        Some(path) => {
            let file = open_log(path).map_err(io_err)?;
            let clone = file.try_clone().map_err(io_err)?;
            (Stdio::from(file), Stdio::from(clone))
        }
        None => (Stdio::null(), Stdio::null()),
    };

    debug!("running {command:?}");
    let mut child = command
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|source| CollaboratorError::Spawn {
            program: program.clone(),
            source,
        })?;

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(io_err)? {
            return if status.success() {
                Ok(())
            } else {
                Err(CollaboratorError::Failed { program, status })
            };
        }
        if started.elapsed() >= timeout {
            // The child may exit between try_wait and kill.
            let _ = child.kill();
            child.wait().map_err(io_err)?;
            return Err(CollaboratorError::TimedOut {
                program,
                after: timeout,
            });
        }
        thread::sleep(POLL_INTERVAL.min(timeout.saturating_sub(started.elapsed())));
    }
}

fn open_log(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn successful_command_is_ok() {
        let result = run_with_timeout(&mut Command::new("true"), Duration::from_secs(5), None);
        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn failing_command_reports_status() {
        let result = run_with_timeout(&mut Command::new("false"), Duration::from_secs(5), None);
        assert!(matches!(result, Err(CollaboratorError::Failed { .. })));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let result = run_with_timeout(
            &mut Command::new("pagecompare-no-such-program"),
            Duration::from_secs(5),
            None,
        );
        assert!(matches!(result, Err(CollaboratorError::Spawn { .. })));
    }

    #[test]
    fn hanging_command_is_killed() {
        let started = Instant::now();
        let result = run_with_timeout(
            Command::new("sleep").arg("30"),
            Duration::from_millis(200),
            None,
        );
        assert!(matches!(result, Err(CollaboratorError::TimedOut { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn output_goes_to_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("logs/build.log");
        run_with_timeout(
            Command::new("sh").args(["-c", "echo out; echo err >&2"]),
            Duration::from_secs(5),
            Some(&log),
        )
        .unwrap();
        let text = fs::read_to_string(&log).unwrap();
        assert!(text.contains("out") && text.contains("err"), "{text}");
    }
}
