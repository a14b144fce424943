//! Child process invocation with explicit parameters and an optional timeout.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::catalog::CommandRecipe;
use crate::error::{Error, Result};

/// Lines of standard error kept in a [`Error::Subprocess`].
const STDERR_TAIL_LINES: usize = 20;

/// Poll interval while waiting on a child with a timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Named parameters for one tool invocation.
///
/// Each entry becomes an environment variable of the child process (and of
/// the child only) and can be referenced as `{name}` in recipe arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeParams {
    values: BTreeMap<String, String>,
}

impl EncodeParams {
    /// Empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a parameter.
    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        self.values.insert(name.into(), value.to_string());
    }

    /// Value of a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Substitute `{name}` placeholders in an argument template.
    ///
    /// Unknown placeholders are left as written.
    #[must_use]
    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    let name = &after[..close];
                    match self.values.get(name) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push('{');
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// Build the command for a recipe with these parameters applied.
    #[must_use]
    pub fn command(&self, recipe: &CommandRecipe) -> Command {
        let mut cmd = Command::new(&recipe.program);
        cmd.args(recipe.args.iter().map(|a| self.render(a)));
        cmd.envs(self.values.iter());
        cmd
    }
}

/// Captured result of a successful invocation.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
    /// Wall-clock time from spawn to exit.
    pub elapsed: Duration,
}

/// Run a recipe to completion and capture its output.
///
/// Non-zero exit is an [`Error::Subprocess`]. With a `timeout`, a child that
/// is still running when it elapses is killed along with its process group
/// and [`Error::Timeout`] is returned.
pub fn run_process(
    recipe: &CommandRecipe,
    params: &EncodeParams,
    timeout: Option<Duration>,
) -> Result<ProcessOutput> {
    let program = recipe.name();
    let mut cmd = params.command(recipe);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if timeout.is_some() {
        own_process_group(&mut cmd);
    }

    log::debug!("running {}", recipe.program.display());
    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|source| Error::Spawn {
        program: program.clone(),
        source,
    })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let status = match timeout {
        Some(limit) => wait_with_timeout(&mut child, limit).map_err(|e| match e {
            WaitError::Io(e) => Error::Io(e),
            WaitError::Elapsed => Error::Timeout {
                program: program.clone(),
                timeout: limit,
            },
        })?,
        None => child.wait()?,
    };
    let elapsed = start.elapsed();

    let stdout = collect(stdout);
    let stderr = collect(stderr);

    if !status.success() {
        return Err(Error::Subprocess {
            program,
            status: status.to_string(),
            stderr: tail(&stderr, STDERR_TAIL_LINES),
        });
    }

    Ok(ProcessOutput {
        stdout,
        stderr,
        elapsed,
    })
}

enum WaitError {
    Io(std::io::Error),
    Elapsed,
}

fn wait_with_timeout(child: &mut Child, limit: Duration) -> std::result::Result<ExitStatus, WaitError> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait().map_err(WaitError::Io)? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            // The child may have exited between the poll and the kill.
            kill_tree(child);
            let _ = child.wait();
            return Err(WaitError::Elapsed);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Start the child in a process group of its own. Wrapper scripts fork the
/// real encoder, and a timeout has to reach it too.
#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

/// Kill the child and everything in its process group.
#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let group = i32::try_from(child.id()).map(Pid::from_raw);
    if let Ok(group) = group {
        if let Err(e) = killpg(group, Signal::SIGKILL) {
            log::debug!("killpg {group}: {e}");
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

/// Run `git` in `dir` and return its trimmed output, or `None` when git is
/// unavailable or fails.
pub fn run_git(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git").current_dir(dir).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}
