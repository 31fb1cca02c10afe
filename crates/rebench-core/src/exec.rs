//! Subprocess execution bounded by a per-attempt deadline.
//!
//! Every git call and test command goes through [`run_captured`], which
//! clamps the operation's own timeout to whatever is left of the caller's
//! [`Deadline`] and keeps any output produced before a timeout kill.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::Instant;

/// Single cancellation point for one evaluation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// No overall limit; only per-operation timeouts apply.
    pub fn none() -> Self {
        Self { at: None }
    }

    pub fn after(budget: Duration) -> Self {
        Self {
            at: Some(Instant::now() + budget),
        }
    }

    pub fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    /// Time left, or `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    /// The smaller of `timeout` and the time left.
    pub fn clamp(&self, timeout: Duration) -> Duration {
        match self.remaining() {
            Some(left) => left.min(timeout),
            None => timeout,
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

/// Captured result of a subprocess.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// `None` when the process was killed (timeout or signal).
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        out
    }
}

/// Build a `sh -c <script>` command rooted at `dir`.
pub fn shell(script: &str, dir: &std::path::Path) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script).current_dir(dir);
    cmd
}

/// Run `cmd` to completion or until `limit` elapses.
///
/// On timeout the child is killed and whatever it wrote so far is returned
/// with `timed_out` set. Spawn failures are the only error.
pub async fn run_captured(mut cmd: Command, limit: Duration) -> std::io::Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd.spawn()?;
    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();

    let finished = tokio::time::timeout(limit, async {
        let (out, err) = tokio::join!(
            drain(stdout.as_mut(), &mut out_buf),
            drain(stderr.as_mut(), &mut err_buf)
        );
        out?;
        err?;
        child.wait().await
    })
    .await;

    let (exit_code, timed_out) = match finished {
        Ok(status) => (status?.code(), false),
        Err(_elapsed) => {
            // Descendants that inherited the pipes may outlive the shell;
            // we stop reading either way.
            child.start_kill().ok();
            (None, true)
        }
    };

    Ok(CommandOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&out_buf).into_owned(),
        stderr: String::from_utf8_lossy(&err_buf).into_owned(),
        timed_out,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Read until EOF in small chunks so a cancelled read keeps what it got.
async fn drain<R: AsyncRead + Unpin>(reader: Option<&mut R>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    let Some(reader) = reader else {
        return Ok(());
    };
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
