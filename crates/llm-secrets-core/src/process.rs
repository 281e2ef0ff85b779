//! Process utilities

use std::io;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

const EXEC_BUSY_RETRY_ATTEMPTS: usize = 20;
const EXEC_BUSY_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Check whether an external binary can be started and reports success
/// for `--version`. Never fails: a missing binary or a non-zero exit is
/// simply `false`.
pub fn probe(binary: &str) -> bool {
    retry_exec_busy(|| {
        Command::new(binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
    })
    .map(|status| status.success())
    .unwrap_or(false)
}

/// Run a process-spawning operation, retrying while the executable is
/// still open for writing elsewhere (ETXTBSY).
pub fn retry_exec_busy<T, F>(mut operation: F) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    let mut last_error = None;
    for attempt in 0..EXEC_BUSY_RETRY_ATTEMPTS {
        match operation() {
            Ok(value) => return Ok(value),
            Err(error) if is_exec_busy(&error) && attempt + 1 < EXEC_BUSY_RETRY_ATTEMPTS => {
                last_error = Some(error);
                thread::sleep(EXEC_BUSY_RETRY_DELAY);
            }
            Err(error) => return Err(error),
        }
    }

    Err(last_error.unwrap_or_else(|| io::Error::other("command execution failed")))
}

fn is_exec_busy(error: &io::Error) -> bool {
    // ETXTBSY is 26 on Linux and macOS
    error.raw_os_error() == Some(26)
}
