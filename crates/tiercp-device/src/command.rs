//! Bounded external command execution
//!
//! Detection steps that shell out to system tools go through [`run_captured`],
//! which never fails: a missing binary, a non-zero exit or a timeout all become
//! [`Detection::Inconclusive`].

use std::time::Duration;
use tiercp_types::Detection;
use tokio::process::Command;
use tracing::{debug, trace};

/// Hide the console window of spawned tools on Windows
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Run `program` with `args`, returning its stdout when it exits successfully
pub async fn run_captured(program: &str, args: &[&str], timeout: Duration) -> Detection<String> {
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    #[cfg(windows)]
    command.creation_flags(CREATE_NO_WINDOW);

    trace!("Running {} {:?}", program, args);
    match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) if output.status.success() => {
            Detection::Found(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(Ok(output)) => {
            debug!("{} exited with {}", program, output.status);
            Detection::inconclusive(format!("{program} exited with {}", output.status))
        }
        Ok(Err(e)) => {
            debug!("Failed to spawn {}: {}", program, e);
            Detection::inconclusive(format!("failed to spawn {program}: {e}"))
        }
        Err(_) => {
            debug!("{} timed out after {:?}", program, timeout);
            Detection::inconclusive(format!("{program} timed out"))
        }
    }
}
