//! RG-020: SSH execution transport.
//!
//! Uses the `ssh` binary directly — no libssh2 dependency.
//! Script is piped to stdin (not passed as argument) to avoid
//! argument length limits and injection vectors; staged-asset payloads
//! can also exceed what an argv can carry.

use super::ExecOutput;
use crate::core::types::Target;
use std::io::Write;
use std::process::{Command, Stdio};

/// Execute a shell script on a remote target via SSH.
pub fn exec_ssh(target: &Target, script: &str) -> Result<ExecOutput, String> {
    let mut cmd = Command::new("ssh");
    cmd.args(["-o", "BatchMode=yes"])
        .args(["-o", "ConnectTimeout=5"])
        .args(["-o", "StrictHostKeyChecking=accept-new"]);

    if let Some(ref key) = target.ssh_key {
        cmd.args(["-i", &expand_home(key)]);
    }

    cmd.arg(format!("{}@{}", target.user, target.addr))
        .arg("bash")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| format!("failed to spawn ssh to {}: {}", target.addr, e))?;

    if let Some(ref mut stdin) = child.stdin {
        stdin
            .write_all(script.as_bytes())
            .map_err(|e| format!("stdin write error: {}", e))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| format!("ssh wait error: {}", e))?;

    Ok(ExecOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Expand a leading `~/` to the home directory.
fn expand_home(key: &str) -> String {
    if let Some(rest) = key.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return format!("{}/{}", home, rest);
        }
    }
    key.to_string()
}
