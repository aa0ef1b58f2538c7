//! RG-019/020: Transport abstraction — local and SSH execution.

pub mod local;
pub mod ssh;

use crate::core::types::Target;

/// Output from executing a script on a target.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Execute a guarded shell script on a target.
/// Dispatches to local or SSH based on address.
pub fn exec_script(target: &Target, script: &str) -> Result<ExecOutput, String> {
    if is_local_addr(&target.addr) {
        local::exec_local(script)
    } else {
        ssh::exec_ssh(target, script)
    }
}

/// Execute a read-only query (verify/drift paths).
pub fn query(target: &Target, cmd: &str) -> Result<ExecOutput, String> {
    exec_script(target, cmd)
}

/// Check if an address is this machine.
fn is_local_addr(addr: &str) -> bool {
    if addr == "127.0.0.1" || addr == "localhost" || addr == "::1" {
        return true;
    }
    // Check hostname
    if let Ok(hostname) = std::fs::read_to_string("/etc/hostname") {
        if addr == hostname.trim() {
            return true;
        }
    }
    false
}
