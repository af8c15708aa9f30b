//! OS launcher: browser navigation through `webbrowser`, applications through the
//! platform's shell opener. Child processes are detached, never awaited.

use std::process::{Command, Stdio};

use tracing::info;

use crate::error::{AegisError, AegisResult};
use crate::ports::Launcher;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl SystemLauncher {
    pub fn new() -> Self {
        Self
    }
}

fn spawn_detached(mut cmd: Command, what: &str) -> AegisResult<()> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|e| AegisError::Launch(format!("{what}: {e}")))
}

#[cfg(target_os = "windows")]
fn open_command(target: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", "start", "", target]);
    cmd
}

#[cfg(target_os = "macos")]
fn open_command(target: &str) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(target);
    cmd
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn open_command(target: &str) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(target);
    cmd
}

#[cfg(target_os = "macos")]
fn by_name_command(name: &str) -> Command {
    let mut cmd = Command::new("open");
    cmd.args(["-a", name]);
    cmd
}

#[cfg(not(target_os = "macos"))]
fn by_name_command(name: &str) -> Command {
    if cfg!(target_os = "windows") {
        open_command(name)
    } else {
        Command::new(name)
    }
}

/// Protocol strings (`spotify:`, `ms-calculator:`) go through the opener, not exec.
fn is_protocol(target: &str) -> bool {
    match target.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

impl Launcher for SystemLauncher {
    fn open_url(&self, url: &str) -> AegisResult<()> {
        info!(target: "aegis::launcher", "Opening browser at {}", url);
        webbrowser::open(url).map_err(|e| AegisError::Launch(format!("{url}: {e}")))
    }

    fn launch_target(&self, target: &str) -> AegisResult<()> {
        let looks_like_bundle = target.ends_with(".app");
        let cmd = if cfg!(target_os = "windows") || is_protocol(target) || looks_like_bundle {
            open_command(target)
        } else {
            Command::new(target)
        };
        spawn_detached(cmd, target)
    }

    fn launch_by_name(&self, name: &str) -> AegisResult<()> {
        info!(target: "aegis::launcher", "Best-effort launch of '{}'", name);
        spawn_detached(by_name_command(name), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_detection() {
        assert!(is_protocol("spotify:"));
        assert!(is_protocol("ms-calculator:"));
        assert!(!is_protocol(r"C:\Program Files\app.exe"));
        assert!(!is_protocol("/usr/bin/gedit"));
        assert!(!is_protocol("gedit"));
    }

    #[cfg(unix)]
    #[test]
    fn unknown_binary_reports_launch_error() {
        let err = SystemLauncher::new()
            .launch_target("/nonexistent/aegis-launch-test")
            .unwrap_err();
        assert!(matches!(err, AegisError::Launch(_)));
    }
}
