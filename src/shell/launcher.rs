//! Panel launchers
//!
//! A launcher's `path` is a whitespace separated command line that may be
//! prefixed with `NAME=VALUE` environment assignments. Activation spawns the
//! program detached; exited children are reaped from the SIGCHLD handler.

use crate::shell::render::{self, Canvas};
use image::RgbaImage;
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::ffi::{OsStr, OsString};
use std::process::Command;
use tessera_ipc::Rectangle;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("launcher has no program")]
    NoProgram,

    #[error("exec '{program}' failed: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Parsed launcher command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Program path followed by its arguments
    pub argv: Vec<String>,
    /// Full environment, inherited entries first, in order
    pub envp: Vec<(OsString, OsString)>,
}

impl LaunchSpec {
    /// Parse against the current process environment
    pub fn parse(path: &str) -> Self {
        Self::parse_with_env(path, std::env::vars_os().collect())
    }

    /// Parse against an explicit inherited environment
    pub fn parse_with_env(path: &str, inherited: Vec<(OsString, OsString)>) -> Self {
        let mut envp = inherited;
        let mut argv: Vec<String> = Vec::new();

        for token in path.split_whitespace() {
            // Assignments only count before the program
            let assignment = match token.split_once('=') {
                Some((name, value)) if argv.is_empty() && !name.is_empty() => Some((name, value)),
                _ => None,
            };

            let Some((name, value)) = assignment else {
                argv.push(token.to_string());
                continue;
            };

            match envp.iter_mut().find(|(inherited, _)| inherited.as_os_str() == OsStr::new(name)) {
                Some(entry) => entry.1 = OsString::from(value),
                None => envp.push((OsString::from(name), OsString::from(value))),
            }
        }

        Self { argv, envp }
    }

    /// Start the program as a detached child, returning its pid
    pub fn spawn(&self) -> Result<u32, LaunchError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or(LaunchError::NoProgram)?;

        let child = Command::new(program)
            .args(args)
            .env_clear()
            .envs(self.envp.iter().map(|(name, value)| (name, value)))
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Not waited on here; the SIGCHLD handler reaps it
        Ok(child.id())
    }
}

/// One icon on the panel
pub struct Launcher {
    icon: RgbaImage,
    path: String,
    spec: LaunchSpec,
    allocation: Rectangle,
    pub focused: bool,
    pub pressed: bool,
}

impl Launcher {
    pub fn new(icon_path: &str, path: &str) -> Self {
        Self::with_icon(render::load_icon_or_fallback(icon_path), path)
    }

    pub fn with_icon(icon: RgbaImage, path: &str) -> Self {
        Self {
            icon,
            path: path.to_string(),
            spec: LaunchSpec::parse(path),
            allocation: Rectangle::default(),
            focused: false,
            pressed: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    /// Basename of the program, shown while the launcher is hovered
    pub fn tooltip(&self) -> &str {
        let program = self.spec.argv.first().map_or(self.path.as_str(), String::as_str);
        program.rsplit('/').next().unwrap_or(program)
    }

    pub fn icon_size(&self) -> (i32, i32) {
        (self.icon.width() as i32, self.icon.height() as i32)
    }

    pub fn allocation(&self) -> Rectangle {
        self.allocation
    }

    pub fn set_allocation(&mut self, allocation: Rectangle) {
        self.allocation = allocation;
    }

    /// Launch the program. Failures are logged, never fatal.
    pub fn activate(&self) {
        match self.spec.spawn() {
            Ok(pid) => info!("Launched {:?} (pid {})", self.path, pid),
            Err(e) => error!("{}", e),
        }
    }

    pub fn paint(&self, canvas: &mut Canvas) {
        let mut x = self.allocation.x;
        let mut y = self.allocation.y;
        if self.pressed {
            x += 1;
            y += 1;
        }

        canvas.draw_image(&self.icon, x, y);
        if self.focused {
            canvas.highlight(&self.icon, x, y, 0.4);
        }
    }
}

/// Reap every exited child without blocking
pub fn reap_children() {
    loop {
        match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => break,
            Ok(WaitStatus::Exited(pid, status)) => {
                info!("Child {} exited with status {}", pid, status);
            }
            Ok(WaitStatus::Signaled(pid, signal, _)) => {
                info!("Child {} killed by {:?}", pid, signal);
            }
            Ok(other) => debug!("Child status: {:?}", other),
            Err(Errno::ECHILD) => break,
            Err(e) => {
                warn!("waitpid failed: {}", e);
                break;
            }
        }
    }
}
