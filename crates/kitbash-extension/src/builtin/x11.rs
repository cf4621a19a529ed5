//! X11 display forwarding.
//!
//! Shares the host X socket and an X authority file whose entries are
//! rewritten to the wildcard address family, so the cookie matches from
//! inside the container's network namespace.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use clap::{Arg, ArgAction};
use kitbash_common::error::{KitbashError, Result};
use kitbash_common::types::Arguments;

use super::quote;
use crate::extension::{Extension, precondition_error};
use crate::host;

/// Argument overriding the X authority file location.
pub const XAUTH_PATH_ARG: &str = "xauth_path";

/// Forwards the host X server into the container.
#[derive(Debug, Clone, Copy, Default)]
pub struct X11;

/// Creates the extension.
pub fn factory() -> Box<dyn Extension> {
    Box::new(X11)
}

impl X11 {
    /// Returns the X authority file used for this activation.
    #[must_use]
    pub fn xauth_path(args: &Arguments) -> PathBuf {
        args.text(XAUTH_PATH_ARG).map_or_else(
            || std::env::temp_dir().join(format!(".kitbash-{}.xauth", host::current_uid())),
            PathBuf::from,
        )
    }

    fn merge_cookies(&self, path: &std::path::Path) -> Result<()> {
        let Some(display) = std::env::var_os("DISPLAY") else {
            tracing::warn!("DISPLAY is not set, X authority file left empty");
            return Ok(());
        };
        let Ok(xauth) = which::which("xauth") else {
            tracing::warn!("xauth not found, X authority file left empty");
            return Ok(());
        };

        let listed = Command::new(&xauth)
            .arg("nlist")
            .arg(&display)
            .output()
            .map_err(|e| precondition_error(self.name(), format!("xauth nlist: {e}")))?;
        if !listed.status.success() {
            tracing::warn!(status = ?listed.status.code(), "xauth nlist failed, X authority file left empty");
            return Ok(());
        }
        let cookies = wildcard_family(&String::from_utf8_lossy(&listed.stdout));

        let mut merge = Command::new(&xauth)
            .arg("-f")
            .arg(path)
            .args(["nmerge", "-"])
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| precondition_error(self.name(), format!("xauth nmerge: {e}")))?;
        if let Some(mut stdin) = merge.stdin.take() {
            stdin
                .write_all(cookies.as_bytes())
                .map_err(|e| precondition_error(self.name(), format!("xauth nmerge: {e}")))?;
        }
        let status = merge
            .wait()
            .map_err(|e| precondition_error(self.name(), format!("xauth nmerge: {e}")))?;
        if !status.success() {
            return Err(precondition_error(
                self.name(),
                format!("xauth nmerge exited with {status}"),
            ));
        }
        Ok(())
    }
}

/// Replaces the address family of every `xauth nlist` entry with `ffff`.
fn wildcard_family(listing: &str) -> String {
    listing
        .lines()
        .filter_map(|line| line.get(4..).filter(|rest| !rest.is_empty()))
        .map(|rest| format!("ffff{rest}\n"))
        .collect()
}

impl Extension for X11 {
    fn name(&self) -> &'static str {
        "x11"
    }

    fn description(&self) -> &'static str {
        "Enable X11 display forwarding"
    }

    fn arguments(&self) -> Vec<Arg> {
        vec![
            Arg::new(self.name())
                .long(self.name())
                .action(ArgAction::SetTrue)
                .help(self.description()),
            Arg::new(XAUTH_PATH_ARG)
                .long("xauth-path")
                .value_name("FILE")
                .help("X authority file shared with the container"),
        ]
    }

    fn precondition(&self, args: &Arguments) -> Result<()> {
        let path = Self::xauth_path(args);
        let _ = std::fs::File::create(&path).map_err(|e| KitbashError::Io {
            path: path.clone(),
            source: e,
        })?;
        self.merge_cookies(&path)?;
        tracing::info!(path = %path.display(), "prepared X authority file");
        Ok(())
    }

    fn docker_run_args(&self, args: &Arguments) -> Result<String> {
        let xauth = Self::xauth_path(args).display().to_string();
        let env = quote(&format!("XAUTHORITY={xauth}"));
        let mount = quote(&format!("{xauth}:{xauth}"));
        Ok(format!(
            " -e DISPLAY -e TERM   -e QT_X11_NO_MITSHM=1   -e {env} -v {mount}   -v /tmp/.X11-unix:/tmp/.X11-unix   -v /etc/localtime:/etc/localtime:ro "
        ))
    }

    fn cleanup(&self, args: &Arguments) -> Result<()> {
        let path = Self::xauth_path(args);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed X authority file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KitbashError::Io { path, source: e }),
        }
    }
}
