//! Queries about the host kitbash runs on.

use std::path::{Path, PathBuf};
use std::process::Command;

use kitbash_common::error::{KitbashError, Result};
use kitbash_common::types::EngineVersion;

/// The invoking user's account, as mirrored into images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostUser {
    /// Login name.
    pub name: String,
    /// Numeric user id.
    pub uid: u32,
    /// Numeric primary group id.
    pub gid: u32,
    /// Home directory.
    pub dir: PathBuf,
    /// Login shell, empty when unset.
    pub shell: String,
    /// GECOS (full name) field.
    pub gecos: String,
}

/// Looks up the account of the calling process.
///
/// # Errors
///
/// Returns an error if the account database has no entry for the
/// current uid.
#[cfg(target_os = "linux")]
pub fn current_user() -> Result<HostUser> {
    use nix::unistd::{Uid, User};

    let uid = Uid::current();
    let user = User::from_uid(uid)
        .map_err(|e| KitbashError::Config {
            message: format!("cannot read account of uid {uid}: {e}"),
        })?
        .ok_or_else(|| KitbashError::NotFound {
            kind: "host account",
            id: uid.to_string(),
        })?;

    Ok(HostUser {
        name: user.name,
        uid: user.uid.as_raw(),
        gid: user.gid.as_raw(),
        dir: user.dir,
        shell: user.shell.to_string_lossy().into_owned(),
        gecos: user.gecos.to_string_lossy().into_owned(),
    })
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: account lookup requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn current_user() -> Result<HostUser> {
    Err(KitbashError::Config {
        message: "host account lookup requires Linux".into(),
    })
}

/// Returns the numeric id of the calling user, or `0` where unknown.
#[must_use]
pub fn current_uid() -> u32 {
    #[cfg(target_os = "linux")]
    {
        nix::unistd::Uid::current().as_raw()
    }
    #[cfg(not(target_os = "linux"))]
    {
        0
    }
}

/// Returns the home directory of the calling user from `$HOME`.
#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

/// Expands a leading `~` and anchors relative paths at the working
/// directory.
///
/// # Errors
///
/// Returns an error if `~` is used without a home directory, or the
/// working directory cannot be determined.
pub fn absolute_host_path(path: &str) -> Result<PathBuf> {
    let expanded = if path == "~" || path.starts_with("~/") {
        let home = home_dir().ok_or_else(|| KitbashError::Config {
            message: format!("cannot expand '{path}': HOME is not set"),
        })?;
        home.join(path.trim_start_matches('~').trim_start_matches('/'))
    } else {
        PathBuf::from(path)
    };

    if expanded.is_absolute() {
        return Ok(expanded);
    }
    let cwd = std::env::current_dir().map_err(|e| KitbashError::Io {
        path: PathBuf::from("."),
        source: e,
    })?;
    Ok(cwd.join(expanded))
}

/// Queries the server version of the container engine at `binary`.
///
/// Returns `None` when the engine is missing, not running, or reports a
/// version that cannot be parsed.
pub fn engine_version(binary: &Path) -> Option<EngineVersion> {
    let output = match Command::new(binary)
        .args(["version", "--format", "{{.Server.Version}}"])
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!(binary = %binary.display(), error = %e, "engine not runnable");
            return None;
        }
    };
    if !output.status.success() {
        tracing::debug!(binary = %binary.display(), "engine did not report a version");
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let version = text.trim().parse().ok();
    tracing::debug!(?version, "detected engine version");
    version
}
