//! Launch-command resolution for discovered plugins.
//!
//! A pre-built JavaScript bundle runs under `node`; a TypeScript source
//! entry runs under a transpiling launcher when one is resolvable on
//! `PATH`; anything else is executed directly by the platform.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::discovery::DiscoveredPlugin;
use crate::error::{HostError, Result};

/// Development-mode TypeScript launchers, in preference order.
const TS_LAUNCHERS: [&str; 2] = ["tsx", "ts-node"];

/// A fully-resolved child process invocation.
#[derive(Debug, Clone)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory: the plugin root.
    pub cwd: PathBuf,
}

/// Resolve how to run a plugin's entry artifact.
pub fn resolve_launch(plugin: &DiscoveredPlugin) -> Result<LaunchCommand> {
    let entry = plugin.path.join(&plugin.entry);
    let entry_str = entry.to_string_lossy().into_owned();
    let extension = entry.extension().and_then(OsStr::to_str).unwrap_or("");

    let command = match extension {
        "js" | "cjs" | "mjs" => LaunchCommand {
            program: "node".into(),
            args: vec![entry_str],
            cwd: plugin.path.clone(),
        },
        "ts" => {
            let launcher = TS_LAUNCHERS
                .iter()
                .find_map(|name| find_on_path(name))
                .ok_or_else(|| HostError::Spawn {
                    name: plugin.name.clone(),
                    message: format!(
                        "no TypeScript launcher ({}) on PATH for entry {}",
                        TS_LAUNCHERS.join(", "),
                        plugin.entry
                    ),
                })?;
            LaunchCommand {
                program: launcher.to_string_lossy().into_owned(),
                args: vec![entry_str],
                cwd: plugin.path.clone(),
            }
        }
        _ => LaunchCommand {
            program: entry_str,
            args: Vec::new(),
            cwd: plugin.path.clone(),
        },
    };

    Ok(command)
}

/// Locate an auxiliary executable bundled with a plugin.
///
/// Resolution order: the plugin's own `binaries/` directory, then the
/// host-bundled directory when one is given, then the system `PATH`.
pub fn resolve_auxiliary(
    plugin_root: &Path,
    host_dir: Option<&Path>,
    name: &str,
) -> Option<PathBuf> {
    let bundled = plugin_root.join("binaries").join(name);
    if bundled.is_file() {
        return Some(bundled);
    }
    if let Some(dir) = host_dir {
        let hosted = dir.join(name);
        if hosted.is_file() {
            return Some(hosted);
        }
    }
    find_on_path(name)
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}
