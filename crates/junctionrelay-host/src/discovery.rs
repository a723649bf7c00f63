//! Plugin discovery: scan a root directory for collector plugin folders.
//!
//! Three locations are probed, in order:
//!
//! 1. every immediate subdirectory of the root;
//! 2. `<root>/node_modules/@junctionrelay/plugin-*`;
//! 3. `<root>/node_modules/junctionrelay-plugin-*`.
//!
//! A candidate qualifies when its `package.json` carries a
//! `junctionrelay` block with `type == "collector"`. Unreadable or
//! unparseable manifests are skipped silently; a missing or non-directory
//! root yields an empty list, never an error.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Manifest file name at a plugin root.
pub const MANIFEST_FILE: &str = "package.json";

const DEFAULT_VERSION: &str = "0.0.0";
const DEFAULT_ENTRY: &str = "index.ts";

/// A plugin located on disk, ready to launch.
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    /// Package name, or the directory basename when the manifest has none.
    pub name: String,
    /// Package version, or `"0.0.0"`.
    pub version: String,
    /// Absolute path of the plugin root.
    pub path: PathBuf,
    /// Path of the runnable artifact, relative to the plugin root.
    pub entry: String,
    /// The raw `junctionrelay` manifest block.
    pub manifest: Value,
}

#[derive(Debug, Deserialize)]
struct PackageManifest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    main: Option<String>,
    #[serde(default)]
    junctionrelay: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CollectorBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    entry: Option<String>,
}

/// Scan `root` for collector plugins.
pub fn discover_plugins(root: &Path) -> Vec<DiscoveredPlugin> {
    let mut found = Vec::new();

    probe(root, &mut found, |_| true);
    probe(
        &root.join("node_modules").join("@junctionrelay"),
        &mut found,
        |name| name.starts_with("plugin-"),
    );
    probe(&root.join("node_modules"), &mut found, |name| {
        name.starts_with("junctionrelay-plugin-")
    });

    found
}

/// Read one plugin root directly, bypassing the scan.
pub fn load_plugin(dir: &Path) -> Option<DiscoveredPlugin> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let raw = match std::fs::read_to_string(&manifest_path) {
        Ok(raw) => raw,
        Err(err) => {
            debug!(path = %manifest_path.display(), error = %err, "skipping: unreadable manifest");
            return None;
        }
    };
    let pkg: PackageManifest = match serde_json::from_str(&raw) {
        Ok(pkg) => pkg,
        Err(err) => {
            debug!(path = %manifest_path.display(), error = %err, "skipping: malformed manifest");
            return None;
        }
    };

    let block = pkg.junctionrelay?;
    let collector: CollectorBlock = serde_json::from_value(block.clone()).ok()?;
    if collector.kind != "collector" {
        debug!(path = %dir.display(), kind = %collector.kind, "skipping: not a collector");
        return None;
    }

    let name = pkg
        .name
        .unwrap_or_else(|| dir_basename(dir).unwrap_or_else(|| "unnamed".into()));
    Some(DiscoveredPlugin {
        name,
        version: pkg.version.unwrap_or_else(|| DEFAULT_VERSION.into()),
        path: dir.to_path_buf(),
        entry: collector
            .entry
            .or(pkg.main)
            .unwrap_or_else(|| DEFAULT_ENTRY.into()),
        manifest: block,
    })
}

fn probe(dir: &Path, out: &mut Vec<DiscoveredPlugin>, keep: impl Fn(&str) -> bool) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !keep(name) {
            continue;
        }
        if let Some(plugin) = load_plugin(&path) {
            debug!(name = %plugin.name, path = %plugin.path.display(), "discovered plugin");
            out.push(plugin);
        }
    }
}

fn dir_basename(dir: &Path) -> Option<String> {
    dir.file_name().map(|n| n.to_string_lossy().into_owned())
}
