// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware config file resolution.

use std::path::PathBuf;

const CONFIG_FILE: &str = "config.json";

/// Return the application config directory. Not created; the file is optional.
pub fn config_dir() -> PathBuf {
    dirs_fallback().join("lesewerk")
}

/// Config file read when `--config` is not given, if it exists.
pub fn default_config_file() -> Option<PathBuf> {
    let path = config_dir().join(CONFIG_FILE);
    path.is_file().then_some(path)
}

fn dirs_fallback() -> PathBuf {
    // Try XDG config dir, then fallback to home
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config");
    }
    // Last resort
    PathBuf::from(".")
}
