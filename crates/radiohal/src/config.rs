// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Factory-wide tunables: module search paths and ring defaults.
//! Callers construct a `Config` and hand it to [`crate::factory::Factory`];
//! there is no config file format, since none is named in the spec.

use std::path::PathBuf;

/// Default ring depth (§3 `buf_count`) when `setup_stream` isn't given
/// an explicit `buffers` argument.
pub const DEFAULT_RING_BUFFERS: usize = 16;

/// Default ring slot size in bytes (§3 `buf_len`) when `setup_stream`
/// isn't given an explicit `bufflen` argument.
pub const DEFAULT_RING_SLOT_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directories scanned for dynamically-loaded driver modules (§4.6).
    pub module_search_paths: Vec<PathBuf>,
    pub default_ring_buffers: usize,
    pub default_ring_slot_bytes: usize,
}

impl Default for Config {
    /// The current directory and `./Modules`, matching §4.6's default
    /// search path.
    fn default() -> Self {
        Self {
            module_search_paths: vec![PathBuf::from("."), PathBuf::from("./Modules")],
            default_ring_buffers: DEFAULT_RING_BUFFERS,
            default_ring_slot_bytes: DEFAULT_RING_SLOT_BYTES,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_search_path_includes_cwd_and_modules_dir() {
        let config = Config::default();
        assert!(config.module_search_paths.contains(&PathBuf::from(".")));
        assert!(config.module_search_paths.contains(&PathBuf::from("./Modules")));
    }
}
