// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plugin registry (§4.6): an ordered list of driver descriptors,
//! populated by explicit registration (no reflection), plus optional
//! dynamic loading of shared-library modules behind the
//! `dynamic-modules` feature.

use crate::config::Config;
use crate::driver::null_driver::NullDriver;
use crate::driver::DriverOps;
use std::sync::Arc;

/// Ordered collection of registered drivers.
///
/// Order matters for two things: `enumerate` preserves it when no
/// `driver=` filter narrows the result, and the built-in `null` driver
/// is always registered first so "more than the built-in null driver
/// is registered" (§4.7 step 4) is a simple length check.
#[derive(Clone)]
pub struct Registry {
    drivers: Vec<Arc<dyn DriverOps>>,
    #[cfg(feature = "dynamic-modules")]
    _loaded_libraries: Vec<Arc<libloading::Library>>,
}

impl Registry {
    /// A registry with only the built-in `null` driver.
    pub fn new() -> Self {
        Self {
            drivers: vec![Arc::new(NullDriver::new())],
            #[cfg(feature = "dynamic-modules")]
            _loaded_libraries: Vec::new(),
        }
    }

    /// Register `driver`. Each descriptor is added once; a duplicate
    /// name is an error rather than a silent overwrite, since two
    /// drivers racing to own the same name would otherwise corrupt
    /// `make`'s driver-name filter.
    pub fn register(&mut self, driver: Arc<dyn DriverOps>) -> crate::error::Result<()> {
        if self.drivers.iter().any(|d| d.name() == driver.name()) {
            return Err(crate::error::Error::AlreadyRegistered(driver.name().to_string()));
        }
        self.drivers.push(driver);
        Ok(())
    }

    pub fn drivers(&self) -> &[Arc<dyn DriverOps>] {
        &self.drivers
    }

    /// Registered drivers beyond the built-in `null` one.
    pub fn has_real_drivers(&self) -> bool {
        self.drivers.len() > 1
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<dyn DriverOps>> {
        self.drivers.iter().find(|d| d.name() == name).cloned()
    }

    /// Scan `config`'s module search paths for shared-library modules
    /// and load each one, invoking its exported registration symbol.
    /// A module that fails to load or register is logged and skipped
    /// (§4.7: "a single failing driver must be logged and must not
    /// stop the others").
    #[cfg(feature = "dynamic-modules")]
    pub fn load_modules(&mut self, config: &Config) {
        for dir in &config.module_search_paths {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(err) => {
                    log::debug!("radiohal: module search path {} unreadable: {err}", dir.display());
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !is_shared_library(&path) {
                    continue;
                }
                if let Err(err) = self.load_module(&path) {
                    log::warn!("radiohal: failed to load module {}: {err}", path.display());
                }
            }
        }
    }

    #[cfg(feature = "dynamic-modules")]
    fn load_module(&mut self, path: &std::path::Path) -> Result<(), libloading::Error> {
        const REGISTER_SYMBOL: &[u8] = b"radiohal_register_driver\0";

        // SAFETY: the loaded module is required by convention to
        // export `radiohal_register_driver` with the signature below
        // and to be a well-formed dynamic library for this platform.
        unsafe {
            let library = libloading::Library::new(path)?;
            let register: libloading::Symbol<extern "C" fn(&mut Registry)> =
                library.get(REGISTER_SYMBOL)?;
            register(self);
            self._loaded_libraries.push(Arc::new(library));
        }
        Ok(())
    }

    #[cfg(not(feature = "dynamic-modules"))]
    pub fn load_modules(&mut self, _config: &Config) {}
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "dynamic-modules")]
fn is_shared_library(path: &std::path::Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("so") | Some("dylib") | Some("dll")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Args;
    use crate::driver::{DeviceInfo, DriverHandle, GainRange, RxCallback, StreamingState, TxCallback};
    use crate::error::Result;
    use crate::types::Direction;

    struct StubDriver(&'static str);
    struct StubHandle;
    impl DriverHandle for StubHandle {
        fn hardware_key(&self) -> String {
            "stub".into()
        }
    }
    impl DriverOps for StubDriver {
        fn name(&self) -> &'static str {
            self.0
        }
        fn find(&self, _args: &Args) -> Result<Vec<DeviceInfo>> {
            Ok(vec![])
        }
        fn open(&self, _args: &Args) -> Result<Box<dyn DriverHandle>> {
            Ok(Box::new(StubHandle))
        }
        fn close(&self, _dev: &mut dyn DriverHandle) -> Result<()> {
            Ok(())
        }
        fn is_streaming(&self, _dev: &dyn DriverHandle, _direction: Direction) -> Result<StreamingState> {
            Ok(StreamingState::NotStreaming)
        }
        fn start_rx(&self, _dev: &dyn DriverHandle, _callback: RxCallback) -> Result<()> {
            Ok(())
        }
        fn stop_rx(&self, _dev: &dyn DriverHandle) -> Result<()> {
            Ok(())
        }
        fn start_tx(&self, _dev: &dyn DriverHandle, _callback: TxCallback) -> Result<()> {
            Ok(())
        }
        fn stop_tx(&self, _dev: &dyn DriverHandle) -> Result<()> {
            Ok(())
        }
        fn set_frequency(&self, _dev: &dyn DriverHandle, _component: &str, _hz: f64) -> Result<()> {
            Ok(())
        }
        fn get_frequency(&self, _dev: &dyn DriverHandle, _component: &str) -> Result<f64> {
            Ok(0.0)
        }
        fn list_frequencies(&self, _dev: &dyn DriverHandle, _direction: Direction) -> Vec<&'static str> {
            vec![]
        }
        fn set_sample_rate(&self, _dev: &dyn DriverHandle, _rate: f64) -> Result<()> {
            Ok(())
        }
        fn set_bandwidth(&self, _dev: &dyn DriverHandle, _hz: f64) -> Result<()> {
            Ok(())
        }
        fn list_gains(&self, _dev: &dyn DriverHandle, _direction: Direction) -> Vec<&'static str> {
            vec![]
        }
        fn gain_range(&self, _dev: &dyn DriverHandle, _element: &str) -> Result<GainRange> {
            Ok(GainRange { min: 0.0, max: 0.0, step: 1.0 })
        }
        fn set_element_gain(&self, _dev: &dyn DriverHandle, _element: &str, _value: f64) -> Result<()> {
            Ok(())
        }
        fn set_antenna(&self, _dev: &dyn DriverHandle, _direction: Direction, _name: &str) -> Result<()> {
            Ok(())
        }
        fn set_amp_enable(&self, _dev: &dyn DriverHandle, _enable: bool) -> Result<()> {
            Ok(())
        }
        fn tuner_name(&self, _dev: &dyn DriverHandle) -> Result<String> {
            Ok("stub".into())
        }
        fn stream_formats(&self, _direction: Direction) -> Vec<&'static str> {
            vec!["CS8"]
        }
    }

    #[test]
    fn new_registry_has_only_null_driver() {
        let registry = Registry::new();
        assert_eq!(registry.drivers().len(), 1);
        assert!(!registry.has_real_drivers());
        assert!(registry.find_by_name("null").is_some());
    }

    #[test]
    fn registering_a_real_driver_is_visible_and_counted() {
        let mut registry = Registry::new();
        registry.register(Arc::new(StubDriver("stub"))).unwrap();
        assert!(registry.has_real_drivers());
        assert!(registry.find_by_name("stub").is_some());
    }

    #[test]
    fn registering_duplicate_name_fails() {
        let mut registry = Registry::new();
        registry.register(Arc::new(StubDriver("stub"))).unwrap();
        let err = registry.register(Arc::new(StubDriver("stub"))).unwrap_err();
        assert!(matches!(err, crate::error::Error::AlreadyRegistered(_)));
    }
}
