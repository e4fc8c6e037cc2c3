// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Device factory (§4.7): reference-counted, argument-hashed dedup of
//! `Device` instances, plus parallel driver enumeration.

use crate::args::Args;
use crate::config::Config;
use crate::device::Device;
use crate::driver::registry::Registry;
use crate::driver::session::SessionTable;
use crate::driver::DeviceInfo;
use crate::error::{Error, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

struct Entry {
    device: Arc<Device>,
    refcount: usize,
}

/// Owns the driver [`Registry`], the process-wide [`SessionTable`], and
/// the table of live devices keyed by their discovered-args markup.
///
/// The table itself is a [`DashMap`] so concurrent `make`/`unmake` calls
/// for *different* keys don't serialize on each other; step 5's "release
/// and re-acquire the lock around construction" is modeled by dropping
/// the table entirely during driver I/O and only touching it again to
/// insert the finished device.
pub struct Factory {
    registry: Mutex<Registry>,
    sessions: SessionTable,
    config: Config,
    devices: DashMap<String, Entry>,
}

impl Factory {
    pub fn new(config: Config) -> Self {
        let mut registry = Registry::new();
        registry.load_modules(&config);
        Self {
            registry: Mutex::new(registry),
            sessions: SessionTable::new(),
            config,
            devices: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Mutex<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// §4.7 `enumerate`: run every registered driver's `find` concurrently
    /// (respecting a `driver=` filter in `args`), tag each result with the
    /// driver's name, and concatenate. A driver whose `find` fails is
    /// logged and skipped rather than failing the whole call.
    pub fn enumerate(&self, args: &Args) -> Vec<DeviceInfo> {
        let filter = args.get("driver").map(str::to_string);
        let drivers: Vec<_> = self
            .registry
            .lock()
            .drivers()
            .iter()
            .filter(|d| filter.as_deref().is_none_or(|want| d.name() == want))
            .cloned()
            .collect();

        let mut results = Vec::new();
        std::thread::scope(|scope| {
            let handles: Vec<_> = drivers
                .iter()
                .map(|driver| {
                    let driver = Arc::clone(driver);
                    let args = args.clone();
                    scope.spawn(move || {
                        let name = driver.name();
                        match driver.find(&args) {
                            Ok(found) => found
                                .into_iter()
                                .map(|mut info| {
                                    info.args.insert("driver", name);
                                    info
                                })
                                .collect::<Vec<_>>(),
                            Err(err) => {
                                log::warn!("radiohal: driver '{name}' find failed: {err}");
                                Vec::new()
                            }
                        }
                    })
                })
                .collect();
            for handle in handles {
                if let Ok(found) = handle.join() {
                    results.extend(found);
                }
            }
        });
        results
    }

    /// §4.7 `make`.
    pub fn make(&self, args: &Args) -> Result<Arc<Device>> {
        let requested_key = args.serialize();
        if let Some(mut entry) = self.devices.get_mut(&requested_key) {
            entry.refcount += 1;
            return Ok(Arc::clone(&entry.device));
        }

        let discovered = self
            .enumerate(args)
            .into_iter()
            .next()
            .map(|info| info.args)
            .unwrap_or_else(|| args.clone());
        let discovered_key = discovered.serialize();

        if let Some(mut entry) = self.devices.get_mut(&discovered_key) {
            entry.refcount += 1;
            return Ok(Arc::clone(&entry.device));
        }

        let mut merged = discovered;
        merged.merge_missing_from(args);

        // The driver pick is gated on the caller's own filter, not on
        // whatever "driver" key enumerate's discovered args happened to
        // tag the result with — otherwise the always-present null
        // driver's own descriptor could silently resolve an ambiguous
        // unfiltered `make` instead of failing it.
        let registry = self.registry.lock().clone();
        let driver = match args.get("driver") {
            Some(name) => registry
                .find_by_name(name)
                .ok_or(Error::NoMatchingDriver)?,
            None if !registry.has_real_drivers() => {
                registry.find_by_name("null").ok_or(Error::NoMatchingDriver)?
            }
            None => return Err(Error::NoMatchingDriver),
        };

        let driver_name = driver.name();
        let session = self.sessions.acquire(driver_name, || {
            log::debug!("radiohal: driver '{driver_name}' session started");
        });
        let handle = driver.open(&merged)?;
        let device = Arc::new(Device::new(driver, driver_name, merged, handle, session));

        match self.devices.entry(discovered_key) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                occupied.get_mut().refcount += 1;
                device.dispose();
                Ok(Arc::clone(&occupied.get().device))
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Entry { device: Arc::clone(&device), refcount: 1 });
                Ok(device)
            }
        }
    }

    /// §4.7 `unmake`: decrement the refcount; on zero, remove every key
    /// pointing at this device and dispose it outside the table lock.
    pub fn unmake(&self, device: &Arc<Device>) {
        let mut drained = false;
        self.devices.retain(|_, entry| {
            if Arc::ptr_eq(&entry.device, device) {
                entry.refcount -= 1;
                if entry.refcount == 0 {
                    drained = true;
                    return false;
                }
            }
            true
        });
        if drained {
            device.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverHandle, DriverOps, GainRange, RxCallback, StreamingState, TxCallback};
    use crate::types::Direction;

    struct StubHandle(String);
    impl DriverHandle for StubHandle {
        fn hardware_key(&self) -> String {
            self.0.clone()
        }
    }

    /// Mimics an RTL-SDR-style driver for S1: a single fixed device with
    /// a serial and tuner name, reported through `find`.
    struct RtlLikeDriver;
    impl DriverOps for RtlLikeDriver {
        fn name(&self) -> &'static str {
            "rtlsdr"
        }
        fn find(&self, _args: &Args) -> Result<Vec<DeviceInfo>> {
            let mut info_args = Args::new();
            info_args.insert("label", "Generic RTL2832U :: 00000001");
            info_args.insert("serial", "00000001");
            info_args.insert("tuner", "Rafael Micro R820T");
            Ok(vec![DeviceInfo { args: info_args }])
        }
        fn open(&self, args: &Args) -> Result<Box<dyn DriverHandle>> {
            Ok(Box::new(StubHandle(args.get("serial").unwrap_or("").to_string())))
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
            Ok("Rafael Micro R820T".into())
        }
        fn stream_formats(&self, _direction: Direction) -> Vec<&'static str> {
            vec!["CS8"]
        }
    }

    fn factory_with_rtl() -> Factory {
        let factory = Factory::new(Config::default());
        factory.registry.lock().register(Arc::new(RtlLikeDriver)).unwrap();
        factory
    }

    /// S1: enumerate reports the RTL-SDR-style label, serial, tuner and
    /// driver name exactly.
    #[test]
    fn enumerate_reports_rtlsdr_style_descriptor() {
        let factory = factory_with_rtl();
        let mut filter = Args::new();
        filter.insert("driver", "rtlsdr");
        let results = factory.enumerate(&filter);
        assert_eq!(results.len(), 1);
        let info = &results[0];
        assert_eq!(info.args.get("label"), Some("Generic RTL2832U :: 00000001"));
        assert_eq!(info.args.get("serial"), Some("00000001"));
        assert_eq!(info.args.get("tuner"), Some("Rafael Micro R820T"));
        assert_eq!(info.args.get("driver"), Some("rtlsdr"));
    }

    /// Property 7: repeated `make` with identical args returns the same
    /// instance; two `unmake` calls drop it.
    #[test]
    fn make_dedups_and_unmake_drops_after_matching_release_count() {
        let factory = factory_with_rtl();
        let mut args = Args::new();
        args.insert("driver", "rtlsdr");

        let first = factory.make(&args).unwrap();
        let second = factory.make(&args).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.devices.len(), 1);

        factory.unmake(&first);
        assert_eq!(factory.devices.len(), 1);
        factory.unmake(&second);
        assert_eq!(factory.devices.len(), 0);
    }

    /// `make("driver=rtlsdr")` and a later, more specific `make` sharing
    /// the discovered serial resolve to the same device (rationale note
    /// in §4.7).
    #[test]
    fn make_shares_instance_across_bare_and_specific_filters() {
        let factory = factory_with_rtl();
        let mut bare = Args::new();
        bare.insert("driver", "rtlsdr");
        let first = factory.make(&bare).unwrap();

        let mut specific = Args::new();
        specific.insert("driver", "rtlsdr");
        specific.insert("serial", "00000001");
        let second = factory.make(&specific).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn make_without_driver_filter_fails_when_multiple_drivers_registered() {
        let factory = factory_with_rtl();
        let err = factory.make(&Args::new()).unwrap_err();
        assert!(matches!(err, Error::NoMatchingDriver));
    }

    #[test]
    fn make_without_driver_filter_uses_null_when_only_null_registered() {
        let factory = Factory::new(Config::default());
        let device = factory.make(&Args::new()).unwrap();
        assert_eq!(device.driver_name(), "null");
    }
}
