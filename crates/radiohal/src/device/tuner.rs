// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composite tuner defaults (§4.5): RF+BB+CORR frequency composition
//! and cumulative gain distribution across a driver's gain elements.
//! These are the fallback a driver gets automatically by exposing
//! `list_frequencies`/`list_gains`; a driver is free to override them.

use crate::args::Args;
use crate::driver::{DriverHandle, DriverOps};
use crate::error::Result;
use crate::types::Direction;

const CORR_COMPONENT: &str = "CORR";

/// §4.5 `set_frequency`: walk the driver's advertised frequency
/// components in order, letting `args` pin or skip individual stages,
/// and apply `OFFSET` to the first component only.
pub fn set_frequency(
    driver: &dyn DriverOps,
    dev: &dyn DriverHandle,
    direction: Direction,
    freq: f64,
    args: &Args,
) -> Result<()> {
    let offset: f64 = args.get("OFFSET").and_then(|v| v.parse().ok()).unwrap_or(0.0);
    let components = driver.list_frequencies(dev, direction);
    let mut residual = freq;

    for (idx, name) in components.iter().enumerate() {
        let first = idx == 0;
        let used_offset = first && !matches!(args.get(name), Some(pinned) if pinned.parse::<f64>().is_ok());
        match args.get(name) {
            Some("IGNORE") => continue,
            Some(pinned) if pinned.parse::<f64>().is_ok() => {
                let value: f64 = pinned.parse().unwrap();
                driver.set_frequency(dev, name, value)?;
            }
            _ => {
                let target = if used_offset { residual + offset } else { residual };
                driver.set_frequency(dev, name, target)?;
            }
        }
        let achieved = driver.get_frequency(dev, name)?;
        residual -= achieved;
        if used_offset {
            residual += offset;
        }
    }
    Ok(())
}

/// §4.5 `get_frequency`: sum every advertised component's achieved value.
pub fn get_frequency(driver: &dyn DriverOps, dev: &dyn DriverHandle, direction: Direction) -> Result<f64> {
    let mut total = 0.0;
    for name in driver.list_frequencies(dev, direction) {
        total += driver.get_frequency(dev, name)?;
    }
    Ok(total)
}

/// §4.5 `set_gain`: distribute `value` across the driver's gain
/// elements — reverse order for TX, forward order for RX — giving each
/// element as much of the remaining budget as its range can absorb.
///
/// Returns each element's applied value, so callers (e.g. the device's
/// tuner cache) can pick out a specific element such as `"AMP"` without
/// re-querying the driver.
pub fn set_gain(
    driver: &dyn DriverOps,
    dev: &dyn DriverHandle,
    direction: Direction,
    value: f64,
) -> Result<Vec<(&'static str, f64)>> {
    let mut elements = driver.list_gains(dev, direction);
    if direction == Direction::Tx {
        elements.reverse();
    }

    let mut remaining = value;
    let mut applied_values = Vec::with_capacity(elements.len());
    for name in elements {
        let range = driver.gain_range(dev, name)?;
        let span = (range.max - range.min).max(0.0);
        let applied = remaining.min(span).max(0.0) + range.min;
        driver.set_element_gain(dev, name, applied)?;
        remaining -= applied - range.min;
        applied_values.push((name, applied));
    }
    Ok(applied_values)
}

/// §4.5 `set_frequency_correction`: delegate to the `CORR` component
/// if the driver advertises one.
pub fn set_frequency_correction(
    driver: &dyn DriverOps,
    dev: &dyn DriverHandle,
    direction: Direction,
    ppm: f64,
) -> Result<()> {
    if driver
        .list_frequencies(dev, direction)
        .iter()
        .any(|name| *name == CORR_COMPONENT)
    {
        driver.set_frequency(dev, CORR_COMPONENT, ppm)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DeviceInfo, GainRange, RxCallback, StreamingState, TxCallback};
    use crate::error::Error;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// A driver whose components/gains/ranges are fully programmable,
    /// used to exercise §8 scenarios S2 and S3 without real hardware.
    struct MockTunerDriver {
        freq_components: Vec<&'static str>,
        gain_elements: Vec<(&'static str, GainRange)>,
        applied_freq: Mutex<HashMap<&'static str, f64>>,
        applied_gain: Mutex<HashMap<&'static str, f64>>,
    }

    struct MockHandle;
    impl DriverHandle for MockHandle {
        fn hardware_key(&self) -> String {
            "mock".into()
        }
    }

    impl MockTunerDriver {
        fn new(freq_components: Vec<&'static str>, gain_elements: Vec<(&'static str, GainRange)>) -> Self {
            Self {
                freq_components,
                gain_elements,
                applied_freq: Mutex::new(HashMap::new()),
                applied_gain: Mutex::new(HashMap::new()),
            }
        }
    }

    impl DriverOps for MockTunerDriver {
        fn name(&self) -> &'static str {
            "mock-tuner"
        }
        fn find(&self, _args: &Args) -> Result<Vec<DeviceInfo>> {
            Ok(vec![])
        }
        fn open(&self, _args: &Args) -> Result<Box<dyn DriverHandle>> {
            Ok(Box::new(MockHandle))
        }
        fn close(&self, _dev: &mut dyn DriverHandle) -> Result<()> {
            Ok(())
        }
        fn is_streaming(&self, _dev: &dyn DriverHandle, _direction: Direction) -> Result<StreamingState> {
            Ok(StreamingState::NotStreaming)
        }
        fn start_rx(&self, _dev: &dyn DriverHandle, _callback: RxCallback) -> Result<()> {
            Err(Error::NotSupported("rx"))
        }
        fn stop_rx(&self, _dev: &dyn DriverHandle) -> Result<()> {
            Ok(())
        }
        fn start_tx(&self, _dev: &dyn DriverHandle, _callback: TxCallback) -> Result<()> {
            Err(Error::NotSupported("tx"))
        }
        fn stop_tx(&self, _dev: &dyn DriverHandle) -> Result<()> {
            Ok(())
        }
        fn set_frequency(&self, _dev: &dyn DriverHandle, component: &str, hz: f64) -> Result<()> {
            self.applied_freq.lock().insert(
                self.freq_components.iter().find(|c| **c == component).unwrap(),
                hz,
            );
            Ok(())
        }
        fn get_frequency(&self, _dev: &dyn DriverHandle, component: &str) -> Result<f64> {
            Ok(*self.applied_freq.lock().get(component).unwrap_or(&0.0))
        }
        fn list_frequencies(&self, _dev: &dyn DriverHandle, _direction: Direction) -> Vec<&'static str> {
            self.freq_components.clone()
        }
        fn set_sample_rate(&self, _dev: &dyn DriverHandle, _rate: f64) -> Result<()> {
            Ok(())
        }
        fn set_bandwidth(&self, _dev: &dyn DriverHandle, _hz: f64) -> Result<()> {
            Ok(())
        }
        fn list_gains(&self, _dev: &dyn DriverHandle, _direction: Direction) -> Vec<&'static str> {
            self.gain_elements.iter().map(|(name, _)| *name).collect()
        }
        fn gain_range(&self, _dev: &dyn DriverHandle, element: &str) -> Result<GainRange> {
            Ok(self
                .gain_elements
                .iter()
                .find(|(name, _)| *name == element)
                .unwrap()
                .1)
        }
        fn set_element_gain(&self, _dev: &dyn DriverHandle, element: &str, value: f64) -> Result<()> {
            self.applied_gain.lock().insert(
                self.gain_elements.iter().find(|(n, _)| *n == element).unwrap().0,
                value,
            );
            Ok(())
        }
        fn set_antenna(&self, _dev: &dyn DriverHandle, _direction: Direction, _name: &str) -> Result<()> {
            Ok(())
        }
        fn set_amp_enable(&self, _dev: &dyn DriverHandle, _enable: bool) -> Result<()> {
            Ok(())
        }
        fn tuner_name(&self, _dev: &dyn DriverHandle) -> Result<String> {
            Ok("mock".into())
        }
        fn stream_formats(&self, _direction: Direction) -> Vec<&'static str> {
            vec!["CS8"]
        }
    }

    /// S2: CORR tuning with RF ignored must not touch RF and must
    /// apply the CORR component with the requested ppm value.
    #[test]
    fn corr_tuning_skips_ignored_rf_component() {
        let driver = MockTunerDriver::new(
            vec!["RF", "CORR"],
            vec![],
        );
        let dev = driver.open(&Args::new()).unwrap();
        let mut args = Args::new();
        args.insert("RF", "IGNORE");

        set_frequency(&driver, dev.as_ref(), Direction::Rx, 1000.0, &args).unwrap();

        assert_eq!(driver.applied_freq.lock().get("RF"), None);
        assert_eq!(driver.applied_freq.lock().get("CORR").copied(), Some(1000.0));
    }

    /// S3: LNA [0,40] + VGA [0,62] + AMP {0,14} forward order; gain 30
    /// goes entirely to LNA, gain 55 spills LNA->max then into VGA.
    #[test]
    fn rx_gain_distribution_matches_scenario() {
        let driver = MockTunerDriver::new(
            vec![],
            vec![
                ("LNA", GainRange { min: 0.0, max: 40.0, step: 8.0 }),
                ("VGA", GainRange { min: 0.0, max: 62.0, step: 2.0 }),
                ("AMP", GainRange { min: 0.0, max: 14.0, step: 14.0 }),
            ],
        );
        let dev = driver.open(&Args::new()).unwrap();

        set_gain(&driver, dev.as_ref(), Direction::Rx, 30.0).unwrap();
        assert_eq!(driver.applied_gain.lock().get("LNA").copied(), Some(30.0));
        assert_eq!(driver.applied_gain.lock().get("VGA").copied(), Some(0.0));
        assert_eq!(driver.applied_gain.lock().get("AMP").copied(), Some(0.0));

        set_gain(&driver, dev.as_ref(), Direction::Rx, 55.0).unwrap();
        assert_eq!(driver.applied_gain.lock().get("LNA").copied(), Some(40.0));
        assert_eq!(driver.applied_gain.lock().get("VGA").copied(), Some(15.0));
        assert_eq!(driver.applied_gain.lock().get("AMP").copied(), Some(0.0));
    }

    #[test]
    fn tx_gain_distribution_uses_reverse_order() {
        let driver = MockTunerDriver::new(
            vec![],
            vec![
                ("VGA", GainRange { min: 0.0, max: 47.0, step: 1.0 }),
                ("AMP", GainRange { min: 0.0, max: 14.0, step: 14.0 }),
            ],
        );
        let dev = driver.open(&Args::new()).unwrap();

        set_gain(&driver, dev.as_ref(), Direction::Tx, 20.0).unwrap();
        // Reverse order visits AMP first: takes 14, leaves 6 for VGA.
        assert_eq!(driver.applied_gain.lock().get("AMP").copied(), Some(14.0));
        assert_eq!(driver.applied_gain.lock().get("VGA").copied(), Some(6.0));
    }

    #[test]
    fn frequency_correction_is_noop_without_corr_component() {
        let driver = MockTunerDriver::new(vec!["RF"], vec![]);
        let dev = driver.open(&Args::new()).unwrap();
        set_frequency_correction(&driver, dev.as_ref(), Direction::Rx, 5.0).unwrap();
        assert!(driver.applied_freq.lock().is_empty());
    }
}
