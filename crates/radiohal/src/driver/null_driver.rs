// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Built-in `"null"` driver (§4.7 step 4: `make` fails with no
//! `driver=` filter when "more than the built-in null driver" is
//! registered — implying one always exists). It enumerates one
//! synthetic device and never actually streams.

use crate::args::Args;
use crate::driver::{
    DeviceInfo, DriverHandle, DriverOps, GainRange, RxCallback, StreamingState, TxCallback,
};
use crate::error::{Error, Result};
use crate::types::Direction;

pub struct NullDriver;

impl NullDriver {
    pub fn new() -> Self {
        NullDriver
    }
}

impl Default for NullDriver {
    fn default() -> Self {
        Self::new()
    }
}

struct NullHandle;

impl DriverHandle for NullHandle {
    fn hardware_key(&self) -> String {
        "null".into()
    }
}

impl DriverOps for NullDriver {
    fn name(&self) -> &'static str {
        "null"
    }

    fn find(&self, _args: &Args) -> Result<Vec<DeviceInfo>> {
        let mut args = Args::new();
        args.insert("driver", "null");
        args.insert("label", "Null Device");
        Ok(vec![DeviceInfo { args }])
    }

    fn open(&self, _args: &Args) -> Result<Box<dyn DriverHandle>> {
        Ok(Box::new(NullHandle))
    }

    fn close(&self, _dev: &mut dyn DriverHandle) -> Result<()> {
        Ok(())
    }

    fn is_streaming(&self, _dev: &dyn DriverHandle, _direction: Direction) -> Result<StreamingState> {
        Ok(StreamingState::NotStreaming)
    }

    fn start_rx(&self, _dev: &dyn DriverHandle, _callback: RxCallback) -> Result<()> {
        Err(Error::NotSupported("RX streaming on the null driver"))
    }

    fn stop_rx(&self, _dev: &dyn DriverHandle) -> Result<()> {
        Ok(())
    }

    fn start_tx(&self, _dev: &dyn DriverHandle, _callback: TxCallback) -> Result<()> {
        Err(Error::NotSupported("TX streaming on the null driver"))
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
        vec!["RF"]
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
        Ok("none".into())
    }

    fn stream_formats(&self, _direction: Direction) -> Vec<&'static str> {
        vec!["CS8", "CF32"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_reports_one_synthetic_device() {
        let driver = NullDriver::new();
        let found = driver.find(&Args::new()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].args.get("driver"), Some("null"));
    }

    #[test]
    fn streaming_is_not_supported() {
        let driver = NullDriver::new();
        let dev = driver.open(&Args::new()).unwrap();
        let cb: RxCallback = Box::new(|_| {});
        assert!(driver.start_rx(dev.as_ref(), cb).is_err());
    }
}
