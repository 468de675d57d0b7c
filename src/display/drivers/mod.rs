// src/display/drivers/mod.rs
//! Platform-specific display driver implementations.

pub mod headless;

#[cfg(vc_dispmanx)]
pub mod vc;

pub use headless::{HeadlessDisplayDriver, Ledger, Operation};

#[cfg(vc_dispmanx)]
pub use vc::VcDisplayDriver;

use crate::config::HeadlessConfig;
use crate::display::driver::DisplayDriver;
use log::info;

/// The driver this binary was built for.
pub fn platform_driver(headless: &HeadlessConfig) -> Box<dyn DisplayDriver> {
    #[cfg(vc_dispmanx)]
    {
        let _ = headless;
        info!("Creating VcDisplayDriver...");
        Box::new(VcDisplayDriver::new())
    }

    #[cfg(not(vc_dispmanx))]
    {
        info!("Creating HeadlessDisplayDriver (built without bcm_host)...");
        Box::new(HeadlessDisplayDriver::new(headless.clone()))
    }
}
