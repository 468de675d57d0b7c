// src/display/manager.rs
//! Display handle management: open by numeric id, query geometry, close.

use crate::display::driver::DisplayDriver;
use crate::display::error::DisplayError;
use crate::display::types::{DisplayHandle, Geometry};
use log::{debug, info};

/// An open display. Closing consumes it, so a display is closed at most once.
#[derive(Debug)]
pub struct OpenDisplay {
    id: u32,
    handle: DisplayHandle,
}

impl OpenDisplay {
    /// Opens display `id`. Any id is passed through; rejection is up to the platform.
    pub fn open(driver: &mut dyn DisplayDriver, id: u32) -> Result<Self, DisplayError> {
        let handle = driver.display_open(id)?;
        info!(
            "DisplayManager: opened display {} (handle {}) via {}",
            id,
            handle.raw(),
            driver.name()
        );
        Ok(Self { id, handle })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn handle(&self) -> DisplayHandle {
        self.handle
    }

    /// Queries the display's reported size.
    ///
    /// A mode with a non-positive dimension is reported as a query failure,
    /// since no resource can be sized from it.
    pub fn geometry(&self, driver: &mut dyn DisplayDriver) -> Result<Geometry, DisplayError> {
        let info = driver.display_get_info(self.handle)?;
        debug!(
            "DisplayManager: display {} reports {}x{} (display_num {})",
            self.id, info.width, info.height, info.display_num
        );
        match (u32::try_from(info.width), u32::try_from(info.height)) {
            (Ok(width), Ok(height)) if width > 0 && height > 0 => Ok(Geometry::new(width, height)),
            _ => Err(DisplayError::QueryFailed),
        }
    }

    pub fn close(self, driver: &mut dyn DisplayDriver) -> Result<(), DisplayError> {
        driver.display_close(self.handle)?;
        info!("DisplayManager: closed display {}", self.id);
        Ok(())
    }
}
