// src/display/resource.rs
//! Off-screen RGB888 pixel resources.

use crate::display::driver::DisplayDriver;
use crate::display::error::DisplayError;
use crate::display::types::{Geometry, ImageFormat, ResourceHandle};
use log::debug;

/// A platform pixel resource sized to a display.
///
/// Written exactly once; released at most once (`release` consumes it).
#[derive(Debug)]
pub struct PixelResource {
    handle: ResourceHandle,
    geometry: Geometry,
    written: bool,
}

impl PixelResource {
    pub fn allocate(
        driver: &mut dyn DisplayDriver,
        geometry: Geometry,
    ) -> Result<Self, DisplayError> {
        let handle = driver.resource_create(ImageFormat::Rgb888, geometry.width, geometry.height)?;
        debug!(
            "ResourceAllocator: created {} resource {}",
            geometry,
            handle.raw()
        );
        Ok(Self {
            handle,
            geometry,
            written: false,
        })
    }

    /// Uploads a full frame. `pixels` must be exactly `width * height * 3` bytes.
    pub fn write(
        &mut self,
        driver: &mut dyn DisplayDriver,
        pixels: &[u8],
    ) -> Result<(), DisplayError> {
        if self.written {
            return Err(DisplayError::write_failed("resource already written"));
        }
        let expected = self.geometry.frame_len();
        if pixels.len() != expected {
            return Err(DisplayError::write_failed(format!(
                "expected {} bytes, got {}",
                expected,
                pixels.len()
            )));
        }
        let pitch = u32::try_from(self.geometry.pitch())
            .map_err(|_| DisplayError::write_failed("row pitch overflows u32"))?;

        driver.resource_write_data(
            self.handle,
            ImageFormat::Rgb888,
            pitch,
            pixels,
            &self.geometry.pixel_rect(),
        )?;
        self.written = true;
        debug!(
            "ResourceAllocator: wrote {} bytes into resource {}",
            pixels.len(),
            self.handle.raw()
        );
        Ok(())
    }

    /// Allocates and fills a resource in one step. On a failed write the
    /// resource is deleted again, so callers get a written resource or nothing.
    pub fn create(
        driver: &mut dyn DisplayDriver,
        geometry: Geometry,
        pixels: &[u8],
    ) -> Result<Self, DisplayError> {
        let mut resource = Self::allocate(driver, geometry)?;
        if let Err(err) = resource.write(driver, pixels) {
            if let Err(release_err) = resource.release(driver) {
                debug!(
                    "ResourceAllocator: failed to delete resource after write failure: {}",
                    release_err
                );
            }
            return Err(err);
        }
        Ok(resource)
    }

    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn release(self, driver: &mut dyn DisplayDriver) -> Result<(), DisplayError> {
        driver.resource_delete(self.handle)?;
        debug!("ResourceAllocator: deleted resource {}", self.handle.raw());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeadlessConfig;
    use crate::display::drivers::{HeadlessDisplayDriver, Operation};

    fn driver() -> HeadlessDisplayDriver {
        HeadlessDisplayDriver::new(HeadlessConfig::with_size(2, 1))
    }

    #[test]
    fn it_should_upload_the_frame_with_a_packed_stride() -> anyhow::Result<()> {
        let mut driver = driver();
        let pixels = [0xFF, 0x00, 0x00, 0x00, 0xFF, 0x00];
        let resource = PixelResource::create(&mut driver, Geometry::new(2, 1), &pixels)?;

        let ledger = driver.ledger();
        let ledger = ledger.borrow();
        let record = &ledger.resources()[&resource.handle()];
        assert_eq!(record.geometry, Geometry::new(2, 1));
        assert_eq!(record.pixels.as_deref(), Some(&pixels[..]));
        Ok(())
    }

    #[test]
    fn it_should_reject_a_buffer_of_the_wrong_length_before_calling_the_platform() -> anyhow::Result<()> {
        let mut driver = driver();
        let mut resource = PixelResource::allocate(&mut driver, Geometry::new(2, 1))?;
        let err = resource.write(&mut driver, &[0; 5]).unwrap_err();
        assert!(matches!(err, DisplayError::WriteFailed { .. }));
        assert!(!driver
            .ledger()
            .borrow()
            .calls()
            .contains(&Operation::ResourceWriteData));
        Ok(())
    }

    #[test]
    fn it_should_refuse_a_second_write() -> anyhow::Result<()> {
        let mut driver = driver();
        let mut resource = PixelResource::allocate(&mut driver, Geometry::new(2, 1))?;
        resource.write(&mut driver, &[0; 6])?;
        assert!(resource.write(&mut driver, &[0; 6]).is_err());
        Ok(())
    }

    #[test]
    fn it_should_leave_nothing_behind_when_the_write_fails() {
        let mut driver = driver();
        driver
            .ledger()
            .borrow_mut()
            .fail_on(Operation::ResourceWriteData);
        let err = PixelResource::create(&mut driver, Geometry::new(2, 1), &[0; 6]).unwrap_err();
        assert!(matches!(err, DisplayError::WriteFailed { .. }));
        assert!(driver.ledger().borrow().resources().is_empty());
    }

    #[test]
    fn it_should_report_allocation_failure_with_the_requested_size() {
        let mut driver = driver();
        driver
            .ledger()
            .borrow_mut()
            .fail_on(Operation::ResourceCreate);
        let err = PixelResource::allocate(&mut driver, Geometry::new(2, 1)).unwrap_err();
        assert_eq!(
            err,
            DisplayError::AllocationFailed {
                width: 2,
                height: 1
            }
        );
    }
}
