// src/display/element.rs
//! Compositor binding: update transactions and the elements they add or remove.

use crate::display::driver::DisplayDriver;
use crate::display::error::DisplayError;
use crate::display::resource::PixelResource;
use crate::display::types::{
    Alpha, DisplayHandle, ElementHandle, ElementSpec, Protection, Transform, UpdateHandle,
};
use log::debug;

impl ElementSpec {
    /// An identity-mapped, fully opaque element covering the whole display.
    ///
    /// The destination is in device pixels; the source is the same extent in
    /// 16.16 fixed point, which the platform requires even without scaling.
    pub fn full_frame(display: DisplayHandle, resource: &PixelResource, layer: i32) -> Self {
        let geometry = resource.geometry();
        Self {
            display,
            layer,
            dst_rect: geometry.pixel_rect(),
            resource: resource.handle(),
            src_rect: geometry.subpixel_rect(),
            protection: Protection::None,
            alpha: Alpha::opaque_pinned(),
            transform: Transform::Rot0,
        }
    }
}

/// A bound element. Removing it consumes it.
#[derive(Debug)]
pub struct Element {
    handle: ElementHandle,
    layer: i32,
}

impl Element {
    pub fn handle(&self) -> ElementHandle {
        self.handle
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }
}

/// One atomic batch of compositing-stack mutations.
///
/// A transaction that is dropped without `submit` is submitted on drop so that
/// the platform never holds an open update.
pub struct UpdateTransaction<'d> {
    driver: &'d mut dyn DisplayDriver,
    handle: UpdateHandle,
    submitted: bool,
}

impl<'d> UpdateTransaction<'d> {
    pub fn begin(driver: &'d mut dyn DisplayDriver, priority: i32) -> Result<Self, DisplayError> {
        let handle = driver.update_start(priority)?;
        debug!("CompositorBinding: update {} started", handle.raw());
        Ok(Self {
            driver,
            handle,
            submitted: false,
        })
    }

    pub fn bind(&mut self, spec: &ElementSpec) -> Result<Element, DisplayError> {
        let handle = self.driver.element_add(self.handle, spec)?;
        debug!(
            "CompositorBinding: element {} staged on layer {} in update {}",
            handle.raw(),
            spec.layer,
            self.handle.raw()
        );
        Ok(Element {
            handle,
            layer: spec.layer,
        })
    }

    pub fn unbind(&mut self, element: Element) -> Result<(), DisplayError> {
        self.driver.element_remove(self.handle, element.handle)?;
        debug!(
            "CompositorBinding: element {} removal staged in update {}",
            element.handle.raw(),
            self.handle.raw()
        );
        Ok(())
    }

    /// Applies the batch, blocking until the compositor has done so.
    pub fn submit(mut self) -> Result<(), DisplayError> {
        self.submitted = true;
        self.driver.update_submit_sync(self.handle)?;
        debug!("CompositorBinding: update {} applied", self.handle.raw());
        Ok(())
    }
}

impl Drop for UpdateTransaction<'_> {
    fn drop(&mut self) {
        if self.submitted {
            return;
        }
        if let Err(err) = self.driver.update_submit_sync(self.handle) {
            debug!(
                "CompositorBinding: flushing abandoned update {} failed: {}",
                self.handle.raw(),
                err
            );
        }
    }
}
