// src/display/driver.rs
//! DisplayDriver trait - minimal RISC interface for the platform's display primitives.
//!
//! Each method is one synchronous platform call. All sequencing and cleanup
//! discipline lives above the driver, in the display components and the
//! session controller.
//!
//! ## Lifecycle
//! 1. Construction - platform library initialisation (`bcm_host_init`)
//! 2. Primitive calls, strictly in dependency order
//! 3. `Drop` - platform library shutdown

use crate::display::error::DisplayError;
use crate::display::types::{
    DisplayHandle, ElementHandle, ElementSpec, ImageFormat, ModeInfo, Rect, ResourceHandle,
    UpdateHandle,
};

/// Platform display primitives.
///
/// Implementations return an error for any call the platform reports as failed,
/// including a null handle where a handle was expected.
pub trait DisplayDriver {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    fn display_open(&mut self, id: u32) -> Result<DisplayHandle, DisplayError>;

    fn display_get_info(&mut self, display: DisplayHandle) -> Result<ModeInfo, DisplayError>;

    fn display_close(&mut self, display: DisplayHandle) -> Result<(), DisplayError>;

    fn resource_create(
        &mut self,
        format: ImageFormat,
        width: u32,
        height: u32,
    ) -> Result<ResourceHandle, DisplayError>;

    /// Uploads `data` (rows of `pitch` bytes) into `rect` of the resource.
    fn resource_write_data(
        &mut self,
        resource: ResourceHandle,
        format: ImageFormat,
        pitch: u32,
        data: &[u8],
        rect: &Rect,
    ) -> Result<(), DisplayError>;

    fn resource_delete(&mut self, resource: ResourceHandle) -> Result<(), DisplayError>;

    fn update_start(&mut self, priority: i32) -> Result<UpdateHandle, DisplayError>;

    fn element_add(
        &mut self,
        update: UpdateHandle,
        spec: &ElementSpec,
    ) -> Result<ElementHandle, DisplayError>;

    fn element_remove(
        &mut self,
        update: UpdateHandle,
        element: ElementHandle,
    ) -> Result<(), DisplayError>;

    /// Applies the transaction and blocks until the compositor has done so.
    fn update_submit_sync(&mut self, update: UpdateHandle) -> Result<(), DisplayError>;
}
