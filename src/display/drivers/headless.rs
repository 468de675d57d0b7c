//! Headless display driver: an in-memory model of the compositing stack.
//!
//! Used when the crate is built without `bcm_host`, and as the test double.
//! State lives in a shared [`Ledger`] so it can be inspected after the driver
//! (or the session owning it) is gone.

use crate::config::HeadlessConfig;
use crate::display::driver::DisplayDriver;
use crate::display::error::DisplayError;
use crate::display::types::{
    Alpha, DisplayHandle, ElementHandle, ElementSpec, Geometry, ImageFormat, ModeInfo, Rect,
    ResourceHandle, UpdateHandle, BYTES_PER_PIXEL, SUBPIXEL_SHIFT,
};
use log::{info, trace};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Platform calls, as recorded in the ledger's call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    DisplayOpen,
    DisplayGetInfo,
    DisplayClose,
    ResourceCreate,
    ResourceWriteData,
    ResourceDelete,
    UpdateStart,
    ElementAdd,
    ElementRemove,
    UpdateSubmitSync,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub geometry: Geometry,
    pub pixels: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRecord {
    pub display: DisplayHandle,
    pub layer: i32,
    pub resource: ResourceHandle,
    pub dst_rect: Rect,
    pub src_rect: Rect,
    pub alpha: Alpha,
}

#[derive(Debug, Clone)]
enum Mutation {
    Add(ElementHandle, ElementRecord),
    Remove(ElementHandle),
}

/// Everything the headless compositor knows.
#[derive(Debug, Default)]
pub struct Ledger {
    calls: Vec<Operation>,
    displays: BTreeMap<DisplayHandle, u32>,
    resources: BTreeMap<ResourceHandle, ResourceRecord>,
    elements: BTreeMap<ElementHandle, ElementRecord>,
    pending: BTreeMap<UpdateHandle, Vec<Mutation>>,
    last_handle: u32,
    fail_on: Option<Operation>,
}

impl Ledger {
    /// Makes the next call of `op` fail once.
    pub fn fail_on(&mut self, op: Operation) {
        self.fail_on = Some(op);
    }

    pub fn calls(&self) -> &[Operation] {
        &self.calls
    }

    /// Open displays and the id each was opened with.
    pub fn open_displays(&self) -> &BTreeMap<DisplayHandle, u32> {
        &self.displays
    }

    pub fn resources(&self) -> &BTreeMap<ResourceHandle, ResourceRecord> {
        &self.resources
    }

    /// Elements applied by a submitted update and not yet removed.
    pub fn elements(&self) -> &BTreeMap<ElementHandle, ElementRecord> {
        &self.elements
    }

    pub fn pending_updates(&self) -> Vec<UpdateHandle> {
        self.pending.keys().copied().collect()
    }

    /// Records the call and reports whether an injected failure is due.
    fn enter(&mut self, op: Operation) -> bool {
        trace!("HeadlessDisplayDriver: {:?}", op);
        self.calls.push(op);
        if self.fail_on == Some(op) {
            self.fail_on = None;
            return true;
        }
        false
    }

    fn next_handle(&mut self) -> u32 {
        self.last_handle += 1;
        self.last_handle
    }

    fn staged_add(&self, update: UpdateHandle, element: ElementHandle) -> bool {
        self.pending.get(&update).is_some_and(|mutations| {
            mutations
                .iter()
                .any(|m| matches!(m, Mutation::Add(h, _) if *h == element))
        })
    }
}

pub struct HeadlessDisplayDriver {
    config: HeadlessConfig,
    ledger: Rc<RefCell<Ledger>>,
}

impl HeadlessDisplayDriver {
    pub fn new(config: HeadlessConfig) -> Self {
        info!(
            "HeadlessDisplayDriver::new() - {}x{} compositor",
            config.width, config.height
        );
        Self {
            config,
            ledger: Rc::new(RefCell::new(Ledger::default())),
        }
    }

    /// Shared handle to the compositor state.
    pub fn ledger(&self) -> Rc<RefCell<Ledger>> {
        Rc::clone(&self.ledger)
    }

    fn accepts_display(&self, id: u32) -> bool {
        self.config.displays.is_empty() || self.config.displays.contains(&id)
    }
}

fn within(rect: &Rect, width: i64, height: i64) -> bool {
    let (x, y, w, h) = (
        i64::from(rect.x),
        i64::from(rect.y),
        i64::from(rect.width),
        i64::from(rect.height),
    );
    x >= 0 && y >= 0 && w > 0 && h > 0 && x + w <= width && y + h <= height
}

impl DisplayDriver for HeadlessDisplayDriver {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn display_open(&mut self, id: u32) -> Result<DisplayHandle, DisplayError> {
        let accepted = self.accepts_display(id);
        let mut ledger = self.ledger.borrow_mut();
        if ledger.enter(Operation::DisplayOpen) || !accepted {
            return Err(DisplayError::DisplayUnavailable { id });
        }
        let handle = DisplayHandle(ledger.next_handle());
        ledger.displays.insert(handle, id);
        Ok(handle)
    }

    fn display_get_info(&mut self, display: DisplayHandle) -> Result<ModeInfo, DisplayError> {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.enter(Operation::DisplayGetInfo) {
            return Err(DisplayError::QueryFailed);
        }
        let id = *ledger
            .displays
            .get(&display)
            .ok_or(DisplayError::QueryFailed)?;
        Ok(ModeInfo {
            width: i32::try_from(self.config.width).map_err(|_| DisplayError::QueryFailed)?,
            height: i32::try_from(self.config.height).map_err(|_| DisplayError::QueryFailed)?,
            display_num: id,
        })
    }

    fn display_close(&mut self, display: DisplayHandle) -> Result<(), DisplayError> {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.enter(Operation::DisplayClose) {
            return Err(DisplayError::CloseFailed);
        }
        ledger
            .displays
            .remove(&display)
            .map(|_| ())
            .ok_or(DisplayError::CloseFailed)
    }

    fn resource_create(
        &mut self,
        _format: ImageFormat,
        width: u32,
        height: u32,
    ) -> Result<ResourceHandle, DisplayError> {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.enter(Operation::ResourceCreate) || width == 0 || height == 0 {
            return Err(DisplayError::AllocationFailed { width, height });
        }
        let handle = ResourceHandle(ledger.next_handle());
        ledger.resources.insert(
            handle,
            ResourceRecord {
                geometry: Geometry::new(width, height),
                pixels: None,
            },
        );
        Ok(handle)
    }

    fn resource_write_data(
        &mut self,
        resource: ResourceHandle,
        _format: ImageFormat,
        pitch: u32,
        data: &[u8],
        rect: &Rect,
    ) -> Result<(), DisplayError> {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.enter(Operation::ResourceWriteData) {
            return Err(DisplayError::write_failed("injected failure"));
        }
        let record = ledger
            .resources
            .get_mut(&resource)
            .ok_or_else(|| DisplayError::write_failed("unknown resource"))?;
        let geometry = record.geometry;
        if !within(rect, geometry.width.into(), geometry.height.into()) {
            return Err(DisplayError::write_failed("rect exceeds resource"));
        }
        let row = rect.width as usize * BYTES_PER_PIXEL;
        if (pitch as usize) < row {
            return Err(DisplayError::write_failed("pitch shorter than a row"));
        }
        if data.len() < pitch as usize * rect.height as usize {
            return Err(DisplayError::write_failed("buffer shorter than rect"));
        }

        let stored = record
            .pixels
            .get_or_insert_with(|| vec![0; geometry.frame_len()]);
        for y in 0..rect.height as usize {
            let src = &data[y * pitch as usize..][..row];
            let offset = (rect.y as usize + y) * geometry.pitch() + rect.x as usize * BYTES_PER_PIXEL;
            stored[offset..offset + row].copy_from_slice(src);
        }
        Ok(())
    }

    fn resource_delete(&mut self, resource: ResourceHandle) -> Result<(), DisplayError> {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.enter(Operation::ResourceDelete) {
            return Err(DisplayError::ResourceReleaseFailed);
        }
        if ledger.elements.values().any(|e| e.resource == resource) {
            return Err(DisplayError::ResourceReleaseFailed);
        }
        ledger
            .resources
            .remove(&resource)
            .map(|_| ())
            .ok_or(DisplayError::ResourceReleaseFailed)
    }

    fn update_start(&mut self, _priority: i32) -> Result<UpdateHandle, DisplayError> {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.enter(Operation::UpdateStart) {
            return Err(DisplayError::TransactionFailed);
        }
        let handle = UpdateHandle(ledger.next_handle());
        ledger.pending.insert(handle, Vec::new());
        Ok(handle)
    }

    fn element_add(
        &mut self,
        update: UpdateHandle,
        spec: &ElementSpec,
    ) -> Result<ElementHandle, DisplayError> {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.enter(Operation::ElementAdd)
            || !ledger.pending.contains_key(&update)
            || !ledger.displays.contains_key(&spec.display)
        {
            return Err(DisplayError::BindFailed);
        }
        let geometry = ledger
            .resources
            .get(&spec.resource)
            .ok_or(DisplayError::BindFailed)?
            .geometry;

        // Source coordinates are 16.16; anything under one texel is a unit error.
        let one = 1 << SUBPIXEL_SHIFT;
        let extent = |px: u32| i64::from(px) << SUBPIXEL_SHIFT;
        if spec.src_rect.width < one
            || spec.src_rect.height < one
            || !within(&spec.src_rect, extent(geometry.width), extent(geometry.height))
            || spec.dst_rect.width <= 0
            || spec.dst_rect.height <= 0
        {
            return Err(DisplayError::BindFailed);
        }

        let handle = ElementHandle(ledger.next_handle());
        let record = ElementRecord {
            display: spec.display,
            layer: spec.layer,
            resource: spec.resource,
            dst_rect: spec.dst_rect,
            src_rect: spec.src_rect,
            alpha: spec.alpha,
        };
        if let Some(mutations) = ledger.pending.get_mut(&update) {
            mutations.push(Mutation::Add(handle, record));
        }
        Ok(handle)
    }

    fn element_remove(
        &mut self,
        update: UpdateHandle,
        element: ElementHandle,
    ) -> Result<(), DisplayError> {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.enter(Operation::ElementRemove) {
            return Err(DisplayError::UnbindFailed);
        }
        if !ledger.elements.contains_key(&element) && !ledger.staged_add(update, element) {
            return Err(DisplayError::UnbindFailed);
        }
        ledger
            .pending
            .get_mut(&update)
            .ok_or(DisplayError::UnbindFailed)?
            .push(Mutation::Remove(element));
        Ok(())
    }

    fn update_submit_sync(&mut self, update: UpdateHandle) -> Result<(), DisplayError> {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.enter(Operation::UpdateSubmitSync) {
            ledger.pending.remove(&update);
            return Err(DisplayError::SubmitFailed);
        }
        let mutations = ledger
            .pending
            .remove(&update)
            .ok_or(DisplayError::SubmitFailed)?;
        for mutation in mutations {
            match mutation {
                Mutation::Add(handle, record) => {
                    ledger.elements.insert(handle, record);
                }
                Mutation::Remove(handle) => {
                    ledger.elements.remove(&handle);
                }
            }
        }
        Ok(())
    }
}

impl Drop for HeadlessDisplayDriver {
    fn drop(&mut self) {
        let ledger = self.ledger.borrow();
        info!(
            "HeadlessDisplayDriver: {} elements, {} resources, {} displays open",
            ledger.elements.len(),
            ledger.resources.len(),
            ledger.displays.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_copy_rows_honouring_the_pitch() -> anyhow::Result<()> {
        let mut driver = HeadlessDisplayDriver::new(HeadlessConfig::with_size(2, 2));
        let res = driver.resource_create(ImageFormat::Rgb888, 2, 2)?;
        // Pitch of 8 leaves two bytes of padding per row that must be skipped.
        let data = [1, 2, 3, 4, 5, 6, 0, 0, 7, 8, 9, 10, 11, 12, 0, 0];
        driver.resource_write_data(res, ImageFormat::Rgb888, 8, &data, &Rect::new(0, 0, 2, 2))?;

        let ledger = driver.ledger();
        let ledger = ledger.borrow();
        assert_eq!(
            ledger.resources()[&res].pixels.as_deref(),
            Some(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12][..])
        );
        Ok(())
    }

    #[test]
    fn it_should_refuse_to_delete_a_resource_still_on_screen() -> anyhow::Result<()> {
        let mut driver = HeadlessDisplayDriver::new(HeadlessConfig::with_size(1, 1));
        let display = driver.display_open(0)?;
        let resource = driver.resource_create(ImageFormat::Rgb888, 1, 1)?;
        let update = driver.update_start(0)?;
        let spec = ElementSpec {
            display,
            layer: 0,
            dst_rect: Rect::new(0, 0, 1, 1),
            resource,
            src_rect: Rect::new(0, 0, 1 << 16, 1 << 16),
            protection: crate::display::types::Protection::None,
            alpha: Alpha::opaque_pinned(),
            transform: crate::display::types::Transform::Rot0,
        };
        driver.element_add(update, &spec)?;
        driver.update_submit_sync(update)?;

        assert_eq!(
            driver.resource_delete(resource),
            Err(DisplayError::ResourceReleaseFailed)
        );
        Ok(())
    }

    #[test]
    fn it_should_fail_an_injected_operation_only_once() -> anyhow::Result<()> {
        let mut driver = HeadlessDisplayDriver::new(HeadlessConfig::default());
        driver.ledger().borrow_mut().fail_on(Operation::UpdateStart);
        assert_eq!(driver.update_start(0), Err(DisplayError::TransactionFailed));
        assert!(driver.update_start(0).is_ok());
        Ok(())
    }

    #[test]
    fn it_should_reject_unknown_handles() {
        let mut driver = HeadlessDisplayDriver::new(HeadlessConfig::default());
        assert_eq!(
            driver.display_close(DisplayHandle(42)),
            Err(DisplayError::CloseFailed)
        );
        assert_eq!(
            driver.update_submit_sync(UpdateHandle(42)),
            Err(DisplayError::SubmitFailed)
        );
    }
}
