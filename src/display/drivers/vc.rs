//! VideoCore dispmanx DisplayDriver, linked against `libbcm_host`.
//!
//! Compiled only when the build script found the library (`vc_dispmanx`).

use crate::display::driver::DisplayDriver;
use crate::display::error::DisplayError;
use crate::display::types::{
    DisplayHandle, ElementHandle, ElementSpec, ImageFormat, ModeInfo, Rect, ResourceHandle,
    UpdateHandle,
};
use log::{info, trace};
use std::os::raw::{c_int, c_void};

#[allow(non_camel_case_types)]
mod ffi {
    use crate::display::types::Rect;
    use std::os::raw::{c_int, c_void};

    pub type DISPMANX_DISPLAY_HANDLE_T = u32;
    pub type DISPMANX_UPDATE_HANDLE_T = u32;
    pub type DISPMANX_ELEMENT_HANDLE_T = u32;
    pub type DISPMANX_RESOURCE_HANDLE_T = u32;
    pub type VC_IMAGE_TYPE_T = u32;
    pub type DISPMANX_PROTECTION_T = u32;
    pub type DISPMANX_TRANSFORM_T = u32;
    pub type VC_RECT_T = Rect;

    #[repr(C)]
    #[derive(Debug, Default)]
    pub struct DISPMANX_MODEINFO_T {
        pub width: i32,
        pub height: i32,
        pub transform: DISPMANX_TRANSFORM_T,
        pub input_format: u32,
        pub display_num: u32,
    }

    #[repr(C)]
    pub struct VC_DISPMANX_ALPHA_T {
        pub flags: u32,
        pub opacity: u32,
        pub mask: DISPMANX_RESOURCE_HANDLE_T,
    }

    extern "C" {
        pub fn bcm_host_init();
        pub fn bcm_host_deinit();

        pub fn vc_dispmanx_display_open(device: u32) -> DISPMANX_DISPLAY_HANDLE_T;
        pub fn vc_dispmanx_display_get_info(
            display: DISPMANX_DISPLAY_HANDLE_T,
            pinfo: *mut DISPMANX_MODEINFO_T,
        ) -> c_int;
        pub fn vc_dispmanx_display_close(display: DISPMANX_DISPLAY_HANDLE_T) -> c_int;

        pub fn vc_dispmanx_resource_create(
            type_: VC_IMAGE_TYPE_T,
            width: u32,
            height: u32,
            native_image_handle: *mut u32,
        ) -> DISPMANX_RESOURCE_HANDLE_T;
        pub fn vc_dispmanx_resource_write_data(
            res: DISPMANX_RESOURCE_HANDLE_T,
            src_type: VC_IMAGE_TYPE_T,
            src_pitch: c_int,
            src_address: *mut c_void,
            rect: *const VC_RECT_T,
        ) -> c_int;
        pub fn vc_dispmanx_resource_delete(res: DISPMANX_RESOURCE_HANDLE_T) -> c_int;

        pub fn vc_dispmanx_update_start(priority: i32) -> DISPMANX_UPDATE_HANDLE_T;
        pub fn vc_dispmanx_element_add(
            update: DISPMANX_UPDATE_HANDLE_T,
            display: DISPMANX_DISPLAY_HANDLE_T,
            layer: i32,
            dest_rect: *const VC_RECT_T,
            src: DISPMANX_RESOURCE_HANDLE_T,
            src_rect: *const VC_RECT_T,
            protection: DISPMANX_PROTECTION_T,
            alpha: *mut VC_DISPMANX_ALPHA_T,
            clamp: *mut c_void,
            transform: DISPMANX_TRANSFORM_T,
        ) -> DISPMANX_ELEMENT_HANDLE_T;
        pub fn vc_dispmanx_element_remove(
            update: DISPMANX_UPDATE_HANDLE_T,
            element: DISPMANX_ELEMENT_HANDLE_T,
        ) -> c_int;
        pub fn vc_dispmanx_update_submit_sync(update: DISPMANX_UPDATE_HANDLE_T) -> c_int;
    }
}

fn check(status: c_int, err: DisplayError) -> Result<(), DisplayError> {
    if status == 0 {
        Ok(())
    } else {
        Err(err)
    }
}

pub struct VcDisplayDriver {
    // Not Send: bcm_host state is per process and we only touch it from one thread.
    _not_send: std::marker::PhantomData<*const ()>,
}

impl VcDisplayDriver {
    pub fn new() -> Self {
        info!("VcDisplayDriver::new() - bcm_host_init");
        // SAFETY: no preconditions; must precede every vc_dispmanx call.
        unsafe { ffi::bcm_host_init() };
        Self {
            _not_send: std::marker::PhantomData,
        }
    }
}

impl DisplayDriver for VcDisplayDriver {
    fn name(&self) -> &'static str {
        "videocore"
    }

    fn display_open(&mut self, id: u32) -> Result<DisplayHandle, DisplayError> {
        trace!("vc_dispmanx_display_open({})", id);
        let raw = unsafe { ffi::vc_dispmanx_display_open(id) };
        DisplayHandle::from_raw(raw).ok_or(DisplayError::DisplayUnavailable { id })
    }

    fn display_get_info(&mut self, display: DisplayHandle) -> Result<ModeInfo, DisplayError> {
        let mut info = ffi::DISPMANX_MODEINFO_T::default();
        let status = unsafe { ffi::vc_dispmanx_display_get_info(display.raw(), &mut info) };
        check(status, DisplayError::QueryFailed)?;
        Ok(ModeInfo {
            width: info.width,
            height: info.height,
            display_num: info.display_num,
        })
    }

    fn display_close(&mut self, display: DisplayHandle) -> Result<(), DisplayError> {
        let status = unsafe { ffi::vc_dispmanx_display_close(display.raw()) };
        check(status, DisplayError::CloseFailed)
    }

    fn resource_create(
        &mut self,
        format: ImageFormat,
        width: u32,
        height: u32,
    ) -> Result<ResourceHandle, DisplayError> {
        // Output parameter the platform fills in; unused for dispmanx resources.
        let mut native_image_handle: u32 = 0;
        let raw = unsafe {
            ffi::vc_dispmanx_resource_create(format as u32, width, height, &mut native_image_handle)
        };
        ResourceHandle::from_raw(raw).ok_or(DisplayError::AllocationFailed { width, height })
    }

    fn resource_write_data(
        &mut self,
        resource: ResourceHandle,
        format: ImageFormat,
        pitch: u32,
        data: &[u8],
        rect: &Rect,
    ) -> Result<(), DisplayError> {
        if data.len() < pitch as usize * rect.height.max(0) as usize {
            return Err(DisplayError::write_failed("buffer shorter than rect"));
        }
        let pitch = c_int::try_from(pitch)
            .map_err(|_| DisplayError::write_failed("pitch overflows c_int"))?;
        // SAFETY: data covers pitch * rect.height bytes (checked above); the
        // platform only reads through src_address despite the mutable type.
        let status = unsafe {
            ffi::vc_dispmanx_resource_write_data(
                resource.raw(),
                format as u32,
                pitch,
                data.as_ptr() as *mut c_void,
                rect,
            )
        };
        check(status, DisplayError::write_failed("platform rejected the upload"))
    }

    fn resource_delete(&mut self, resource: ResourceHandle) -> Result<(), DisplayError> {
        let status = unsafe { ffi::vc_dispmanx_resource_delete(resource.raw()) };
        check(status, DisplayError::ResourceReleaseFailed)
    }

    fn update_start(&mut self, priority: i32) -> Result<UpdateHandle, DisplayError> {
        let raw = unsafe { ffi::vc_dispmanx_update_start(priority) };
        UpdateHandle::from_raw(raw).ok_or(DisplayError::TransactionFailed)
    }

    fn element_add(
        &mut self,
        update: UpdateHandle,
        spec: &ElementSpec,
    ) -> Result<ElementHandle, DisplayError> {
        let mut alpha = ffi::VC_DISPMANX_ALPHA_T {
            flags: spec.alpha.flags.bits(),
            opacity: spec.alpha.opacity,
            mask: spec.alpha.mask,
        };
        trace!(
            "vc_dispmanx_element_add(layer={}, dst={:?}, src={:?})",
            spec.layer,
            spec.dst_rect,
            spec.src_rect
        );
        let raw = unsafe {
            ffi::vc_dispmanx_element_add(
                update.raw(),
                spec.display.raw(),
                spec.layer,
                &spec.dst_rect,
                spec.resource.raw(),
                &spec.src_rect,
                spec.protection as u32,
                &mut alpha,
                std::ptr::null_mut(),
                spec.transform as u32,
            )
        };
        ElementHandle::from_raw(raw).ok_or(DisplayError::BindFailed)
    }

    fn element_remove(
        &mut self,
        update: UpdateHandle,
        element: ElementHandle,
    ) -> Result<(), DisplayError> {
        let status = unsafe { ffi::vc_dispmanx_element_remove(update.raw(), element.raw()) };
        check(status, DisplayError::UnbindFailed)
    }

    fn update_submit_sync(&mut self, update: UpdateHandle) -> Result<(), DisplayError> {
        let status = unsafe { ffi::vc_dispmanx_update_submit_sync(update.raw()) };
        check(status, DisplayError::SubmitFailed)
    }
}

impl Drop for VcDisplayDriver {
    fn drop(&mut self) {
        unsafe { ffi::bcm_host_deinit() };
        info!("VcDisplayDriver: bcm_host_deinit");
    }
}
