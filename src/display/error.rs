// src/display/error.rs
//! Failure taxonomy for the display components. Every variant names the
//! platform call that failed so the diagnostic can be printed as-is.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DisplayError {
    #[error("vc_dispmanx_display_open failed for display {id}")]
    DisplayUnavailable { id: u32 },

    #[error("vc_dispmanx_display_get_info failed")]
    QueryFailed,

    #[error("vc_dispmanx_display_close failed")]
    CloseFailed,

    #[error("vc_dispmanx_resource_create failed for {width}x{height}")]
    AllocationFailed { width: u32, height: u32 },

    #[error("vc_dispmanx_resource_write_data failed: {reason}")]
    WriteFailed { reason: String },

    #[error("vc_dispmanx_resource_delete failed")]
    ResourceReleaseFailed,

    #[error("vc_dispmanx_update_start failed")]
    TransactionFailed,

    #[error("vc_dispmanx_element_add failed")]
    BindFailed,

    #[error("vc_dispmanx_element_remove failed")]
    UnbindFailed,

    #[error("vc_dispmanx_update_submit_sync failed")]
    SubmitFailed,
}

impl DisplayError {
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }
}
