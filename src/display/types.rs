// src/display/types.rs
//! Plain data shared between the display components and the drivers.
//!
//! Handles are the platform's 32-bit opaque values. Zero is the platform's
//! "no handle" sentinel and never appears inside one of these wrappers.

use bitflags::bitflags;

/// Bytes per pixel of the only supported storage format.
pub const BYTES_PER_PIXEL: usize = 3;

/// Fraction bits of the compositor's source-rectangle coordinate space.
pub const SUBPIXEL_SHIFT: u32 = 16;

/// Opacity value meaning fully opaque.
pub const OPAQUE: u32 = 255;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Wraps a raw platform handle, rejecting the null sentinel.
            pub fn from_raw(raw: u32) -> Option<Self> {
                (raw != 0).then_some(Self(raw))
            }

            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// An open display.
    DisplayHandle
);
handle!(
    /// An off-screen pixel resource.
    ResourceHandle
);
handle!(
    /// A compositing-stack element.
    ElementHandle
);
handle!(
    /// An open update transaction.
    UpdateHandle
);

/// Display geometry in pixels, fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Row stride of a packed RGB888 buffer.
    pub fn pitch(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Exact number of bytes in one frame.
    pub fn frame_len(&self) -> usize {
        self.pitch() * self.height as usize
    }

    /// The full extent in device pixels.
    pub fn pixel_rect(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// The full extent in the 16.16 source coordinate space.
    pub fn subpixel_rect(&self) -> Rect {
        self.pixel_rect().to_subpixel()
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Mode information reported by the platform for an open display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeInfo {
    pub width: i32,
    pub height: i32,
    pub display_num: u32,
}

/// Rectangle layout matching the platform's `VC_RECT_T`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Shifts every coordinate into the 16.16 fixed-point space.
    pub fn to_subpixel(self) -> Self {
        Self {
            x: self.x << SUBPIXEL_SHIFT,
            y: self.y << SUBPIXEL_SHIFT,
            width: self.width << SUBPIXEL_SHIFT,
            height: self.height << SUBPIXEL_SHIFT,
        }
    }
}

/// Pixel storage formats understood by the platform (`VC_IMAGE_TYPE_T`).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Rgb888 = 5,
}

bitflags! {
    /// `DISPMANX_FLAGS_ALPHA_T`. `FROM_SOURCE` is the zero value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AlphaFlags: u32 {
        const FROM_SOURCE = 0;
        const FIXED_ALL_PIXELS = 1;
        const FIXED_NON_ZERO = 2;
        const FIXED_EXCEED_0X07 = 3;
        const PREMULT = 1 << 16;
        const MIX = 1 << 17;
    }
}

/// Alpha policy of an element, laid out as `VC_DISPMANX_ALPHA_T`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alpha {
    pub flags: AlphaFlags,
    pub opacity: u32,
    /// Mask resource handle; 0 for none.
    pub mask: u32,
}

impl Alpha {
    /// Alpha taken from the source but pinned to fully opaque on every pixel.
    pub const fn opaque_pinned() -> Self {
        Self {
            flags: AlphaFlags::FROM_SOURCE.union(AlphaFlags::FIXED_ALL_PIXELS),
            opacity: OPAQUE,
            mask: 0,
        }
    }
}

/// `DISPMANX_PROTECTION_T`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    None = 0,
}

/// `DISPMANX_TRANSFORM_T`.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Rot0 = 0,
}

/// Everything the platform needs to add one element to a display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementSpec {
    pub display: DisplayHandle,
    pub layer: i32,
    pub dst_rect: Rect,
    pub resource: ResourceHandle,
    pub src_rect: Rect,
    pub protection: Protection,
    pub alpha: Alpha,
    pub transform: Transform,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_should_reject_the_null_handle() {
        assert_eq!(DisplayHandle::from_raw(0), None);
        assert_eq!(DisplayHandle::from_raw(7).map(DisplayHandle::raw), Some(7));
    }

    #[test]
    fn it_should_express_the_source_rect_in_sixteen_sixteen_fixed_point() {
        let geometry = Geometry::new(1920, 1080);
        assert_eq!(geometry.pixel_rect(), Rect::new(0, 0, 1920, 1080));
        assert_eq!(
            geometry.subpixel_rect(),
            Rect::new(0, 0, 1920 * 65536, 1080 * 65536)
        );
    }

    #[test]
    fn it_should_size_frames_as_packed_rgb() {
        let geometry = Geometry::new(2, 1);
        assert_eq!(geometry.pitch(), 6);
        assert_eq!(geometry.frame_len(), 6);
        assert_eq!(geometry.to_string(), "2x1");
    }

    #[test]
    fn it_should_pin_alpha_to_opaque() {
        let alpha = Alpha::opaque_pinned();
        assert_eq!(alpha.flags.bits(), 1);
        assert_eq!(alpha.opacity, 255);
        assert_eq!(alpha.mask, 0);
    }
}
