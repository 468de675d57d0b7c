// src/display/mod.rs
//! Display stack built on a platform driver (Strategy Pattern).
//!
//! - DisplayDriver: platform primitives (VideoCore, headless)
//! - OpenDisplay: display handle management
//! - PixelResource: off-screen resource allocation and upload
//! - UpdateTransaction / Element: compositor binding

pub mod driver;
pub mod drivers;
pub mod element;
pub mod error;
pub mod manager;
pub mod resource;
pub mod types;

pub use driver::DisplayDriver;
pub use element::{Element, UpdateTransaction};
pub use error::DisplayError;
pub use manager::OpenDisplay;
pub use resource::PixelResource;
pub use types::{ElementSpec, Geometry};
