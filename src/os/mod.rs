// src/os/mod.rs
//! Thin wrappers over the OS facilities the session waits on.

pub mod poll;
pub mod signals;
