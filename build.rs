// build.rs

use std::path::Path;

// Firmware installs on older Raspberry Pi OS images ship the userland
// libraries here without a pkg-config file.
const LEGACY_VC_LIB_DIR: &str = "/opt/vc/lib";

fn main() {
    println!("cargo:rustc-check-cfg=cfg(vc_dispmanx)");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");

    if std::env::var_os("CARGO_FEATURE_HEADLESS").is_some() {
        eprintln!("Feature 'headless' enabled. Skipping bcm_host detection.");
        return;
    }

    // --- Link against bcm_host ---
    // pkg-config first; it prints the link flags itself on success.
    if pkg_config::probe_library("bcm_host").is_ok() {
        eprintln!("pkg-config found bcm_host. Building the VideoCore display driver.");
        println!("cargo:rustc-cfg=vc_dispmanx");
        return;
    }

    // --- Manual Linking Fallback ---
    let legacy = Path::new(LEGACY_VC_LIB_DIR);
    if legacy.join("libbcm_host.so").exists() {
        println!("cargo:rustc-link-search=native={}", LEGACY_VC_LIB_DIR);
        println!("cargo:rustc-link-lib=bcm_host");
        println!("cargo:rustc-link-lib=vcos");
        println!("cargo:rustc-link-lib=vchiq_arm");
        println!("cargo:rustc-cfg=vc_dispmanx");
        eprintln!(
            "pkg-config failed for bcm_host. Linking manually against {}.",
            LEGACY_VC_LIB_DIR
        );
        return;
    }

    eprintln!("bcm_host not found. Building with the headless display driver only.");
}
