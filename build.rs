//! Build script for docval.
//!
//! Embeds the build timestamp shown in the version banner.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    if let Some(date) = get_build_time() {
        println!("cargo:rustc-env=DOCVAL_BUILD_TIME={}", date);
    }
}

fn get_build_time() -> Option<String> {
    Command::new("date")
        .args(["-u", "+%Y-%m-%dT%H:%M:%SZ"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                String::from_utf8(output.stdout)
                    .ok()
                    .map(|s| s.trim().to_string())
            } else {
                None
            }
        })
}
