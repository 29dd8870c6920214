//! Version banner

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build timestamp embedded by the build script, if it could be determined
pub fn build_time() -> &'static str {
    option_env!("DOCVAL_BUILD_TIME").unwrap_or("(unknown)")
}

pub fn banner() -> String {
    format!("docval (version: {}  build: {})", VERSION, build_time())
}
