//! Build metadata generated by the build script.
//! The generated version.rs is included here so the binary and the library
//! share a single source of truth.

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// Crate version from Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Build time string from the build script (UTC)
pub fn build_time() -> &'static str {
    BUILD_TIME
}

/// Short git hash captured by the build script
pub fn git_hash() -> &'static str {
    GIT_HASH
}

/// One-line build description used by `--version` and the startup log
pub fn long_version() -> String {
    format!("{} (build {}, {})", version(), git_hash(), build_time())
}
