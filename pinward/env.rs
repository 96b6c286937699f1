//! Information stamped in by `build.rs`

/// The pinward version, as an UTF-8 string
///
/// "<major>.<minor>.<patch> [<rustc>]" for tagged releases, otherwise the abbreviated git
/// commit and its date follow the version number.
pub const VERSION_STRING: &str = env!("PINWARD_VERSION_STRING");

/// [`VERSION_STRING`] prefixed with the name of the tool
pub const RELEASE_STRING: &str = env!("PINWARD_RELEASE_STRING");
