/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git commit SHA
pub const GIT_SHA: &str = env!("VERGEN_GIT_SHA");

/// Whether the working tree had uncommitted changes
pub const GIT_DIRTY: &str = env!("VERGEN_GIT_DIRTY");

pub const RUSTC_VERSION: &str = env!("VERGEN_RUSTC_SEMVER");

pub const BUILD_TIMESTAMP: &str = env!("VERGEN_BUILD_TIMESTAMP");

pub const TARGET: &str = env!("VERGEN_CARGO_TARGET_TRIPLE");

/// User agent sent to NetBox and MaaS.
pub const USER_AGENT: &str = concat!("maasbox/", env!("CARGO_PKG_VERSION"));

/// `<version> (<git_sha>) [dirty]`
pub fn full_version() -> String {
    let dirty = if GIT_DIRTY == "true" { " dirty" } else { "" };
    format!("{VERSION} ({GIT_SHA}{dirty})")
}

/// Build details printed by `maasbox version`.
pub fn build_info() -> String {
    format!(
        "maasbox {}\n\
         built:  {}\n\
         rustc:  {}\n\
         target: {}",
        full_version(),
        BUILD_TIMESTAMP,
        RUSTC_VERSION,
        TARGET
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_version_starts_with_crate_version() {
        assert!(full_version().starts_with(VERSION));
        assert!(USER_AGENT.ends_with(VERSION));
        assert!(build_info().contains(TARGET));
    }
}
