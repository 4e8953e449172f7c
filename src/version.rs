//! Build and version information baked in by `build.rs`.

use std::fmt;

pub struct VersionInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub git_branch: &'static str,
    pub git_dirty: bool,
    pub build_date: &'static str,
    pub build_profile: &'static str,
    pub rustc_version: &'static str,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            version: env!("POMOTRACK_VERSION"),
            git_hash: env!("POMOTRACK_GIT_HASH"),
            git_branch: env!("POMOTRACK_GIT_BRANCH"),
            git_dirty: env!("POMOTRACK_GIT_DIRTY") == "true",
            build_date: env!("POMOTRACK_BUILD_DATE"),
            build_profile: env!("POMOTRACK_BUILD_PROFILE"),
            rustc_version: env!("POMOTRACK_RUSTC_VERSION"),
        }
    }

    /// `v0.4.0 (abc1234)`, with `+dirty` when built from a modified tree.
    pub fn short(&self) -> String {
        let dirty = if self.git_dirty { "+dirty" } else { "" };
        format!("v{} ({}{})", self.version, self.git_hash, dirty)
    }

    pub fn is_release(&self) -> bool {
        self.build_profile == "release"
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pomotrack v{}", self.version)?;
        writeln!(
            f,
            "Git: {} ({}){}",
            self.git_hash,
            self.git_branch,
            if self.git_dirty { " +uncommitted changes" } else { "" }
        )?;
        writeln!(
            f,
            "Built: {} ({}{})",
            self.build_date,
            self.build_profile,
            if self.is_release() { "" } else { ", unoptimized" }
        )?;
        writeln!(f, "Rustc: {}", self.rustc_version)
    }
}

/// Multi-line output for `--version-full`.
pub fn version_string() -> String {
    VersionInfo::current().to_string()
}

pub fn short_version() -> String {
    VersionInfo::current().short()
}
