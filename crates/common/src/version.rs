use std::fmt;

use serde::Serialize;

/// Build metadata baked in at compile time by `build.rs`.
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build_profile: &'static str,
    pub build_features: &'static str,
    pub build_timestamp: &'static str,
}

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        build_profile: env!("BUILD_PROFILE"),
        build_features: env!("BUILD_FEATURES"),
        build_timestamp: env!("BUILD_TIMESTAMP"),
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "strongbox {} ({} build, {})",
            self.version, self.build_profile, self.build_timestamp
        )?;
        if !self.build_features.is_empty() {
            write!(f, " features: {}", self.build_features)?;
        }
        Ok(())
    }
}
