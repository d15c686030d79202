//! Director version parsing and capability gates.
//!
//! Directors report versions in two shapes:
//! - stemcell style, four components: `1.3262.0.0 (00000000)`, major is the second
//! - semver style, two or three components: `260.4 (00000000)`, `261.0.0 (00000000)`

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::director::{Director, DirectorError};

const MIN_STEMCELL_MAJOR_FOR_ODB: u64 = 3262;
const MIN_SEMVER_MAJOR_FOR_ODB: u64 = 257;
const MIN_SEMVER_MAJOR_FOR_LIFECYCLE_ERRANDS: u64 = 261;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("unrecognised director version: '{0}'")]
    Unrecognised(String),

    #[error("could not fetch director info: {0}")]
    Info(#[from] DirectorError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionType {
    Stemcell,
    Semver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Version {
    pub major: u64,
    pub version_type: VersionType,
}

impl Version {
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let unrecognised = || VersionError::Unrecognised(raw.to_string());

        let token = raw.split_whitespace().next().ok_or_else(unrecognised)?;
        let parts: Vec<&str> = token.split('.').collect();
        let (major, version_type) = match parts.len() {
            4 => (parts[1], VersionType::Stemcell),
            2 | 3 => (parts[0], VersionType::Semver),
            _ => return Err(unrecognised()),
        };
        let major = major.parse().map_err(|_| unrecognised())?;

        Ok(Self {
            major,
            version_type,
        })
    }

    /// Whether the director is recent enough to host on-demand deployments.
    pub fn supports_odb(&self) -> bool {
        match self.version_type {
            VersionType::Stemcell => self.major >= MIN_STEMCELL_MAJOR_FOR_ODB,
            VersionType::Semver => self.major >= MIN_SEMVER_MAJOR_FOR_ODB,
        }
    }

    /// Whether the director can run errands as part of a deployment's lifecycle.
    pub fn supports_lifecycle_errands(&self) -> bool {
        self.version_type == VersionType::Semver
            && self.major >= MIN_SEMVER_MAJOR_FOR_LIFECYCLE_ERRANDS
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Ask the director for its version and parse it.
pub async fn probe_director_version(director: &dyn Director) -> Result<Version, VersionError> {
    let info = director.info().await?;
    let version = Version::parse(&info.version)?;
    debug!(raw = %info.version, major = version.major, "parsed director version");
    Ok(version)
}
