use std::cmp::Ordering;
use std::fmt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Server version string such as `3.11.4` or `3.12.0-devel`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(version: impl Into<String>) -> Self {
        Version(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn component(&self, index: usize) -> Option<u32> {
        let numeric = self.0.split(['-', '+']).next().unwrap_or_default();
        numeric.split('.').nth(index).and_then(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
    }

    pub fn major(&self) -> u32 {
        self.component(0).unwrap_or(0)
    }

    pub fn minor(&self) -> u32 {
        self.component(1).unwrap_or(0)
    }

    /// Patch level; `None` when the version has only major.minor
    pub fn sub(&self) -> Option<u32> {
        self.component(2)
    }

    /// Suffix after the numeric part, e.g. `devel` in `3.12.0-devel`
    pub fn suffix(&self) -> Option<&str> {
        self.0.split_once('-').map(|(_, suffix)| suffix)
    }

    /// Compare major, minor and sub version numbers
    pub fn compare_to(&self, other: &Version) -> Ordering {
        (self.major(), self.minor(), self.sub().unwrap_or(0))
            .cmp(&(other.major(), other.minor(), other.sub().unwrap_or(0)))
    }

    pub fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major(), self.minor()) >= (major, minor)
    }
}

impl From<&str> for Version {
    fn from(version: &str) -> Self {
        Version::new(version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response of `GET /_api/version`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Always `arango`
    pub server: String,
    pub version: Version,
    /// `community` or `enterprise`
    #[serde(default)]
    pub license: String,
    /// Only present when details were requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Map<String, Value>>,
}

impl VersionInfo {
    pub fn is_enterprise(&self) -> bool {
        self.license == "enterprise"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_components() {
        let v = Version::new("3.11.4-1");
        assert_eq!(v.major(), 3);
        assert_eq!(v.minor(), 11);
        assert_eq!(v.sub(), Some(4));
        assert_eq!(v.suffix(), Some("1"));

        let v = Version::new("3.12");
        assert_eq!(v.sub(), None);
        assert!(v.at_least(3, 12));
        assert!(!v.at_least(3, 13));
    }

    #[test]
    fn test_version_compare() {
        let a = Version::new("3.10.9");
        let b = Version::new("3.11.0-devel");
        assert_eq!(a.compare_to(&b), Ordering::Less);
        assert_eq!(b.compare_to(&Version::new("3.11")), Ordering::Equal);
    }

    #[test]
    fn test_version_info() {
        let body = r#"{"server":"arango","version":"3.11.4","license":"enterprise"}"#;
        let info: VersionInfo = serde_json::from_str(body).unwrap();
        assert!(info.is_enterprise());
        assert_eq!(info.version.minor(), 11);
        assert!(info.details.is_none());
    }
}
