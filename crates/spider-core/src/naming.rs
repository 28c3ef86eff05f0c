//! Name codec: namespace prefixes and composite names.
//!
//! Stored names are derived from caller names in two ways:
//!
//! ```text
//!   namespace "t1", name "web"          ->  "t1-web"
//!   vpc "vpc-01", security group "web"  ->  "vpc-01-delimiter-web"
//!   both                                ->  "t1-vpc-01-delimiter-web"
//! ```
//!
//! Names may never contain the composite delimiter, and namespaces may never
//! contain the namespace separator, so both encodings split unambiguously.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Separator between a parent name and a child name in a composite name.
pub const COMPOSITE_DELIMITER: &str = "-delimiter-";

/// Separator between a namespace and a name.
pub const NAMESPACE_SEPARATOR: char = '-';

/// Prefix `name` with a namespace.
#[must_use]
pub fn attach_namespace(namespace: &str, name: &str) -> String {
    format!("{namespace}{NAMESPACE_SEPARATOR}{name}")
}

/// Remove the first occurrence of the namespace prefix from `key`.
///
/// Keys without the prefix are returned unchanged.
#[must_use]
pub fn detach_namespace(namespace: &str, key: &str) -> String {
    let prefix = format!("{namespace}{NAMESPACE_SEPARATOR}");
    key.replacen(&prefix, "", 1)
}

/// Join a parent and a child name into a composite name.
#[must_use]
pub fn compose(parent: &str, child: &str) -> String {
    format!("{parent}{COMPOSITE_DELIMITER}{child}")
}

/// Split a composite name into `(parent, child)`.
///
/// Returns `None` if `key` is not a composite name.
#[must_use]
pub fn decompose(key: &str) -> Option<(&str, &str)> {
    key.split_once(COMPOSITE_DELIMITER)
}

/// Validate a caller-supplied resource name.
///
/// # Errors
///
/// Returns `CoreError::InvalidName` if the name is empty, has surrounding
/// whitespace, contains control characters or the composite delimiter.
pub fn validate_name(name: &str) -> Result<()> {
    check("name", name)
}

fn check(field: &'static str, value: &str) -> Result<()> {
    let reject = |reason: &str| -> Result<()> {
        Err(CoreError::InvalidName {
            field,
            reason: reason.to_string(),
        })
    };

    if value.is_empty() {
        return reject("must not be empty");
    }
    if value.trim() != value {
        return reject("must not start or end with whitespace");
    }
    if value.chars().any(char::is_control) {
        return reject("must not contain control characters");
    }
    if value.contains(COMPOSITE_DELIMITER) {
        return reject(&format!("must not contain '{COMPOSITE_DELIMITER}'"));
    }
    Ok(())
}

/// A validated tenant namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    /// Validate and wrap a namespace.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidName` if the namespace fails name validation
    /// or contains the namespace separator.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        check("namespace", &value)?;
        if value.contains(NAMESPACE_SEPARATOR) {
            return Err(CoreError::InvalidName {
                field: "namespace",
                reason: format!("must not contain '{NAMESPACE_SEPARATOR}'"),
            });
        }
        Ok(Self(value))
    }

    /// Return the namespace as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Namespace {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}

/// Maps caller names to stored names for one caller scope.
///
/// Without a namespace the mapping is the identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameCodec {
    namespace: Option<Namespace>,
}

impl NameCodec {
    /// Create a codec for an optional namespace.
    #[must_use]
    pub const fn new(namespace: Option<Namespace>) -> Self {
        Self { namespace }
    }

    /// The namespace this codec applies, if any.
    #[must_use]
    pub const fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }

    /// Stored name for a caller name.
    #[must_use]
    pub fn to_stored(&self, name: &str) -> String {
        match &self.namespace {
            Some(ns) => attach_namespace(ns.as_str(), name),
            None => name.to_string(),
        }
    }

    /// Caller name for a stored name, or `None` if the stored name belongs to
    /// another namespace.
    #[must_use]
    pub fn to_user(&self, stored: &str) -> Option<String> {
        match &self.namespace {
            Some(ns) => {
                let prefix = attach_namespace(ns.as_str(), "");
                stored
                    .starts_with(&prefix)
                    .then(|| detach_namespace(ns.as_str(), stored))
            }
            None => Some(stored.to_string()),
        }
    }

    /// Whether a stored name is visible through this codec.
    #[must_use]
    pub fn owns(&self, stored: &str) -> bool {
        self.to_user(stored).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_attach_detach() {
        assert_eq!(attach_namespace("t1", "web"), "t1-web");
        assert_eq!(detach_namespace("t1", "t1-web"), "web");
        // only the first occurrence is removed
        assert_eq!(detach_namespace("t1", "t1-a-t1-b"), "a-t1-b");
        assert_eq!(detach_namespace("t1", "other"), "other");
    }

    #[test]
    fn composite_split_takes_first_delimiter() {
        let key = compose("vpc-01", "web");
        assert_eq!(key, "vpc-01-delimiter-web");
        assert_eq!(decompose(&key), Some(("vpc-01", "web")));
        assert_eq!(decompose("plain"), None);
    }

    #[test]
    fn names_with_delimiter_are_rejected() {
        assert!(validate_name("web").is_ok());
        assert!(validate_name("web-1_a.b").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(" web").is_err());
        assert!(validate_name("we\nb").is_err());
        assert!(matches!(
            validate_name("a-delimiter-b"),
            Err(CoreError::InvalidName { field: "name", .. })
        ));
    }

    #[test]
    fn namespace_rejects_separator() {
        assert!(Namespace::new("tenant1").is_ok());
        assert!(Namespace::new("tenant-1").is_err());
        assert!(Namespace::new("").is_err());
    }

    #[test]
    fn codec_roundtrip_and_ownership() {
        let codec = NameCodec::new(Some(Namespace::new("t1").unwrap()));
        let stored = codec.to_stored("web");
        assert_eq!(stored, "t1-web");
        assert_eq!(codec.to_user(&stored).as_deref(), Some("web"));
        assert!(!codec.owns("t2-web"));
        assert!(!codec.owns("web"));

        let plain = NameCodec::default();
        assert_eq!(plain.to_stored("web"), "web");
        assert!(plain.owns("t1-web"));
    }

    #[test]
    fn namespaced_composite_name() {
        let codec = NameCodec::new(Some(Namespace::new("t1").unwrap()));
        let stored = codec.to_stored(&compose("vpc-01", "web"));
        assert_eq!(stored, "t1-vpc-01-delimiter-web");
        let user = codec.to_user(&stored).unwrap();
        assert_eq!(decompose(&user), Some(("vpc-01", "web")));
    }

    #[test]
    fn namespace_serde_validates() {
        let ok: Namespace = serde_json::from_str("\"t1\"").unwrap();
        assert_eq!(ok.as_str(), "t1");
        assert!(serde_json::from_str::<Namespace>("\"t-1\"").is_err());
    }
}
