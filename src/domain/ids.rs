//! Domain identifier types with validation
//!
//! Newtype wrappers for the identifiers that flow through an upload: the
//! subject (patient) the data belongs to and the device that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subject (patient) identifier newtype wrapper
///
/// Identifies the patient resource on the remote repository. Also used as the
/// key for persisted credentials and device watermarks.
///
/// # Examples
///
/// ```
/// use glucobridge::domain::ids::SubjectId;
/// use std::str::FromStr;
///
/// let subject = SubjectId::from_str("5b1f0a2e-9c3d-4e55-a3c8-0f6f2d1e7a10").unwrap();
/// assert_eq!(subject.reference(), "Patient/5b1f0a2e-9c3d-4e55-a3c8-0f6f2d1e7a10");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(String);

impl SubjectId {
    /// Creates a new SubjectId from a string
    ///
    /// # Returns
    ///
    /// Returns `Ok(SubjectId)` if the ID is valid, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Subject ID cannot be empty".to_string());
        }
        if id.contains('/') {
            return Err(format!(
                "Subject ID must be a bare id without a resource type prefix, got: {id}"
            ));
        }
        Ok(Self(id))
    }

    /// Returns the subject ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Relative reference to the patient resource (`Patient/<id>`)
    pub fn reference(&self) -> String {
        format!("Patient/{}", self.0)
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubjectId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for SubjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Device identifier newtype wrapper
///
/// The uploader reports device ids such as `DexG6MobRec_SM12345678`. They are
/// opaque strings; an empty id is allowed because some exports omit it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a new DeviceId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the device ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the device id is missing from the source entry
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
