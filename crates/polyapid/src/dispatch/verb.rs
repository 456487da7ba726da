//! HTTP verb to abstract operation mapping.

use std::fmt;

/// Abstract operation a capability table can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    /// `POST`.
    Create,
    /// `GET`.
    Read,
    /// `PUT`.
    Update,
    /// `PATCH`.
    Patch,
    /// `DELETE`.
    Delete,
}

impl Operation {
    /// Maps an HTTP method name to its operation.
    ///
    /// Matching is exact; HTTP method names are case-sensitive.
    ///
    /// # Example
    ///
    /// ```
    /// use polyapid::Operation;
    ///
    /// assert_eq!(Operation::from_method("POST"), Some(Operation::Create));
    /// assert_eq!(Operation::from_method("OPTIONS"), None);
    /// ```
    #[must_use]
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "POST" => Some(Self::Create),
            "GET" => Some(Self::Read),
            "PUT" => Some(Self::Update),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Returns the HTTP method bound to this operation.
    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            Self::Create => "POST",
            Self::Read => "GET",
            Self::Update => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Returns the canonical operation name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
