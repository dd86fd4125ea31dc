//! CIM status codes as defined by DSP0200.

use serde::{Deserialize, Serialize};

/// Status code carried by a CIM-XML `ERROR` element.
///
/// Codes outside the DMTF enumeration are kept verbatim in `Other` so a
/// fault with code N always reports N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CimStatusCode {
    Failed,
    AccessDenied,
    InvalidNamespace,
    InvalidParameter,
    InvalidClass,
    NotFound,
    NotSupported,
    ClassHasChildren,
    ClassHasInstances,
    InvalidSuperclass,
    AlreadyExists,
    NoSuchProperty,
    TypeMismatch,
    QueryLanguageNotSupported,
    InvalidQuery,
    MethodNotAvailable,
    MethodNotFound,
    NamespaceNotEmpty,
    InvalidEnumerationContext,
    InvalidOperationTimeout,
    PullHasBeenAbandoned,
    PullCannotBeAbandoned,
    FilteredEnumerationNotSupported,
    ContinuationOnErrorNotSupported,
    ServerLimitsExceeded,
    ServerIsShuttingDown,
    Other(u32),
}

/// (code, symbolic name, description), ordered by code.
const STATUS_TABLE: &[(u32, &str, &str)] = &[
    (1, "CIM_ERR_FAILED", "A general error occurred that is not covered by a more specific error code"),
    (2, "CIM_ERR_ACCESS_DENIED", "Access to a CIM resource is not available to the client"),
    (3, "CIM_ERR_INVALID_NAMESPACE", "The target namespace does not exist"),
    (4, "CIM_ERR_INVALID_PARAMETER", "One or more parameter values passed to the method are not valid"),
    (5, "CIM_ERR_INVALID_CLASS", "The specified class does not exist"),
    (6, "CIM_ERR_NOT_FOUND", "The requested object cannot be found"),
    (7, "CIM_ERR_NOT_SUPPORTED", "The requested operation is not supported"),
    (8, "CIM_ERR_CLASS_HAS_CHILDREN", "The operation cannot be invoked on this class because it has subclasses"),
    (9, "CIM_ERR_CLASS_HAS_INSTANCES", "The operation cannot be invoked on this class because one or more instances of this class exist"),
    (10, "CIM_ERR_INVALID_SUPERCLASS", "The operation cannot be invoked because the specified superclass does not exist"),
    (11, "CIM_ERR_ALREADY_EXISTS", "The operation cannot be invoked because an object already exists"),
    (12, "CIM_ERR_NO_SUCH_PROPERTY", "The specified property does not exist"),
    (13, "CIM_ERR_TYPE_MISMATCH", "The value supplied is not compatible with the type"),
    (14, "CIM_ERR_QUERY_LANGUAGE_NOT_SUPPORTED", "The query language is not recognized or supported"),
    (15, "CIM_ERR_INVALID_QUERY", "The query is not valid for the specified query language"),
    (16, "CIM_ERR_METHOD_NOT_AVAILABLE", "The extrinsic method cannot be invoked"),
    (17, "CIM_ERR_METHOD_NOT_FOUND", "The specified extrinsic method does not exist"),
    (20, "CIM_ERR_NAMESPACE_NOT_EMPTY", "The specified namespace is not empty"),
    (21, "CIM_ERR_INVALID_ENUMERATION_CONTEXT", "The enumeration identified by the enumeration context cannot be found"),
    (22, "CIM_ERR_INVALID_OPERATION_TIMEOUT", "The specified operation timeout is not supported"),
    (23, "CIM_ERR_PULL_HAS_BEEN_ABANDONED", "The pull operation has been abandoned"),
    (24, "CIM_ERR_PULL_CANNOT_BE_ABANDONED", "The attempt to abandon a concurrent pull request failed"),
    (25, "CIM_ERR_FILTERED_ENUMERATION_NOT_SUPPORTED", "Using a filter in the enumeration is not supported"),
    (26, "CIM_ERR_CONTINUATION_ON_ERROR_NOT_SUPPORTED", "Continue on error is not supported"),
    (27, "CIM_ERR_SERVER_LIMITS_EXCEEDED", "The WBEM server has failed the operation based upon exceeding server limits"),
    (28, "CIM_ERR_SERVER_IS_SHUTTING_DOWN", "The WBEM server is shutting down"),
];

impl CimStatusCode {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Failed,
            2 => Self::AccessDenied,
            3 => Self::InvalidNamespace,
            4 => Self::InvalidParameter,
            5 => Self::InvalidClass,
            6 => Self::NotFound,
            7 => Self::NotSupported,
            8 => Self::ClassHasChildren,
            9 => Self::ClassHasInstances,
            10 => Self::InvalidSuperclass,
            11 => Self::AlreadyExists,
            12 => Self::NoSuchProperty,
            13 => Self::TypeMismatch,
            14 => Self::QueryLanguageNotSupported,
            15 => Self::InvalidQuery,
            16 => Self::MethodNotAvailable,
            17 => Self::MethodNotFound,
            20 => Self::NamespaceNotEmpty,
            21 => Self::InvalidEnumerationContext,
            22 => Self::InvalidOperationTimeout,
            23 => Self::PullHasBeenAbandoned,
            24 => Self::PullCannotBeAbandoned,
            25 => Self::FilteredEnumerationNotSupported,
            26 => Self::ContinuationOnErrorNotSupported,
            27 => Self::ServerLimitsExceeded,
            28 => Self::ServerIsShuttingDown,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::Failed => 1,
            Self::AccessDenied => 2,
            Self::InvalidNamespace => 3,
            Self::InvalidParameter => 4,
            Self::InvalidClass => 5,
            Self::NotFound => 6,
            Self::NotSupported => 7,
            Self::ClassHasChildren => 8,
            Self::ClassHasInstances => 9,
            Self::InvalidSuperclass => 10,
            Self::AlreadyExists => 11,
            Self::NoSuchProperty => 12,
            Self::TypeMismatch => 13,
            Self::QueryLanguageNotSupported => 14,
            Self::InvalidQuery => 15,
            Self::MethodNotAvailable => 16,
            Self::MethodNotFound => 17,
            Self::NamespaceNotEmpty => 20,
            Self::InvalidEnumerationContext => 21,
            Self::InvalidOperationTimeout => 22,
            Self::PullHasBeenAbandoned => 23,
            Self::PullCannotBeAbandoned => 24,
            Self::FilteredEnumerationNotSupported => 25,
            Self::ContinuationOnErrorNotSupported => 26,
            Self::ServerLimitsExceeded => 27,
            Self::ServerIsShuttingDown => 28,
            Self::Other(code) => *code,
        }
    }

    fn entry(&self) -> Option<&'static (u32, &'static str, &'static str)> {
        let code = self.code();
        STATUS_TABLE.iter().find(|(c, _, _)| *c == code)
    }

    /// Symbolic name, e.g. `CIM_ERR_NOT_FOUND`.
    pub fn name(&self) -> &'static str {
        self.entry().map(|(_, name, _)| *name).unwrap_or("CIM_ERR_UNKNOWN")
    }

    /// Generic description of the status from the DMTF enumeration.
    pub fn description(&self) -> &'static str {
        self.entry()
            .map(|(_, _, desc)| *desc)
            .unwrap_or("Unknown status code")
    }
}

impl std::fmt::Display for CimStatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code(), self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_round_trip() {
        for (code, name, _) in STATUS_TABLE {
            let status = CimStatusCode::from_code(*code);
            assert_eq!(status.code(), *code);
            assert_eq!(status.name(), *name);
            assert!(!matches!(status, CimStatusCode::Other(_)));
        }
    }

    #[test]
    fn unknown_codes_are_preserved() {
        let status = CimStatusCode::from_code(18);
        assert_eq!(status, CimStatusCode::Other(18));
        assert_eq!(status.code(), 18);
        assert_eq!(status.name(), "CIM_ERR_UNKNOWN");

        assert_eq!(CimStatusCode::from_code(4711).code(), 4711);
    }

    #[test]
    fn display_includes_name() {
        assert_eq!(
            CimStatusCode::NotFound.to_string(),
            "6 (CIM_ERR_NOT_FOUND)"
        );
    }
}
