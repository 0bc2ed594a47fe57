//! Application status codes returned in the `code` field of iTop responses.

use std::fmt;

use crate::error::ItopError;

/// iTop REST API status codes.
///
/// The numeric values are fixed by the iTop REST/JSON API documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Success.
    Ok,
    /// Missing or wrong credentials, or the account lacks REST rights.
    Unauthorized,
    /// The `version` parameter is missing.
    MissingVersion,
    /// The `json_data` parameter is missing.
    MissingJson,
    /// The `json_data` parameter is not valid JSON.
    InvalidJson,
    /// The `auth_user` parameter is missing.
    MissingAuthUser,
    /// The `auth_pwd` parameter is missing.
    MissingAuthPwd,
    /// The requested API version is not supported.
    UnsupportedVersion,
    /// The requested operation is not known.
    UnknownOperation,
    /// The operation could not be performed safely.
    Unsafe,
    /// Unexpected server-side failure.
    InternalError,
}

/// Lookup table from numeric code to status.
const STATUS_TABLE: [(i64, StatusCode); 11] = [
    (0, StatusCode::Ok),
    (1, StatusCode::Unauthorized),
    (2, StatusCode::MissingVersion),
    (3, StatusCode::MissingJson),
    (4, StatusCode::InvalidJson),
    (5, StatusCode::MissingAuthUser),
    (6, StatusCode::MissingAuthPwd),
    (10, StatusCode::UnsupportedVersion),
    (11, StatusCode::UnknownOperation),
    (12, StatusCode::Unsafe),
    (100, StatusCode::InternalError),
];

impl StatusCode {
    /// Maps a numeric code to its status.
    ///
    /// # Errors
    ///
    /// Returns `ItopError::UnknownStatusCode` for values outside the table.
    pub fn from_code(code: i64) -> Result<Self, ItopError> {
        STATUS_TABLE
            .iter()
            .find(|(value, _)| *value == code)
            .map(|(_, status)| *status)
            .ok_or(ItopError::UnknownStatusCode(code))
    }

    /// Returns the numeric code.
    pub fn code(&self) -> i64 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::Unauthorized => 1,
            StatusCode::MissingVersion => 2,
            StatusCode::MissingJson => 3,
            StatusCode::InvalidJson => 4,
            StatusCode::MissingAuthUser => 5,
            StatusCode::MissingAuthPwd => 6,
            StatusCode::UnsupportedVersion => 10,
            StatusCode::UnknownOperation => 11,
            StatusCode::Unsafe => 12,
            StatusCode::InternalError => 100,
        }
    }

    /// Returns the documented name, e.g. `UNAUTHORIZED`.
    pub fn name(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Unauthorized => "UNAUTHORIZED",
            StatusCode::MissingVersion => "MISSING_VERSION",
            StatusCode::MissingJson => "MISSING_JSON",
            StatusCode::InvalidJson => "INVALID_JSON",
            StatusCode::MissingAuthUser => "MISSING_AUTH_USER",
            StatusCode::MissingAuthPwd => "MISSING_AUTH_PWD",
            StatusCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            StatusCode::UnknownOperation => "UNKNOWN_OPERATION",
            StatusCode::Unsafe => "UNSAFE",
            StatusCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns true for `OK`.
    pub fn is_ok(&self) -> bool {
        *self == StatusCode::Ok
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i64> for StatusCode {
    type Error = ItopError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}
