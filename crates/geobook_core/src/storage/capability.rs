//! Native object capability probing.
//!
//! # Responsibility
//! - Resolve the native object capability right before each use.
//! - Turn any resolution or invocation failure into `CapabilityUnavailable`.
//!
//! # Invariants
//! - Availability is never cached; the extension may come and go between
//!   two calls on the same connection.
//! - A failure is reported to the caller, never raised past it.

use crate::storage::native::{NativeObjectAdapter, NativeObjectDriver, SqliteObjectDriver};
use crate::storage::AdapterResult;
use log::{debug, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Operation that asked for the native capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeOperation {
    Persist,
    Export,
    Migrate,
    Clear,
    ExtractFeatures,
}

impl NativeOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Persist => "persist",
            Self::Export => "export",
            Self::Migrate => "migrate",
            Self::Clear => "clear",
            Self::ExtractFeatures => "extract_features",
        }
    }
}

/// Native capability could not serve one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityUnavailable {
    pub operation: NativeOperation,
    pub reason: String,
}

impl Display for CapabilityUnavailable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "native object capability unavailable for {}: {}",
            self.operation.as_str(),
            self.reason
        )
    }
}

impl Error for CapabilityUnavailable {}

/// Gatekeeper in front of every native object call.
pub struct CapabilityProbe {
    driver: Box<dyn NativeObjectDriver>,
}

impl CapabilityProbe {
    pub fn new(driver: Box<dyn NativeObjectDriver>) -> Self {
        Self { driver }
    }

    /// Probe backed by the SQLite extension table.
    pub fn sqlite() -> Self {
        Self::new(Box::new(SqliteObjectDriver))
    }

    /// Resolves the capability and runs `invoke` against it.
    ///
    /// Both a failed resolution and an error returned by `invoke` are
    /// reported as `CapabilityUnavailable`.
    pub fn try_native<T, F>(
        &self,
        conn: &Connection,
        operation: NativeOperation,
        invoke: F,
    ) -> Result<T, CapabilityUnavailable>
    where
        F: FnOnce(&NativeObjectAdapter<'_>) -> AdapterResult<T>,
    {
        if let Err(err) = self.driver.resolve(conn) {
            debug!(
                "event=native_probe module=storage status=unavailable op={} error={}",
                operation.as_str(),
                err
            );
            return Err(CapabilityUnavailable {
                operation,
                reason: err.to_string(),
            });
        }

        let adapter = NativeObjectAdapter::new(self.driver.as_ref());
        invoke(&adapter).map_err(|err| {
            warn!(
                "event=native_probe module=storage status=error op={} error={}",
                operation.as_str(),
                err
            );
            CapabilityUnavailable {
                operation,
                reason: err.to_string(),
            }
        })
    }

    /// Returns whether the capability resolves on `conn` right now.
    pub fn is_available(&self, conn: &Connection) -> bool {
        self.driver.resolve(conn).is_ok()
    }
}

impl Default for CapabilityProbe {
    fn default() -> Self {
        Self::sqlite()
    }
}

#[cfg(test)]
mod tests {
    use super::{CapabilityProbe, NativeOperation};
    use crate::db::open_db_in_memory;
    use crate::storage::native::{install_native_objects, uninstall_native_objects};
    use crate::storage::AdapterError;

    #[test]
    fn availability_follows_extension_between_calls() {
        let conn = open_db_in_memory().unwrap();
        let probe = CapabilityProbe::sqlite();
        assert!(!probe.is_available(&conn));

        install_native_objects(&conn).unwrap();
        assert!(probe.is_available(&conn));

        uninstall_native_objects(&conn).unwrap();
        assert!(!probe.is_available(&conn));
    }

    #[test]
    fn invocation_error_becomes_unavailable() {
        let conn = open_db_in_memory().unwrap();
        install_native_objects(&conn).unwrap();
        let probe = CapabilityProbe::sqlite();

        let err = probe
            .try_native(&conn, NativeOperation::Export, |_| -> Result<(), _> {
                Err(AdapterError::Driver("boom".to_string()))
            })
            .unwrap_err();
        assert_eq!(err.operation, NativeOperation::Export);
        assert!(err.reason.contains("boom"));
    }

    #[test]
    fn unresolved_capability_skips_invocation() {
        let conn = open_db_in_memory().unwrap();
        let probe = CapabilityProbe::sqlite();
        let mut invoked = false;

        let result = probe.try_native(&conn, NativeOperation::Persist, |_| {
            invoked = true;
            Ok(())
        });
        assert!(result.is_err());
        assert!(!invoked);
    }
}
