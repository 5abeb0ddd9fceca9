//! Error types for acquisition-profile handling.
//!
//! This module defines [`SelectorError`], the error type shared by the selection
//! resolver, the fragment synthesizer and the acquisition-group synchronizer.
//! Using the `thiserror` crate, it provides one consistent error surface over the
//! three external collaborators (configuration registry, device discovery, live
//! hardware group) and over the local document formats (JSON profiles, XML
//! configuration bodies).
//!
//! ## Error Hierarchy
//!
//! Unresolvable component and data-source references are deliberately *not*
//! represented here. They are ordinary values ([`crate::ResolutionError`]) that
//! accumulate in a list the caller inspects, so that a partially available
//! hardware environment never aborts a resolution pass.
//!
//! - **`MissingController` / `MissingTimer`**: raised only while pushing a group
//!   descriptor. Nothing is written to the live group when these occur.
//! - **`UnknownFragment`**: removal of a dynamic fragment that was never created.
//! - **`UnknownComponent` / `UnknownDataSource`**: a registry fetch for a name the
//!   registry does not hold.
//! - **`Registry` / `Discovery` / `LiveGroup`**: failures reported by the
//!   collaborators themselves.
//! - **`Json` / `Xml` / `Io`**: document encoding and file access failures.
//! - **`Configuration`**: semantic validation failures of the selector settings.
//!
//! By using `#[from]`, `SelectorError` can be created from `serde_json` and I/O
//! errors with the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the selector error type.
pub type Result<T> = std::result::Result<T, SelectorError>;

/// Primary error type for acquisition-profile operations.
#[derive(Error, Debug)]
pub enum SelectorError {
    /// A channel resolved against live hardware but reports no controller.
    ///
    /// Pushing a descriptor whose channel has no backing controller would leave
    /// the acquisition runtime with a dangling entry, so the push is aborted.
    #[error("No controller found for channel '{channel}'")]
    MissingController {
        /// Channel name as it appears in the profile.
        channel: String,
    },

    /// The group has channels but none of its declared timers resolves.
    #[error("No resolvable timer for acquisition group '{group}'")]
    MissingTimer {
        /// Acquisition-group name.
        group: String,
    },

    /// Removal of a dynamic fragment name that was never created.
    #[error("Dynamic fragment '{name}' does not exist")]
    UnknownFragment {
        /// Requested fragment name.
        name: String,
    },

    /// No component of that name is registered.
    #[error("Component '{name}' is not registered")]
    UnknownComponent {
        /// Requested component name.
        name: String,
    },

    /// No data source of that name is registered.
    #[error("Data source '{name}' is not registered")]
    UnknownDataSource {
        /// Requested data-source name.
        name: String,
    },

    /// Configuration registry failure.
    #[error("Configuration registry error: {0}")]
    Registry(String),

    /// Device discovery failure.
    #[error("Device discovery error: {0}")]
    Discovery(String),

    /// Live hardware group read/write failure.
    #[error("Live group error: {0}")]
    LiveGroup(String),

    /// Selector settings parse but are semantically invalid.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Malformed JSON document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed XML in a registry body or failure while writing a fragment.
    #[error("XML error: {0}")]
    Xml(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for SelectorError {
    fn from(err: quick_xml::Error) -> Self {
        SelectorError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SelectorError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        SelectorError::Xml(err.to_string())
    }
}

impl SelectorError {
    /// Whether the error leaves the live hardware state untouched and the
    /// operation can simply be retried once the environment changes.
    pub fn can_recover(&self) -> bool {
        !matches!(
            self,
            SelectorError::Json(_) | SelectorError::Xml(_) | SelectorError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_controller_names_channel() {
        let err = SelectorError::MissingController {
            channel: "ct01".into(),
        };
        assert_eq!(err.to_string(), "No controller found for channel 'ct01'");
        assert!(err.can_recover());
    }

    #[test]
    fn json_errors_convert_and_are_not_recoverable() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: SelectorError = parse.unwrap_err().into();
        assert!(matches!(err, SelectorError::Json(_)));
        assert!(!err.can_recover());
    }
}
