//! Error types for PlanTopo.
//!
//! This module defines the error hierarchy using `thiserror`. Only the
//! edges of the pipeline are fallible: reading and parsing a plan, parsing
//! identities, loading configuration or an existing topology, and rendering
//! reports. Resolution gaps inside the pipeline never surface here; they
//! degrade to warnings on the import result instead.
//!
//! # Error Categories
//!
//! - **Input errors**: malformed plan JSON, missing `resource_changes`
//! - **IO errors**: file system operations
//! - **Config errors**: invalid configuration files
//! - **Collaborator errors**: layout engine or topology source failures
//! - **Report errors**: serialization failures
//!
//! # Example
//!
//! ```rust
//! use plantopo::error::{PlanTopoError, Result};
//!
//! fn read_plan(path: &str) -> Result<String> {
//!     let content = std::fs::read_to_string(path)
//!         .map_err(|e| PlanTopoError::Io {
//!             path: path.into(),
//!             source: e,
//!             src_path: file!(),
//!             src_line: line!(),
//!         })?;
//!     Ok(content)
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Macro to create errors with automatic source location tracking.
///
/// Usage:
/// ```ignore
/// return Err(err!(InvalidPlan { message: "missing resource_changes".to_string() }));
/// ```
#[macro_export]
macro_rules! err {
    ($variant:ident { $($field:ident: $value:expr),* $(,)? }) => {
        $crate::error::PlanTopoError::$variant {
            $($field: $value,)*
            src_path: file!(),
            src_line: line!(),
        }
    };
}

/// A specialized Result type for PlanTopo operations.
pub type Result<T> = std::result::Result<T, PlanTopoError>;

/// The main error type for PlanTopo.
#[derive(Error, Debug)]
pub enum PlanTopoError {
    // =========================================================================
    // I/O and File System Errors
    // =========================================================================
    /// I/O error with path context.
    #[error("I/O error at '{path}' ({src_path}:{src_line}): {source}")]
    Io {
        /// The path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// File not found.
    #[error("File not found: {path} ({src_path}:{src_line})")]
    FileNotFound {
        /// The missing file path
        path: PathBuf,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Input Errors
    // =========================================================================
    /// The plan document is not valid JSON or lacks required top-level fields.
    #[error("Invalid plan ({src_path}:{src_line}): {message}")]
    InvalidPlan {
        /// Description of what is wrong with the plan
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// A string could not be parsed as an external resource identity.
    #[error("Invalid external resource id '{id}' ({src_path}:{src_line}): {message}")]
    InvalidExternalId {
        /// The offending id
        id: String,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// The existing topology could not be loaded.
    #[error("Failed to load topology from '{path}' ({src_path}:{src_line}): {message}")]
    TopologyLoad {
        /// Where the topology was read from
        path: PathBuf,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration parsing error.
    #[error("Failed to parse configuration ({src_path}:{src_line}): {message}")]
    ConfigParse {
        /// Error message
        message: String,
        /// The underlying error (if any)
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}' ({src_path}:{src_line}): {message}")]
    ConfigValue {
        /// The configuration key
        key: String,
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Missing required configuration.
    #[error("Missing required configuration: {key} ({src_path}:{src_line})")]
    ConfigMissing {
        /// The missing configuration key
        key: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// The layout collaborator failed to place nodes.
    #[error("Layout failed ({src_path}:{src_line}): {message}")]
    Layout {
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Report Errors
    // =========================================================================
    /// Report generation error.
    #[error("Failed to generate report ({src_path}:{src_line}): {message}")]
    ReportGeneration {
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Internal error (should not happen in normal operation).
    #[error("Internal error ({src_path}:{src_line}): {message}")]
    Internal {
        /// Error message
        message: String,
        /// Source file path
        src_path: &'static str,
        /// Source line number
        src_line: u32,
    },

    /// Multiple errors occurred.
    #[error("Multiple errors occurred ({count} total)")]
    Multiple {
        /// Number of errors
        count: usize,
        /// The individual errors
        errors: Vec<PlanTopoError>,
    },
}

impl PlanTopoError {
    /// Creates an `Io` error.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error, src_path: &'static str, src_line: u32) -> Self {
        Self::Io { path: path.into(), source, src_path, src_line }
    }

    /// Creates an `InvalidPlan` error.
    #[must_use]
    pub fn invalid_plan(message: String, src_path: &'static str, src_line: u32) -> Self {
        Self::InvalidPlan { message, src_path, src_line }
    }

    /// Creates a `ConfigParse` error.
    #[must_use]
    pub fn config_parse(message: String, source: Option<Box<dyn std::error::Error + Send + Sync>>, src_path: &'static str, src_line: u32) -> Self {
        Self::ConfigParse { message, source, src_path, src_line }
    }

    /// Creates an `Internal` error.
    #[must_use]
    pub fn internal(message: String, src_path: &'static str, src_line: u32) -> Self {
        Self::Internal { message, src_path, src_line }
    }

    /// Determines if the error only affects one plan of a batch import.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidPlan { .. }
                | Self::FileNotFound { .. }
                | Self::Io { .. }
                | Self::Layout { .. }
                | Self::InvalidExternalId { .. }
        )
    }

    /// Returns the appropriate exit code for the error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied => 13,
            Self::FileNotFound { .. } => 14,
            Self::InvalidPlan { .. } => 15,
            Self::TopologyLoad { .. } => 16,
            Self::ConfigParse { .. } => 18,
            Self::ConfigValue { .. } => 19,
            Self::ConfigMissing { .. } => 20,
            Self::Multiple { .. } => 21,
            _ => 1,
        }
    }

    /// Consolidates multiple errors into a single `PlanTopoError::Multiple` if there's more than one.
    /// Otherwise, returns the single error or `Ok(())` if no errors.
    pub fn collect(errors: Vec<Self>) -> Result<()> {
        let mut errors = errors;
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            count => Err(Self::Multiple { count, errors }),
        }
    }
}

/// Extension trait for `Result` to add context to errors.
pub trait ResultExt<T, E> {
    /// Adds a file path context to an I/O error.
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Converts a general error into an `InvalidPlan` error with context.
    fn to_invalid_plan_error(self, message: &str) -> Result<T>;

    /// Converts a general error into a `ConfigParse` error with context.
    fn to_config_parse_error(self, message: String) -> Result<T>;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            let path = path.into();
            let boxed = e.into();
            match boxed.downcast::<std::io::Error>() {
                Ok(io) if io.kind() == std::io::ErrorKind::NotFound => PlanTopoError::FileNotFound {
                    path,
                    src_path: file!(),
                    src_line: line!(),
                },
                Ok(io) => PlanTopoError::io(path, *io, file!(), line!()),
                Err(other) => PlanTopoError::io(path, std::io::Error::other(other), file!(), line!()),
            }
        })
    }

    fn to_invalid_plan_error(self, message: &str) -> Result<T> {
        self.map_err(|e| PlanTopoError::invalid_plan(format!("{message}: {}", e.into()), file!(), line!()))
    }

    fn to_config_parse_error(self, message: String) -> Result<T> {
        self.map_err(|e| PlanTopoError::config_parse(message, Some(e.into()), file!(), line!()))
    }
}

impl From<std::io::Error> for PlanTopoError {
    fn from(source: std::io::Error) -> Self {
        // Prefer PlanTopoError::io(path, ..) wherever the path is known
        Self::Io {
            path: PathBuf::new(),
            source,
            src_path: file!(),
            src_line: line!(),
        }
    }
}

impl From<serde_json::Error> for PlanTopoError {
    fn from(source: serde_json::Error) -> Self {
        Self::Internal {
            message: format!("JSON serialization/deserialization error: {source}"),
            src_path: file!(),
            src_line: line!(),
        }
    }
}

/// A utility for collecting multiple errors during batch imports.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<PlanTopoError>,
}

impl ErrorCollector {
    /// Create a new error collector.
    #[must_use]
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Add an error to the collection.
    pub fn add(&mut self, error: PlanTopoError) {
        self.errors.push(error);
    }

    /// Get the number of collected errors.
    #[must_use]
    pub fn count(&self) -> usize {
        self.errors.len()
    }

    /// Check if there are any errors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert to a Result, returning Multiple error if there are any errors.
    pub fn into_result(self) -> Result<()> {
        PlanTopoError::collect(self.errors)
    }
}
