//! ENA Archive Sorter Library
//!
//! A Rust library for filtering ENA instrument telemetry archives into
//! SQLite tables or size-bounded numeric tensor files (Parquet).
//!
//! This library provides tools for:
//! - Qualifying archive directories by their quaternion companion files
//! - Detecting "double observation" histogram pairings in a directory subtree
//! - Parsing Hi/Lo good-times instruction tables into time-windowed rules
//! - Filtering telemetry records by time window, quality code and event code
//! - Sinking filtered records into a relational table or batched Parquet frames
//! - Cooperative cancellation and multi-level progress reporting

pub mod config;
pub mod constants;
pub mod pipeline;

// Core application modules
pub mod app {
    pub mod models;
    pub mod progress;
    pub mod services {
        pub mod archive_walker;
        pub mod batch_accumulator;
        pub mod condition_sets;
        pub mod instruction_table;
        pub mod record_filter;
        pub mod table_sink;
        pub mod tensor_sink;
        pub mod timing_log;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use app::models::{DoubleObservation, InstructionVariant, Record};
pub use config::SelectionConfig;

/// Result type alias for the ENA sorter
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for archive sorting operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Instruction file is missing; the run aborts before any traversal
    #[error("Instruction file not found: {path}")]
    InstructionNotFound { path: String },

    /// Instruction file row does not match the declared variant layout
    #[error("Instruction format error in '{path}' line {line}: {message}")]
    InstructionFormat {
        path: String,
        line: usize,
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Database sink error
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Tensor sink error
    #[error("Tensor write error: {message}")]
    TensorWrite {
        message: String,
        #[source]
        source: polars::error::PolarsError,
    },

    /// Directory traversal error
    #[error("Directory traversal error: {message}")]
    DirectoryTraversal {
        message: String,
        #[source]
        source: walkdir::Error,
    },

    /// Processing interrupted by the cancellation signal
    #[error("Processing interrupted: {reason}")]
    Interrupted { reason: String },
}

impl Error {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create an instruction-not-found error
    pub fn instruction_not_found(path: impl Into<String>) -> Self {
        Self::InstructionNotFound { path: path.into() }
    }

    /// Create an instruction format error with file and line context
    pub fn instruction_format(
        path: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::InstructionFormat {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a database error with context
    pub fn database(message: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Database {
            message: message.into(),
            source,
        }
    }

    /// Create a tensor write error with context
    pub fn tensor_write(message: impl Into<String>, source: polars::error::PolarsError) -> Self {
        Self::TensorWrite {
            message: message.into(),
            source,
        }
    }

    /// Create a directory traversal error with context
    pub fn directory_traversal(message: impl Into<String>, source: walkdir::Error) -> Self {
        Self::DirectoryTraversal {
            message: message.into(),
            source,
        }
    }

    /// Create a processing interrupted error
    pub fn interrupted(reason: impl Into<String>) -> Self {
        Self::Interrupted {
            reason: reason.into(),
        }
    }
}

// Automatic conversions from common error types
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<walkdir::Error> for Error {
    fn from(error: walkdir::Error) -> Self {
        Self::DirectoryTraversal {
            message: "Directory traversal failed".to_string(),
            source: error,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        Self::Database {
            message: "Database operation failed".to_string(),
            source: error,
        }
    }
}

impl From<polars::error::PolarsError> for Error {
    fn from(error: polars::error::PolarsError) -> Self {
        Self::TensorWrite {
            message: "Tensor frame operation failed".to_string(),
            source: error,
        }
    }
}
