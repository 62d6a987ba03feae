//! Error taxonomy shared by every orchestration stage.
//!
//! Configuration and discovery errors abort a verb immediately. Compile
//! errors are collected per script and reported before the batch fails
//! with [`Error::CompileFailed`]. Filesystem faults surface as
//! [`Error::Persistence`] while sandbox violations are always
//! [`Error::PathEscape`], since those point at a broken configuration
//! rather than at the environment.

use std::io;
use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Main ksc error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No `ksc.toml` was found where one was required
    #[error("no configuration found in '{}'", .searched.display())]
    ConfigurationMissing { searched: PathBuf },

    /// The configuration parsed but is semantically invalid
    #[error("configuration is invalid:\n  - {}", .messages.join("\n  - "))]
    ConfigurationInvalid { messages: Vec<String> },

    /// The configuration file could not be parsed
    #[error("cannot parse '{}': {source}", .path.display())]
    ConfigurationParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The configuration could not be serialized
    #[error("cannot serialize configuration: {0}")]
    ConfigurationWrite(#[from] toml::ser::Error),

    /// A logical path resolved outside its volume root
    #[error("path '{path}' refers outside of volume '{volume}'")]
    PathEscape { volume: String, path: String },

    /// Any filesystem fault while touching a volume
    #[error("cannot access '{path}': {source}")]
    Persistence {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Create on a path that already exists
    #[error("already exists: {path}")]
    AlreadyExists { path: String },

    /// The parent directory of a new file could not be created
    #[error("parent directory for '{path}' cannot be created: {source}")]
    ParentMissing {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Save over an existing directory
    #[error("cannot save file over a directory: {path}")]
    DirectoryConflict { path: String },

    /// Create or delete aimed at the volume root itself
    #[error("cannot {operation} the root directory of volume '{volume}'")]
    RootPath {
        volume: String,
        operation: &'static str,
    },

    /// An explicit output was given without an explicit input
    #[error("an output was specified without an input")]
    NoInputSpecified,

    /// Discovery found nothing to compile
    #[error("no scripts found")]
    NoScripts,

    /// At least one script failed to compile
    #[error("compilation failed with {count} error(s)")]
    CompileFailed { count: usize },

    /// `ksc run <name>` with no such composite script
    #[error("script '{0}' not found")]
    ScriptNotFound(String),

    /// An external process could not be started
    #[error("cannot run '{program}': {source}")]
    ExternalProcess {
        program: String,
        #[source]
        source: io::Error,
    },

    /// A composite script step exited with a non-zero code
    #[error("step '{step}' exited with code {code}")]
    StepFailed { step: String, code: i32 },

    /// The engine adapter failed outside of compilation
    #[error("engine error: {0}")]
    Engine(String),

    /// A filesystem watch could not be set up
    #[error("cannot watch for changes: {0}")]
    Watch(#[from] notify::Error),
}

impl Error {
    /// Wrap an I/O error with the logical path it happened on.
    pub fn persistence(path: impl ToString, source: io::Error) -> Self {
        Self::Persistence {
            path: path.to_string(),
            source,
        }
    }

    /// Remediation hint shown after the error message.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ConfigurationMissing { .. } => Some(
                "run 'ksc init' to create a ksc.toml, or point at a file or directory \
                 containing *.ks files via -i",
            ),
            Self::ConfigurationInvalid { .. } | Self::ConfigurationParse { .. } => {
                Some("fix the listed problems in ksc.toml")
            }
            Self::PathEscape { .. } => Some("check the volume paths in ksc.toml"),
            Self::NoInputSpecified => Some("pass an input with -i when using -o"),
            Self::NoScripts => Some("check your path and the volume selected with -v"),
            Self::ScriptNotFound(_) => Some("check the [scripts] table in ksc.toml"),
            Self::ExternalProcess { .. } => Some("check that the program is installed and on PATH"),
            Self::Engine(_) => Some("set KSC_ENGINE to the path of the ksc-engine binary"),
            Self::Persistence { .. } => Some("check your path"),
            _ => None,
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StepFailed { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }

    /// Log the error and its hint.
    pub fn report(&self) {
        tracing::error!("{}", self);
        if let Some(hint) = self.hint() {
            tracing::info!("help: {}", hint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failed_propagates_code() {
        let err = Error::StepFailed {
            step: "ksc compile".to_string(),
            code: 3,
        };
        assert_eq!(err.exit_code(), 3);
        assert_eq!(Error::NoInputSpecified.exit_code(), 1);
    }

    #[test]
    fn test_invalid_lists_every_message() {
        let err = Error::ConfigurationInvalid {
            messages: vec!["first".to_string(), "second".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("  - first"));
        assert!(text.contains("  - second"));
    }

    #[test]
    fn test_missing_config_hints_init() {
        let err = Error::ConfigurationMissing {
            searched: PathBuf::from("."),
        };
        assert!(err.hint().unwrap().contains("ksc init"));
        assert!(Error::CompileFailed { count: 2 }.hint().is_none());
    }
}
