use std::path::PathBuf;

/// Result type alias for convoy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for convoy operations
///
/// Every variant represents a construction or misuse failure raised before
/// (or outside of) task execution. A task that runs and fails is reported
/// through its status, never through this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Graph or workspace configuration errors (cycles, unknown
    /// workspaces, malformed manifests)
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Task expression syntax errors, with the byte offset of the
    /// offending token
    #[error("parse error at offset {position}: {message}")]
    Parse { position: usize, message: String },

    /// A requested top-level script does not exist in its workspace
    #[error("workspace '{workspace}' has no script named '{script}'")]
    ScriptNotFound { workspace: String, script: String },

    /// Lifecycle misuse (mutating a started task set, adding children to a
    /// started group)
    #[error("invalid task state for '{task}': {message}")]
    TaskState { task: String, message: String },

    /// Command execution errors raised while *launching* a process (the
    /// process failing once launched is a task status, not an error)
    #[error("{}", format_command_error(.command, .args, .message))]
    CommandExecution {
        command: String,
        args: Vec<String>,
        message: String,
    },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },
}

fn format_command_error(command: &str, args: &[String], message: &str) -> String {
    if args.is_empty() {
        format!("command '{command}' failed: {message}")
    } else {
        format!("command '{command} {}' failed: {message}", args.join(" "))
    }
}

// Conversion implementations
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a parse error anchored at a byte offset
    #[must_use]
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create a missing-script error for a top-level request
    #[must_use]
    pub fn script_not_found(workspace: impl Into<String>, script: impl Into<String>) -> Self {
        Error::ScriptNotFound {
            workspace: workspace.into(),
            script: script.into(),
        }
    }

    /// Create a lifecycle misuse error
    #[must_use]
    pub fn task_state(task: impl Into<String>, message: impl Into<String>) -> Self {
        Error::TaskState {
            task: task.into(),
            message: message.into(),
        }
    }

    /// Create a command execution error
    #[must_use]
    pub fn command_execution(
        command: impl Into<String>,
        args: Vec<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::CommandExecution {
            command: command.into(),
            args,
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }
}

// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a lazy message
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            Error::Configuration {
                message: format!("{}: {}", message.into(), base_error),
            }
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let base_error = e.into();
            Error::Configuration {
                message: format!("{}: {}", f(), base_error),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_carries_position() {
        let err = Error::parse(7, "unexpected token ')'");
        assert_eq!(err.to_string(), "parse error at offset 7: unexpected token ')'");
    }

    #[test]
    fn test_command_error_formats_args() {
        let err = Error::command_execution("tsc", vec!["--build".to_string()], "not found");
        assert_eq!(err.to_string(), "command 'tsc --build' failed: not found");

        let err = Error::command_execution("tsc", vec![], "not found");
        assert_eq!(err.to_string(), "command 'tsc' failed: not found");
    }
}
