//! Command Request Validation
//!
//! Re-validates the domain rules of a shell command request before anything
//! is spawned: the command must be non-empty, must have an extractable
//! command root, and an optional working directory must be a relative path
//! to an existing directory inside the project root.

use super::root::command_root;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Error types for request validation
///
/// The messages are shown verbatim to the calling agent and the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid parameters: {0}")]
    Schema(String),

    #[error("Command cannot be empty.")]
    EmptyCommand,

    #[error("Could not identify command root to obtain permission from user.")]
    MissingRoot,

    #[error("Directory cannot be absolute. Must be relative to the project root directory.")]
    AbsoluteDirectory(String),

    #[error("Directory must exist.")]
    DirectoryNotFound(String),

    #[error("Directory must be within the project root directory.")]
    DirectoryOutsideRoot(String),
}

/// Parameters of one shell command invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandRequest {
    /// Command line handed to the shell interpreter
    pub command: String,

    /// Short explanation of what the command does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Working directory relative to the project root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

impl CommandRequest {
    /// Create a request for `command` in the project root
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: None,
            directory: None,
        }
    }

    /// Set the working directory (relative to the project root)
    pub fn in_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Build a request from untyped JSON parameters
    ///
    /// Unknown fields and wrong types are reported as [`ValidationError::Schema`].
    pub fn from_json(params: serde_json::Value) -> Result<Self, ValidationError> {
        serde_json::from_value(params).map_err(|e| ValidationError::Schema(e.to_string()))
    }
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCommand {
    /// Command text as given
    pub command: String,

    /// Extracted command root
    pub root: String,

    /// Resolved working directory
    pub working_dir: PathBuf,
}

/// Validator bound to a fixed project root
#[derive(Debug, Clone)]
pub struct CommandValidator {
    project_root: PathBuf,
}

impl CommandValidator {
    /// Create a validator for `project_root`
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
        }
    }

    /// The project root all directories are resolved against
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Validate a request
    ///
    /// # Example
    ///
    /// ```
    /// use shellgate::tools::{CommandRequest, CommandValidator, ValidationError};
    ///
    /// let validator = CommandValidator::new(".");
    /// assert!(validator.validate(&CommandRequest::new("ls -la")).is_ok());
    /// assert_eq!(
    ///     validator.validate(&CommandRequest::new("   ")),
    ///     Err(ValidationError::EmptyCommand)
    /// );
    /// ```
    pub fn validate(&self, request: &CommandRequest) -> Result<ValidatedCommand, ValidationError> {
        if request.command.trim().is_empty() {
            return Err(ValidationError::EmptyCommand);
        }

        let root = command_root(&request.command).ok_or(ValidationError::MissingRoot)?;

        let working_dir = match request.directory.as_deref() {
            Some(directory) => self.resolve_directory(directory)?,
            None => self.project_root.clone(),
        };

        Ok(ValidatedCommand {
            command: request.command.clone(),
            root,
            working_dir,
        })
    }

    /// Resolve a relative directory against the project root
    fn resolve_directory(&self, directory: &str) -> Result<PathBuf, ValidationError> {
        let relative = Path::new(directory);
        if relative.is_absolute() || relative.has_root() {
            return Err(ValidationError::AbsoluteDirectory(directory.to_string()));
        }

        let resolved = self.project_root.join(relative);
        if !resolved.is_dir() {
            return Err(ValidationError::DirectoryNotFound(directory.to_string()));
        }

        // Both paths exist at this point, so canonicalization only fails on
        // races with concurrent deletion.
        let canonical_root = self
            .project_root
            .canonicalize()
            .map_err(|_| ValidationError::DirectoryNotFound(directory.to_string()))?;
        let canonical_dir = resolved
            .canonicalize()
            .map_err(|_| ValidationError::DirectoryNotFound(directory.to_string()))?;
        if !canonical_dir.starts_with(&canonical_root) {
            return Err(ValidationError::DirectoryOutsideRoot(directory.to_string()));
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn project() -> (TempDir, CommandValidator) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("file.txt"), "not a dir").unwrap();
        let validator = CommandValidator::new(dir.path());
        (dir, validator)
    }

    #[test]
    fn test_valid_command_in_root() {
        let (dir, validator) = project();

        let validated = validator.validate(&CommandRequest::new("ls -la")).unwrap();
        assert_eq!(validated.command, "ls -la");
        assert_eq!(validated.root, "ls");
        assert_eq!(validated.working_dir, dir.path());
    }

    #[test]
    fn test_valid_relative_directory() {
        let (dir, validator) = project();

        let request = CommandRequest::new("cargo build").in_directory("src/nested");
        let validated = validator.validate(&request).unwrap();
        assert_eq!(validated.working_dir, dir.path().join("src/nested"));
    }

    #[test]
    fn test_empty_command_rejected() {
        let (_dir, validator) = project();

        for command in ["", "   ", "\t\n"] {
            assert_eq!(
                validator.validate(&CommandRequest::new(command)),
                Err(ValidationError::EmptyCommand)
            );
        }
    }

    #[test]
    fn test_missing_root_rejected() {
        let (_dir, validator) = project();

        assert_eq!(
            validator.validate(&CommandRequest::new("; | &")),
            Err(ValidationError::MissingRoot)
        );
    }

    #[test]
    fn test_absolute_directory_rejected() {
        let (dir, validator) = project();
        let absolute = dir.path().join("src").display().to_string();

        let result = validator.validate(&CommandRequest::new("ls").in_directory(absolute));
        assert!(matches!(result, Err(ValidationError::AbsoluteDirectory(_))));
    }

    #[test]
    fn test_missing_directory_rejected() {
        let (_dir, validator) = project();

        let result = validator.validate(&CommandRequest::new("ls").in_directory("does/not/exist"));
        assert!(matches!(result, Err(ValidationError::DirectoryNotFound(_))));

        let result = validator.validate(&CommandRequest::new("ls").in_directory("file.txt"));
        assert!(matches!(result, Err(ValidationError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_directory_escaping_root_rejected() {
        let (_dir, validator) = project();

        let result = validator.validate(&CommandRequest::new("ls").in_directory(".."));
        assert!(matches!(result, Err(ValidationError::DirectoryOutsideRoot(_))));

        let result = validator.validate(&CommandRequest::new("ls").in_directory("src/../.."));
        assert!(matches!(result, Err(ValidationError::DirectoryOutsideRoot(_))));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ValidationError::EmptyCommand.to_string(), "Command cannot be empty.");
        assert_eq!(
            ValidationError::MissingRoot.to_string(),
            "Could not identify command root to obtain permission from user."
        );
        assert_eq!(
            ValidationError::AbsoluteDirectory("/tmp".into()).to_string(),
            "Directory cannot be absolute. Must be relative to the project root directory."
        );
        assert_eq!(
            ValidationError::DirectoryNotFound("x".into()).to_string(),
            "Directory must exist."
        );
    }

    #[test]
    fn test_from_json() {
        let request = CommandRequest::from_json(json!({
            "command": "git status",
            "description": "Show working tree status",
            "directory": "src"
        }))
        .unwrap();
        assert_eq!(request.command, "git status");
        assert_eq!(request.directory.as_deref(), Some("src"));

        let request = CommandRequest::from_json(json!({ "command": "ls" })).unwrap();
        assert_eq!(request, CommandRequest::new("ls"));
    }

    #[test]
    fn test_builders_match_json_parameters() {
        let built = CommandRequest::new("git status")
            .in_directory("src")
            .with_description("Show working tree status");
        let parsed = CommandRequest::from_json(json!({
            "command": "git status",
            "description": "Show working tree status",
            "directory": "src"
        }))
        .unwrap();

        assert_eq!(built, parsed);
        assert_eq!(built.description.as_deref(), Some("Show working tree status"));
    }

    #[test]
    fn test_from_json_schema_errors() {
        for params in [
            json!({}),
            json!({ "command": 42 }),
            json!({ "command": "ls", "timeout": 5 }),
            json!("ls"),
        ] {
            let result = CommandRequest::from_json(params);
            assert!(matches!(result, Err(ValidationError::Schema(_))));
        }
    }
}
