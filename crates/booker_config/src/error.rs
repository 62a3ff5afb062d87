use validator::{ValidationErrors, ValidationErrorsKind};

/// Errors raised while loading configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that was read
        path: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The YAML did not match the expected shape
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Values were present but invalid
    #[error("Invalid config: {0}")]
    Validation(String),
}

impl From<ValidationErrors> for ConfigError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages = Vec::new();
        collect_messages("", &errors, &mut messages);
        messages.sort();
        ConfigError::Validation(messages.join("; "))
    }
}

fn collect_messages(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let field: &str = field;
        let path = match (prefix.is_empty(), field) {
            (true, field) => field.to_string(),
            (false, "__all__") => prefix.to_string(),
            (false, field) => format!("{}.{}", prefix, field),
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let reason = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string());
                    out.push(format!("{}: {}", path, reason));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_messages(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_messages(&format!("{}[{}]", path, index), nested, out);
                }
            }
        }
    }
}
