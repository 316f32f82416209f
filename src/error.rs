//! Error types for the design compiler

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model invariant violated in component '{component}': {message}")]
    ModelInvariant { component: String, message: String },

    #[error("Unsupported {kind} in {context}")]
    UnsupportedKind { kind: String, context: String },

    #[error("Code generation error: {message}")]
    CodeGen { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },
}

pub type Result<T> = std::result::Result<T, CompilerError>;

impl CompilerError {
    pub fn model(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelInvariant {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn unsupported(kind: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnsupportedKind {
            kind: kind.into(),
            context: context.into(),
        }
    }

    pub fn codegen(message: impl Into<String>) -> Self {
        Self::CodeGen {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Whether the failure comes from the input model rather than the environment.
    pub fn is_model_defect(&self) -> bool {
        matches!(
            self,
            Self::ModelInvariant { .. } | Self::UnsupportedKind { .. } | Self::InvalidFormat { .. }
        )
    }
}

impl From<serde_json::Error> for CompilerError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidFormat {
            message: format!("Invalid design model JSON: {}", err),
        }
    }
}
