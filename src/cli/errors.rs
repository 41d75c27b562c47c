use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] cellseg::Error),
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::MissingArgument { .. } => 2,
            AppError::Io(_) => 11,
            AppError::Core(e) => e.exit_code(),
        }
    }
}
