use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Playlist(#[from] playlist::PlaylistError),

    #[error("Prompt failed: {0}")]
    Prompt(#[from] inquire::InquireError),

    #[error("Invalid selection {index}: choose between 1 and {count}")]
    InvalidSelection { index: usize, count: usize },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl AppError {
    /// Errors caused by what the user typed; reported without a failure exit.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidSelection { .. }
                | AppError::Prompt(
                    inquire::InquireError::OperationCanceled
                        | inquire::InquireError::OperationInterrupted
                )
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
