use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("App '{0}' has not been purchased by the signed-in account")]
    AppNotPurchased(String),

    #[error("No user is signed in to the App Store")]
    UserNotSignedIn,

    #[error("Both a username and a password are required to sign in")]
    CredentialsIncomplete,

    #[error("Invalid element pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Accessibility error: {0}")]
    Accessibility(#[from] anyhow::Error),
}

impl AppError {
    /// Process exit status for the command-line front end
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Timeout(_) => 2,
            AppError::AppNotPurchased(_) => 3,
            AppError::UserNotSignedIn => 4,
            AppError::CredentialsIncomplete => 5,
            AppError::Pattern(_) | AppError::Accessibility(_) => 1,
        }
    }
}

/// Exit status for any front-end failure; errors from outside the
/// workflows (serialization, I/O) are plain failures
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<AppError>().map_or(1, AppError::exit_code)
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_for_wrapped_errors() {
        let typed = anyhow::Error::new(AppError::UserNotSignedIn);
        assert_eq!(exit_code_for(&typed), 4);

        let serialization = serde_json::from_str::<serde_json::Value>("{")
            .map_err(anyhow::Error::new)
            .unwrap_err()
            .context("Failed to serialize status");
        assert_eq!(exit_code_for(&serialization), 1);
        assert!(format!("{:#}", serialization).starts_with("Failed to serialize status: "));
    }

    #[test]
    fn test_messages_name_the_subject() {
        assert_eq!(
            AppError::Timeout("'Xcode' installation".to_string()).to_string(),
            "Timed out waiting for 'Xcode' installation"
        );
        assert!(AppError::AppNotPurchased("Xcode".to_string())
            .to_string()
            .contains("'Xcode'"));
    }

    #[test]
    fn test_exit_codes_are_distinct_for_typed_failures() {
        let codes = [
            AppError::Timeout(String::new()).exit_code(),
            AppError::AppNotPurchased(String::new()).exit_code(),
            AppError::UserNotSignedIn.exit_code(),
            AppError::CredentialsIncomplete.exit_code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
