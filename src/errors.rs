use thiserror::Error;

/// All errors that can occur in Valve.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Section / entry errors ---
    #[error("Section '{0}' already exists")]
    DuplicateName(String),

    #[error("Entry '{entry}' already exists in section '{section}'")]
    DuplicateEntry { section: String, entry: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("Section '{0}' is locked — authenticate first")]
    NotAuthenticated(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    // --- Crypto errors ---
    /// Wrong password, unknown credentials, or tampered ciphertext.
    /// Deliberately carries no detail.
    #[error("Authentication failed")]
    Authentication,

    #[error("Password mismatch — passwords do not match")]
    PasswordMismatch,

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    // --- File errors ---
    #[error("Invalid vault file: {0}")]
    Parse(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),
}

impl VaultError {
    pub(crate) fn section_not_found(name: &str) -> Self {
        Self::NotFound {
            kind: "Section",
            name: name.to_string(),
        }
    }

    pub(crate) fn entry_not_found(name: &str) -> Self {
        Self::NotFound {
            kind: "Entry",
            name: name.to_string(),
        }
    }

    /// Process exit code for a CLI wrapper (sysexits-style for file problems).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Parse(_) => 65,
            Self::Persistence(_) => 74,
            Self::Configuration(_) => 78,
            _ => 1,
        }
    }
}

/// Convenience type alias for Valve results.
pub type Result<T> = std::result::Result<T, VaultError>;
