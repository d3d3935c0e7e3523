/// Failure taxonomy for the relay.
///
/// The `Display` text is exactly what clients see in the outward `error`
/// frame. Soft errors leave the connection open; hard errors mean the
/// connection cannot safely continue (its identity is released and the
/// socket is closed after the error is reported).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    // Identity
    #[error("Invalid username")]
    InvalidIdentity,
    #[error("Username already taken")]
    DuplicateIdentity,
    #[error("Username already set")]
    AlreadyIdentified,

    // Validation
    #[error("Invalid message format")]
    MalformedFrame,
    #[error("Unknown event")]
    UnknownEvent,
    #[error("Message text is required")]
    MissingText,
    #[error("Message too long")]
    OversizedText,
    #[error("Recipient is required")]
    MissingRecipient,

    // Routing
    #[error("Set a username before sending messages")]
    SenderUnidentified,
    #[error("Recipient not found")]
    RecipientNotFound,

    // Anything unexpected inside a handler
    #[error("An error occurred")]
    Internal,
}

/// What happens to the connection after the error is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Report to the sender, keep the connection open.
    Soft,
    /// Report to the sender, release its identity, close the connection.
    Hard,
}

impl RelayError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::InvalidIdentity | Self::DuplicateIdentity => Severity::Hard,
            _ => Severity::Soft,
        }
    }

    pub fn is_hard(&self) -> bool {
        self.severity() == Severity::Hard
    }

    /// Short classification string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidIdentity => "invalid_identity",
            Self::DuplicateIdentity => "duplicate_identity",
            Self::AlreadyIdentified => "already_identified",
            Self::MalformedFrame => "malformed_frame",
            Self::UnknownEvent => "unknown_event",
            Self::MissingText => "missing_text",
            Self::OversizedText => "oversized_text",
            Self::MissingRecipient => "missing_recipient",
            Self::SenderUnidentified => "sender_unidentified",
            Self::RecipientNotFound => "recipient_not_found",
            Self::Internal => "internal",
        }
    }
}
