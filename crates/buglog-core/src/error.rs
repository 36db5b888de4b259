use std::fmt;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    EntityNotFound,
    IdentityNotFound,
    AmbiguousId,
    InvalidId,
    InvalidOperation,
    InvalidIdentity,
    InvalidStateTransition,
    CorruptedEntity,
    IdentityNotSet,
    EntityWriteFailed,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::EntityNotFound => "E2001",
            Self::IdentityNotFound => "E2002",
            Self::AmbiguousId => "E2003",
            Self::InvalidId => "E2004",
            Self::InvalidOperation => "E2005",
            Self::InvalidIdentity => "E2006",
            Self::InvalidStateTransition => "E2007",
            Self::CorruptedEntity => "E3001",
            Self::IdentityNotSet => "E4001",
            Self::EntityWriteFailed => "E5001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Repository not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::EntityNotFound => "Bug not found",
            Self::IdentityNotFound => "Identity not found",
            Self::AmbiguousId => "Ambiguous id prefix",
            Self::InvalidId => "Malformed id",
            Self::InvalidOperation => "Operation failed validation",
            Self::InvalidIdentity => "Identity failed validation",
            Self::InvalidStateTransition => "Invalid state transition",
            Self::CorruptedEntity => "Corrupted operation log",
            Self::IdentityNotSet => "No current user identity",
            Self::EntityWriteFailed => "Operation log write failed",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `bl init` to initialize this repository."),
            Self::ConfigParseError => Some("Fix syntax in .buglog/config.toml and retry."),
            Self::EntityNotFound | Self::IdentityNotFound => None,
            Self::AmbiguousId => Some("Use a longer id prefix to disambiguate."),
            Self::InvalidId => Some("Ids are 64 lowercase hex characters (prefixes allowed)."),
            Self::InvalidOperation => Some("Fix the named field and retry; nothing was appended."),
            Self::InvalidIdentity => Some("Provide a single-line name and a valid avatar URL."),
            Self::InvalidStateTransition => Some("The bug already has the requested status."),
            Self::CorruptedEntity => {
                Some("The log was altered after the fact. Pull a clean copy from a peer.")
            }
            Self::IdentityNotSet => Some("Run `bl user create` to create your identity."),
            Self::EntityWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other `bl` process releases its lock."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
