//! Tagged error value shared by every core service.
//!
//! Each error carries a machine-readable [`Kind`], an operation trail that
//! grows as the error is wrapped on its way up, an optional user-facing
//! message, and optional user/client ids for audit logs. The outermost layer
//! maps kinds to transport status codes; the core never maps or swallows.

use std::fmt;
use uuid::Uuid;

/// Stable machine-readable error kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    /// Transparent wrap; classification comes from the wrapped error.
    Other,
    /// Malformed input, hash mismatch, signature failure.
    Invalid,
    /// Bad client credentials or an inactive principal.
    Permission,
    /// Missing row.
    NotExist,
    /// Unique-constraint violation.
    Exist,
    /// Unexpected I/O or decode failure.
    Internal,
    /// The passcode exists but its expiry has passed.
    OtpCodeExpired,
    /// The presented handle does not bind to this identifier and code.
    OtpHashNotMatched,
    /// Missing entity at the service level (user, session).
    NotFound,
}

impl Kind {
    /// Stable name exposed to callers and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Other => "other",
            Self::Invalid => "invalid",
            Self::Permission => "permission",
            Self::NotExist => "not_exist",
            Self::Exist => "exist",
            Self::Internal => "internal",
            Self::OtpCodeExpired => "otp_code_expired",
            Self::OtpHashNotMatched => "otp_hash_not_matched",
            Self::NotFound => "not_found",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error value with kind, operation trail and audit context.
#[derive(Debug)]
pub struct Error {
    kind: Kind,
    op: Option<&'static str>,
    message: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
    user_id: Option<Uuid>,
    client_id: Option<Uuid>,
}

/// Core result alias.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    #[must_use]
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            op: None,
            message: None,
            source: None,
            user_id: None,
            client_id: None,
        }
    }

    /// Transparent wrap: the kind of the wrapped error wins.
    #[must_use]
    pub fn wrap(op: &'static str, source: Error) -> Self {
        Self::new(Kind::Other).with_op(op).with_source(source)
    }

    #[must_use]
    pub fn with_op(mut self, op: &'static str) -> Self {
        self.op = Some(op);
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn with_client(mut self, client_id: Uuid) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Effective kind: the innermost non-[`Kind::Other`] kind in the chain.
    #[must_use]
    pub fn kind(&self) -> Kind {
        let mut effective = self.kind;
        let mut source = self.source.as_deref();
        while let Some(err) = source.and_then(|err| err.downcast_ref::<Self>()) {
            if err.kind != Kind::Other {
                effective = err.kind;
            }
            source = err.source.as_deref();
        }
        effective
    }

    /// Reports whether the error chain matches `kind`.
    #[must_use]
    pub fn is(kind: Kind, err: &Self) -> bool {
        err.kind() == kind
    }

    /// Operation trail, outermost first.
    #[must_use]
    pub fn ops(&self) -> Vec<&'static str> {
        let mut trail = Vec::new();
        let mut current = Some(self);
        while let Some(err) = current {
            if let Some(op) = err.op {
                trail.push(op);
            }
            current = err
                .source
                .as_deref()
                .and_then(|source| source.downcast_ref::<Self>());
        }
        trail
    }

    /// User-facing message, if one was attached anywhere in the chain.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        let mut current = Some(self);
        while let Some(err) = current {
            if let Some(message) = err.message.as_deref() {
                return Some(message);
            }
            current = err
                .source
                .as_deref()
                .and_then(|source| source.downcast_ref::<Self>());
        }
        None
    }

    #[must_use]
    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    #[must_use]
    pub fn client_id(&self) -> Option<Uuid> {
        self.client_id
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trail = self.ops();
        for op in &trail {
            write!(f, "{op}: ")?;
        }
        write!(f, "{}", self.kind())?;
        if let Some(message) = self.message() {
            write!(f, ": {message}")?;
        } else if let Some(source) = &self.source {
            if source.downcast_ref::<Self>().is_none() {
                write!(f, ": {source}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}
