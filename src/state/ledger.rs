use std::fmt;

/// What a suppression entry matches against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuppressionKind {
    /// A single address, matched exactly (case-insensitive)
    Email,
    /// A domain, matched exactly or as a parent of the candidate
    Domain,
}

impl SuppressionKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Domain => "domain",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Self::Email),
            "domain" => Some(Self::Domain),
            _ => None,
        }
    }

    /// Infers the kind from a raw value: anything with an `@` is an email
    pub fn infer(value: &str) -> Self {
        if value.contains('@') {
            Self::Email
        } else {
            Self::Domain
        }
    }
}

impl fmt::Display for SuppressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// How a suppression entry came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuppressionSource {
    Manual,
    AutoBounce,
    AutoComplaint,
    Import,
}

impl SuppressionSource {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::AutoBounce => "auto-bounce",
            Self::AutoComplaint => "auto-complaint",
            Self::Import => "import",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "auto-bounce" => Some(Self::AutoBounce),
            "auto-complaint" => Some(Self::AutoComplaint),
            "import" => Some(Self::Import),
            _ => None,
        }
    }
}

impl fmt::Display for SuppressionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Outcome of one dispatch attempt in the send ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendOutcome {
    Sent,
    Failed,
}

impl SendOutcome {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
