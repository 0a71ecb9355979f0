use std::fmt;

/// Where on a site a contact address was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    Header,
    Footer,
    ContactPage,
    AboutPage,
    TeamPage,
    Body,
}

impl SourceType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Footer => "footer",
            Self::ContactPage => "contact-page",
            Self::AboutPage => "about-page",
            Self::TeamPage => "team-page",
            Self::Body => "body",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "header" => Some(Self::Header),
            "footer" => Some(Self::Footer),
            "contact-page" => Some(Self::ContactPage),
            "about-page" => Some(Self::AboutPage),
            "team-page" => Some(Self::TeamPage),
            "body" => Some(Self::Body),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Result of the validation engine for one contact
///
/// The failure reason of an `Invalid` contact is stored alongside the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationStatus {
    Unvalidated,
    Valid,
    Invalid,
}

impl ValidationStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Unvalidated => "unvalidated",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "unvalidated" => Some(Self::Unvalidated),
            "valid" => Some(Self::Valid),
            "invalid" => Some(Self::Invalid),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_type_roundtrip() {
        for source in [
            SourceType::Header,
            SourceType::Footer,
            SourceType::ContactPage,
            SourceType::AboutPage,
            SourceType::TeamPage,
            SourceType::Body,
        ] {
            assert_eq!(SourceType::from_db_string(source.to_db_string()), Some(source));
        }
    }

    #[test]
    fn test_validation_status_invalid_string() {
        assert_eq!(ValidationStatus::from_db_string("maybe"), None);
        assert_eq!(
            ValidationStatus::from_db_string("valid"),
            Some(ValidationStatus::Valid)
        );
    }
}
