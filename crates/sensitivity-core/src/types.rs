use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Requested security classification of a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Unclassified,
    /// Protected B. Historically delivered on the `prob` queue.
    #[serde(alias = "prob", alias = "protected_b")]
    Restricted,
}

impl Tier {
    pub fn all() -> &'static [Tier] {
        &[Tier::Unclassified, Tier::Restricted]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Unclassified => "unclassified",
            Tier::Restricted => "restricted",
        }
    }

    /// Tag carried in the `SecurityCategory` field of success emails unless
    /// the tier configuration overrides it.
    pub fn default_security_category(self) -> &'static str {
        match self {
            Tier::Unclassified => "unclassified",
            Tier::Restricted => "protected_b",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = crate::error::SensitivityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "unclassified" => Ok(Tier::Unclassified),
            "restricted" | "prob" | "protected_b" => Ok(Tier::Restricted),
            _ => Err(crate::error::SensitivityError::UnknownTier(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Public,
}

impl Visibility {
    /// Value expected by the group directory API.
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Private => "Private",
            Visibility::Public => "Public",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StepTarget
// ---------------------------------------------------------------------------

/// External system a step mutates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTarget {
    IdentitySystem,
    SiteSystem,
}

impl StepTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            StepTarget::IdentitySystem => "identity",
            StepTarget::SiteSystem => "site",
        }
    }
}

impl fmt::Display for StepTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Logical outbound notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Status,
    List,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Status => "status",
            Channel::List => "list",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parses_legacy_queue_names() {
        assert_eq!("prob".parse::<Tier>().unwrap(), Tier::Restricted);
        assert_eq!("Protected B".parse::<Tier>().unwrap(), Tier::Restricted);
        assert_eq!("Unclassified".parse::<Tier>().unwrap(), Tier::Unclassified);
    }

    #[test]
    fn tier_rejects_unknown() {
        let err = "secret".parse::<Tier>().unwrap_err();
        assert!(err.to_string().contains("unknown tier"));
    }

    #[test]
    fn tier_display_matches_as_str() {
        for tier in Tier::all() {
            assert_eq!(tier.to_string(), tier.as_str());
            assert_eq!(tier.as_str().parse::<Tier>().unwrap(), *tier);
        }
    }

    #[test]
    fn tier_yaml_accepts_alias() {
        let tier: Tier = serde_yaml::from_str("prob").unwrap();
        assert_eq!(tier, Tier::Restricted);
    }

    #[test]
    fn visibility_uses_directory_casing() {
        assert_eq!(Visibility::Private.as_str(), "Private");
    }
}
