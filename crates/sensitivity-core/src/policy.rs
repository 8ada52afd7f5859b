//! Tier policies: which label to apply and which mutations follow it.
//!
//! A [`PolicyTable`] is built once from [`Config`] at process start and is
//! read-only afterwards. Step order inside a policy is the order in which
//! the saga executes them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{Config, PrincipalsConfig};
use crate::error::{Result, SensitivityError};
use crate::types::{StepTarget, Tier, Visibility};

pub const ROLE_FULL_CONTROL: &str = "Full Control";
pub const ROLE_READ: &str = "Read";

// ---------------------------------------------------------------------------
// StepOperation
// ---------------------------------------------------------------------------

/// The mutation a step performs. The variant decides which external system
/// the step targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepOperation {
    /// Change the group's directory visibility.
    SetVisibility { visibility: Visibility },
    /// Remove an account from the group owners.
    RemoveOwner { owner_id: String },
    /// Promote `administrator` to site administrator, drop it from the site
    /// owners group, then demote the workspace owner group claim.
    HandOverSiteAdministration { administrator: String },
    /// Grant `role` on the site to each principal. With
    /// `isolate_default_library`, hub permission sync is disabled and the
    /// default document library stops inheriting before the grants.
    GrantRole {
        principals: Vec<String>,
        role: String,
        #[serde(default)]
        isolate_default_library: bool,
    },
}

impl StepOperation {
    pub fn target(&self) -> StepTarget {
        match self {
            StepOperation::SetVisibility { .. } | StepOperation::RemoveOwner { .. } => {
                StepTarget::IdentitySystem
            }
            StepOperation::HandOverSiteAdministration { .. } | StepOperation::GrantRole { .. } => {
                StepTarget::SiteSystem
            }
        }
    }
}

// ---------------------------------------------------------------------------
// StepDefinition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepDefinition {
    pub name: String,
    pub operation: StepOperation,
}

impl StepDefinition {
    pub fn new(name: impl Into<String>, operation: StepOperation) -> Self {
        Self {
            name: name.into(),
            operation,
        }
    }

    pub fn target(&self) -> StepTarget {
        self.operation.target()
    }
}

// ---------------------------------------------------------------------------
// TierPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierPolicy {
    pub tier: Tier,
    pub label_id: String,
    pub security_category_tag: String,
    pub mandatory_steps: Vec<StepDefinition>,
}

// ---------------------------------------------------------------------------
// Built-in steps
// ---------------------------------------------------------------------------

/// Steps a tier runs when its configuration does not override them.
pub fn default_steps(tier: Tier, principals: &PrincipalsConfig) -> Vec<StepDefinition> {
    let remove_service_owner = StepDefinition::new(
        "remove-service-owner",
        StepOperation::RemoveOwner {
            owner_id: principals.service_owner_id.clone(),
        },
    );

    match tier {
        Tier::Unclassified => vec![
            // Site admin must be in place before the owner group loses it.
            StepDefinition::new(
                "hand-over-site-administration",
                StepOperation::HandOverSiteAdministration {
                    administrator: principals.site_admin_login.clone(),
                },
            ),
            StepDefinition::new(
                "grant-support-full-control",
                StepOperation::GrantRole {
                    principals: vec![principals.support_group_login.clone()],
                    role: ROLE_FULL_CONTROL.to_string(),
                    isolate_default_library: false,
                },
            ),
            StepDefinition::new(
                "grant-read-only",
                StepOperation::GrantRole {
                    principals: principals.read_only_groups.clone(),
                    role: ROLE_READ.to_string(),
                    isolate_default_library: true,
                },
            ),
            remove_service_owner,
        ],
        Tier::Restricted => vec![
            StepDefinition::new(
                "set-private-visibility",
                StepOperation::SetVisibility {
                    visibility: Visibility::Private,
                },
            ),
            remove_service_owner,
        ],
    }
}

// ---------------------------------------------------------------------------
// PolicyTable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    policies: BTreeMap<Tier, TierPolicy>,
}

impl PolicyTable {
    pub fn new(policies: impl IntoIterator<Item = TierPolicy>) -> Self {
        Self {
            policies: policies.into_iter().map(|p| (p.tier, p)).collect(),
        }
    }

    /// Register one policy per configured tier. Tiers absent from the
    /// configuration stay unregistered.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut policies = Vec::with_capacity(config.tiers.len());
        for (tier, tier_cfg) in &config.tiers {
            if tier_cfg.label_id.trim().is_empty() {
                return Err(SensitivityError::InvalidConfig(format!(
                    "tier '{tier}' has an empty label_id"
                )));
            }
            let mandatory_steps = tier_cfg
                .steps
                .clone()
                .unwrap_or_else(|| default_steps(*tier, &config.principals));
            let security_category_tag = tier_cfg
                .security_category
                .clone()
                .unwrap_or_else(|| tier.default_security_category().to_string());
            policies.push(TierPolicy {
                tier: *tier,
                label_id: tier_cfg.label_id.clone(),
                security_category_tag,
                mandatory_steps,
            });
        }
        Ok(Self::new(policies))
    }

    pub fn resolve(&self, tier: Tier) -> Result<&TierPolicy> {
        self.policies
            .get(&tier)
            .ok_or_else(|| SensitivityError::UnknownTier(tier.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TierPolicy> {
        self.policies.values()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
