use crate::error::{Result, SensitivityError};
use crate::policy::{StepDefinition, StepOperation};
use crate::types::Tier;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "sensitivity.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// TenantConfig / AuthConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Short tenant name, e.g. `contoso` for `contoso.sharepoint.com`.
    pub name: String,
    /// Directory (tenant) id used for token requests.
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub client_id: String,
    /// Service account used for the password grant.
    #[serde(default)]
    pub user_name: String,
}

// ---------------------------------------------------------------------------
// GraphConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_base_url")]
    pub base_url: String,
    #[serde(default = "default_login_base_url")]
    pub login_base_url: String,
}

fn default_graph_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_login_base_url() -> String {
    "https://login.microsoftonline.com".to_string()
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_graph_base_url(),
            login_base_url: default_login_base_url(),
        }
    }
}

// ---------------------------------------------------------------------------
// SiteConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Sites are provisioned at `url_prefix + request id`.
    pub url_prefix: String,
}

impl SiteConfig {
    pub fn site_url(&self, request_id: &str) -> String {
        format!("{}{}", self.url_prefix, request_id)
    }
}

// ---------------------------------------------------------------------------
// QueueConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_email_queue")]
    pub email: String,
    #[serde(default = "default_status_queue")]
    pub status: String,
    #[serde(default = "default_list_queue")]
    pub list: String,
}

fn default_email_queue() -> String {
    "email".to_string()
}

fn default_status_queue() -> String {
    "status".to_string()
}

fn default_list_queue() -> String {
    "list".to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            email: default_email_queue(),
            status: default_status_queue(),
            list: default_list_queue(),
        }
    }
}

// ---------------------------------------------------------------------------
// PrincipalsConfig
// ---------------------------------------------------------------------------

/// Accounts and groups referenced by the built-in tier steps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrincipalsConfig {
    /// Provisioning service account removed from group owners.
    #[serde(default)]
    pub service_owner_id: String,
    /// Login of the group promoted to site collection administrator.
    #[serde(default)]
    pub site_admin_login: String,
    /// Login of the support group granted Full Control.
    #[serde(default)]
    pub support_group_login: String,
    /// Groups granted Read. Accepts a YAML list or a comma-separated string.
    #[serde(default, deserialize_with = "list_or_csv")]
    pub read_only_groups: Vec<String>,
}

fn list_or_csv<'de, D>(d: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrCsv {
        List(Vec<String>),
        Csv(String),
    }

    let items = match ListOrCsv::deserialize(d)? {
        ListOrCsv::List(v) => v,
        ListOrCsv::Csv(s) => s.split(',').map(str::to_string).collect(),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

// ---------------------------------------------------------------------------
// TierConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// Sensitivity label applied to the group.
    pub label_id: String,
    /// Overrides the tier's default `SecurityCategory` tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_category: Option<String>,
    /// Replaces the built-in step list for this tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<StepDefinition>>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub tenant: TenantConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    pub site: SiteConfig,
    #[serde(default)]
    pub queues: QueueConfig,
    #[serde(default)]
    pub principals: PrincipalsConfig,
    #[serde(default)]
    pub tiers: BTreeMap<Tier, TierConfig>,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SensitivityError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&data)
    }

    pub fn from_yaml_str(data: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(data)?;
        Ok(cfg)
    }

    pub fn tier(&self, tier: Tier) -> Option<&TierConfig> {
        self.tiers.get(&tier)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        if self.tenant.name.trim().is_empty() || self.tenant.id.trim().is_empty() {
            push(WarnLevel::Error, "tenant.name and tenant.id are required".into());
        }

        if !self.site.url_prefix.starts_with("https://") {
            push(
                WarnLevel::Warning,
                format!("site.url_prefix '{}' is not an https URL", self.site.url_prefix),
            );
        }

        for (key, name) in [
            ("email", &self.queues.email),
            ("status", &self.queues.status),
            ("list", &self.queues.list),
        ] {
            if !is_valid_queue_name(name) {
                push(
                    WarnLevel::Error,
                    format!("queues.{key} '{name}' is not a valid queue name"),
                );
            }
        }

        if self.tiers.is_empty() {
            push(
                WarnLevel::Error,
                "no tiers configured; every request will be rejected".into(),
            );
        }

        for (tier, tier_cfg) in &self.tiers {
            if tier_cfg.label_id.trim().is_empty() {
                push(WarnLevel::Error, format!("tier '{tier}' has an empty label_id"));
            }

            let steps = match &tier_cfg.steps {
                Some(steps) => steps.clone(),
                None => crate::policy::default_steps(*tier, &self.principals),
            };
            if steps.is_empty() {
                push(WarnLevel::Warning, format!("tier '{tier}' has no mandatory steps"));
            }

            let mut seen = HashSet::new();
            for step in &steps {
                if !seen.insert(step.name.as_str()) {
                    push(
                        WarnLevel::Warning,
                        format!("tier '{tier}' declares step '{}' more than once", step.name),
                    );
                }
                self.check_step(*tier, step, &mut push);
            }
        }

        warnings
    }

    fn check_step(&self, tier: Tier, step: &StepDefinition, push: &mut impl FnMut(WarnLevel, String)) {
        match &step.operation {
            StepOperation::RemoveOwner { owner_id } if owner_id.trim().is_empty() => push(
                WarnLevel::Error,
                format!("step '{}' on tier '{tier}' has no owner id", step.name),
            ),
            StepOperation::HandOverSiteAdministration { administrator }
                if administrator.trim().is_empty() =>
            {
                push(
                    WarnLevel::Error,
                    format!("step '{}' on tier '{tier}' has no administrator", step.name),
                )
            }
            StepOperation::GrantRole { principals, .. } if principals.is_empty() => push(
                WarnLevel::Warning,
                format!(
                    "step '{}' on tier '{tier}' grants its role to no principals",
                    step.name
                ),
            ),
            _ => {}
        }
    }
}

/// Storage queue naming rules: 3-63 chars, lowercase alphanumerics and
/// single hyphens, starting and ending with an alphanumeric.
fn is_valid_queue_name(name: &str) -> bool {
    let len_ok = (3..=63).contains(&name.len());
    let chars_ok = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let edges_ok = !name.starts_with('-') && !name.ends_with('-');
    len_ok && chars_ok && edges_ok && !name.contains("--")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
