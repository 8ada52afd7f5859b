//! Step executor: runs one tier step and contains its failure.
//!
//! Whatever an external system returns, [`StepExecutor::execute`] yields a
//! [`StepResult`]; errors never escape to the saga.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::clients::{IdentityClient, SiteClient};
use crate::error::ClientResult;
use crate::policy::{StepDefinition, StepOperation};
use crate::types::StepTarget;

// ---------------------------------------------------------------------------
// StepContext
// ---------------------------------------------------------------------------

/// Workspace coordinates a step runs against.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub request_id: &'a str,
    pub group_id: &'a str,
    pub site_url: &'a str,
}

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub target: StepTarget,
    pub succeeded: bool,
    /// Present iff `succeeded` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl StepResult {
    pub fn success(name: impl Into<String>, target: StepTarget) -> Self {
        Self {
            name: name.into(),
            target,
            succeeded: true,
            error_detail: None,
        }
    }

    pub fn failure(name: impl Into<String>, target: StepTarget, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target,
            succeeded: false,
            error_detail: Some(detail.into()),
        }
    }
}

/// Login of the claim that represents the workspace group's owners on its site.
pub fn owner_group_claim(group_id: &str) -> String {
    format!("c:0o.c|federateddirectoryclaimprovider|{group_id}_o")
}

// ---------------------------------------------------------------------------
// StepExecutor
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct StepExecutor {
    identity: Arc<dyn IdentityClient>,
    site: Arc<dyn SiteClient>,
}

impl StepExecutor {
    pub fn new(identity: Arc<dyn IdentityClient>, site: Arc<dyn SiteClient>) -> Self {
        Self { identity, site }
    }

    pub async fn execute(&self, step: &StepDefinition, ctx: &StepContext<'_>) -> StepResult {
        let target = step.target();
        info!(
            request_id = ctx.request_id,
            group_id = ctx.group_id,
            step = %step.name,
            step_target = %target,
            "step started"
        );

        match self.apply(&step.operation, ctx).await {
            Ok(()) => {
                info!(request_id = ctx.request_id, step = %step.name, "step succeeded");
                StepResult::success(&step.name, target)
            }
            Err(e) => {
                let causes = e.causes();
                error!(
                    request_id = ctx.request_id,
                    group_id = ctx.group_id,
                    step = %step.name,
                    step_target = %target,
                    error = %e,
                    causes = ?causes,
                    "step failed"
                );
                StepResult::failure(&step.name, target, e.to_string())
            }
        }
    }

    /// A step made of several calls stops at its first failing call.
    async fn apply(&self, operation: &StepOperation, ctx: &StepContext<'_>) -> ClientResult<()> {
        match operation {
            StepOperation::SetVisibility { visibility } => {
                self.identity.set_visibility(ctx.group_id, *visibility).await
            }
            StepOperation::RemoveOwner { owner_id } => {
                self.identity.remove_owner(ctx.group_id, owner_id).await
            }
            StepOperation::HandOverSiteAdministration { administrator } => {
                self.site
                    .add_site_administrator(ctx.site_url, administrator)
                    .await?;
                self.site
                    .remove_owner_group_member(ctx.site_url, administrator)
                    .await?;
                self.site
                    .remove_site_administrator(ctx.site_url, &owner_group_claim(ctx.group_id))
                    .await
            }
            StepOperation::GrantRole {
                principals,
                role,
                isolate_default_library,
            } => {
                if *isolate_default_library {
                    self.site.disable_hub_permission_sync(ctx.site_url).await?;
                    self.site.break_permission_inheritance(ctx.site_url).await?;
                }
                for principal in principals {
                    self.site.grant_role(ctx.site_url, principal, role).await?;
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
