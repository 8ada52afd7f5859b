//! Interfaces of the external systems the saga mutates.
//!
//! Every call returns a [`ClientResult`]; adapters never panic or leak their
//! own error types across this boundary. Implementations are shared between
//! concurrent workflow runs and must not keep per-request state.

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::types::{Channel, Visibility};

/// Group directory: labels, visibility and ownership of the workspace group.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn assign_label(&self, group_id: &str, label_id: &str) -> ClientResult<()>;

    async fn set_visibility(&self, group_id: &str, visibility: Visibility) -> ClientResult<()>;

    async fn remove_owner(&self, group_id: &str, owner_id: &str) -> ClientResult<()>;
}

/// Site permission API for the site that belongs to the workspace.
///
/// `site_url` identifies the site; implementations bind credentials per call.
#[async_trait]
pub trait SiteClient: Send + Sync {
    async fn add_site_administrator(&self, site_url: &str, login_name: &str) -> ClientResult<()>;

    async fn remove_site_administrator(&self, site_url: &str, login_name: &str)
        -> ClientResult<()>;

    /// Remove a principal from the site's associated owners group.
    async fn remove_owner_group_member(&self, site_url: &str, login_name: &str)
        -> ClientResult<()>;

    async fn grant_role(&self, site_url: &str, principal: &str, role_name: &str)
        -> ClientResult<()>;

    /// Break inheritance on the site's default document library, copying the
    /// current assignments and clearing sub-scopes.
    async fn break_permission_inheritance(&self, site_url: &str) -> ClientResult<()>;

    /// Stop a hub site from pushing its visitor permissions onto this site.
    async fn disable_hub_permission_sync(&self, site_url: &str) -> ClientResult<()>;
}

/// Outbound queue transport. `body` is the serialized record.
#[async_trait]
pub trait QueueSink: Send + Sync {
    async fn send(&self, queue_name: &str, channel: Channel, body: String) -> ClientResult<()>;
}
