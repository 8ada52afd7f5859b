//! HTTP adapters for the classification saga.
//!
//! ```text
//! RopcTokenProvider ──► GraphIdentityClient   (IdentityClient)
//!                   └─► SharePointSiteClient  (SiteClient)
//! StorageAccount    ──► StorageQueueSink      (QueueSink)
//! ```
//!
//! [`Adapters::from_config`] wires all three from the loaded configuration
//! and the environment secrets.

pub mod error;
pub mod graph;
pub mod queue;
pub mod sharepoint;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use sensitivity_core::clients::{IdentityClient, QueueSink, SiteClient};
use sensitivity_core::config::Config;

pub use error::{GraphClientError, Result};
pub use graph::GraphIdentityClient;
pub use queue::{StorageAccount, StorageQueueSink};
pub use sharepoint::SharePointSiteClient;
pub use token::{RopcTokenProvider, Secrets, StaticTokenProvider, TokenProvider};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The three production collaborators, ready to hand to the orchestrator.
#[derive(Clone)]
pub struct Adapters {
    pub identity: Arc<dyn IdentityClient>,
    pub site: Arc<dyn SiteClient>,
    pub queue: Arc<dyn QueueSink>,
}

impl Adapters {
    pub fn from_config(config: &Config, secrets: &Secrets) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let tokens: Arc<dyn TokenProvider> = Arc::new(RopcTokenProvider::new(
            http.clone(),
            &config.graph.login_base_url,
            &config.tenant.id,
            config.auth.client_id.clone(),
            config.auth.user_name.clone(),
            secrets,
        ));
        let account = StorageAccount::from_connection_string(&secrets.storage_connection_string)?;

        Ok(Self {
            identity: Arc::new(GraphIdentityClient::new(
                http.clone(),
                &config.graph.base_url,
                tokens.clone(),
            )),
            site: Arc::new(SharePointSiteClient::new(
                http.clone(),
                sharepoint::sharepoint_scope(&config.tenant.name),
                tokens,
            )),
            queue: Arc::new(StorageQueueSink::new(http, account)),
        })
    }
}
