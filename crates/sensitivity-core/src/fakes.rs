//! In-memory collaborators for tests.
//!
//! Identity and site fakes append to a shared [`CallLog`] so tests can assert
//! the cross-system order of mutations. Any method can be told to fail with
//! a given message.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::clients::{IdentityClient, QueueSink, SiteClient};
use crate::error::{ClientError, ClientResult};
use crate::types::{Channel, Visibility};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub method: &'static str,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn methods(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|c| c.method).collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|c| c.method == method).count()
    }

    fn push(&self, method: &'static str, args: &[&str]) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(Call {
                method,
                args: args.iter().map(|a| a.to_string()).collect(),
            });
        }
    }
}

/// Failure rules keyed by method name.
#[derive(Debug, Default)]
struct Failures(Mutex<HashMap<&'static str, String>>);

impl Failures {
    fn set(&self, method: &'static str, message: &str) {
        if let Ok(mut rules) = self.0.lock() {
            rules.insert(method, message.to_string());
        }
    }

    fn check(&self, method: &str) -> ClientResult<()> {
        let rules = self
            .0
            .lock()
            .map_err(|_| ClientError::Other("failure rules poisoned".into()))?;
        match rules.get(method) {
            Some(message) => Err(ClientError::Other(message.clone())),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeIdentityClient
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakeIdentityClient {
    log: CallLog,
    failures: Failures,
}

impl FakeIdentityClient {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failures: Failures::default(),
        }
    }

    pub fn fail(&self, method: &'static str, message: &str) {
        self.failures.set(method, message);
    }

    fn record(&self, method: &'static str, args: &[&str]) -> ClientResult<()> {
        self.log.push(method, args);
        self.failures.check(method)
    }
}

#[async_trait]
impl IdentityClient for FakeIdentityClient {
    async fn assign_label(&self, group_id: &str, label_id: &str) -> ClientResult<()> {
        self.record("assign_label", &[group_id, label_id])
    }

    async fn set_visibility(&self, group_id: &str, visibility: Visibility) -> ClientResult<()> {
        self.record("set_visibility", &[group_id, visibility.as_str()])
    }

    async fn remove_owner(&self, group_id: &str, owner_id: &str) -> ClientResult<()> {
        self.record("remove_owner", &[group_id, owner_id])
    }
}

// ---------------------------------------------------------------------------
// FakeSiteClient
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FakeSiteClient {
    log: CallLog,
    failures: Failures,
}

impl FakeSiteClient {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            failures: Failures::default(),
        }
    }

    pub fn fail(&self, method: &'static str, message: &str) {
        self.failures.set(method, message);
    }

    fn record(&self, method: &'static str, args: &[&str]) -> ClientResult<()> {
        self.log.push(method, args);
        self.failures.check(method)
    }
}

#[async_trait]
impl SiteClient for FakeSiteClient {
    async fn add_site_administrator(&self, site_url: &str, login_name: &str) -> ClientResult<()> {
        self.record("add_site_administrator", &[site_url, login_name])
    }

    async fn remove_site_administrator(
        &self,
        site_url: &str,
        login_name: &str,
    ) -> ClientResult<()> {
        self.record("remove_site_administrator", &[site_url, login_name])
    }

    async fn remove_owner_group_member(
        &self,
        site_url: &str,
        login_name: &str,
    ) -> ClientResult<()> {
        self.record("remove_owner_group_member", &[site_url, login_name])
    }

    async fn grant_role(&self, site_url: &str, principal: &str, role_name: &str) -> ClientResult<()> {
        self.record("grant_role", &[site_url, principal, role_name])
    }

    async fn break_permission_inheritance(&self, site_url: &str) -> ClientResult<()> {
        self.record("break_permission_inheritance", &[site_url])
    }

    async fn disable_hub_permission_sync(&self, site_url: &str) -> ClientResult<()> {
        self.record("disable_hub_permission_sync", &[site_url])
    }
}

// ---------------------------------------------------------------------------
// FakeQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub queue_name: String,
    pub channel: Channel,
    pub body: serde_json::Value,
}

#[derive(Debug, Default)]
pub struct FakeQueue {
    sent: Mutex<Vec<SentMessage>>,
    failing: Mutex<HashSet<Channel>>,
}

impl FakeQueue {
    pub fn fail(&self, channel: Channel) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(channel);
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn on(&self, channel: Channel) -> Vec<serde_json::Value> {
        self.sent()
            .into_iter()
            .filter(|m| m.channel == channel)
            .map(|m| m.body)
            .collect()
    }
}

#[async_trait]
impl QueueSink for FakeQueue {
    async fn send(&self, queue_name: &str, channel: Channel, body: String) -> ClientResult<()> {
        let failing = self
            .failing
            .lock()
            .map(|f| f.contains(&channel))
            .unwrap_or(false);
        if failing {
            return Err(ClientError::Other(format!("queue '{queue_name}' unavailable")));
        }
        let body = serde_json::from_str(&body)
            .map_err(|e| ClientError::Other(format!("non-JSON body: {e}")))?;
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentMessage {
                queue_name: queue_name.to_string(),
                channel,
                body,
            });
        }
        Ok(())
    }
}
