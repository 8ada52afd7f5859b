//! Notification dispatcher.
//!
//! Records are flat JSON objects whose keys match what the downstream email
//! and list-tracking consumers read. Dispatch is best-effort: a queue failure
//! is logged and swallowed.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clients::QueueSink;
use crate::config::QueueConfig;
use crate::request::ClassificationRequest;
use crate::saga::WorkflowOutcome;
use crate::types::Channel;

pub const STATUS_TEAM_CREATED: &str = "Team Created";
pub const STATUS_COMPLETE: &str = "Complete";
pub const STATUS_FAILED: &str = "Failed";
const FUNCTION_APP: &str = "Sensitivity";
const LABEL_METHOD: &str = "ApplyLabel";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuccessEmail<'a> {
    #[serde(rename = "Id")]
    pub id: &'a str,
    #[serde(rename = "groupId")]
    pub group_id: &'a str,
    #[serde(rename = "SpaceName")]
    pub space_name: Option<&'a str>,
    #[serde(rename = "SpaceNameFR")]
    pub space_name_fr: Option<&'a str>,
    #[serde(rename = "RequesterName")]
    pub requester_name: Option<&'a str>,
    #[serde(rename = "RequesterEmail")]
    pub requester_email: Option<&'a str>,
    #[serde(rename = "Status")]
    pub status: &'a str,
    #[serde(rename = "Comment")]
    pub comment: &'a str,
    #[serde(rename = "SecurityCategory")]
    pub security_category: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureEmail<'a> {
    #[serde(rename = "Id")]
    pub id: &'a str,
    #[serde(rename = "groupId")]
    pub group_id: &'a str,
    #[serde(rename = "SpaceName")]
    pub space_name: Option<&'a str>,
    #[serde(rename = "SpaceNameFR")]
    pub space_name_fr: Option<&'a str>,
    #[serde(rename = "Status")]
    pub status: &'a str,
    #[serde(rename = "FunctionApp")]
    pub function_app: &'a str,
    #[serde(rename = "Method")]
    pub method: &'a str,
    #[serde(rename = "ErrorMessage")]
    pub error_message: &'a str,
}

/// Tracking-list item update, used on both the `status` and `list` channels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemStatus<'a> {
    #[serde(rename = "Id")]
    pub id: &'a str,
    #[serde(rename = "Status")]
    pub status: &'a str,
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn QueueSink>,
    queues: QueueConfig,
}

impl Notifier {
    pub fn new(sink: Arc<dyn QueueSink>, queues: QueueConfig) -> Self {
        Self { sink, queues }
    }

    /// Announce a fully provisioned workspace: item status on `status`,
    /// then the "Team Created" email. Does nothing for an unsuccessful run.
    pub async fn notify_success(&self, outcome: &WorkflowOutcome, request: &ClassificationRequest) {
        if !outcome.overall_success {
            warn!(
                request_id = %request.request_id,
                run_id = %outcome.run_id,
                "run did not succeed; no success notification"
            );
            return;
        }

        match request.item_id.as_deref() {
            Some(item_id) => {
                let record = ItemStatus {
                    id: item_id,
                    status: STATUS_COMPLETE,
                };
                self.dispatch(Channel::Status, &record, &request.request_id)
                    .await;
            }
            None => warn!(
                request_id = %request.request_id,
                "request has no itemId; skipping status record"
            ),
        }

        if request.requester_email.is_none() {
            warn!(
                request_id = %request.request_id,
                "request has no requester email; the notification will have no recipient"
            );
        }

        let record = SuccessEmail {
            id: &request.request_id,
            group_id: &request.group_id,
            space_name: request.display_name_en.as_deref(),
            space_name_fr: request.display_name_fr.as_deref(),
            requester_name: request.requester_name.as_deref(),
            requester_email: request.requester_email.as_deref(),
            status: STATUS_TEAM_CREATED,
            comment: "",
            security_category: &outcome.security_category_tag,
        };
        self.dispatch(Channel::Email, &record, &request.request_id)
            .await;
    }

    /// Report a failed label assignment on `email` and, when the request is
    /// tied to a tracking item, on `list`.
    pub async fn notify_label_failure(&self, request: &ClassificationRequest, error_detail: &str) {
        let record = FailureEmail {
            id: &request.request_id,
            group_id: &request.group_id,
            space_name: request.display_name_en.as_deref(),
            space_name_fr: request.display_name_fr.as_deref(),
            status: STATUS_FAILED,
            function_app: FUNCTION_APP,
            method: LABEL_METHOD,
            error_message: error_detail,
        };
        self.dispatch(Channel::Email, &record, &request.request_id)
            .await;

        if let Some(item_id) = request.item_id.as_deref() {
            let record = ItemStatus {
                id: item_id,
                status: STATUS_FAILED,
            };
            self.dispatch(Channel::List, &record, &request.request_id)
                .await;
        }
    }

    fn queue_name(&self, channel: Channel) -> &str {
        match channel {
            Channel::Email => &self.queues.email,
            Channel::Status => &self.queues.status,
            Channel::List => &self.queues.list,
        }
    }

    async fn dispatch<T: Serialize>(&self, channel: Channel, record: &T, request_id: &str) {
        let queue = self.queue_name(channel);
        let body = match serde_json::to_string(record) {
            Ok(body) => body,
            Err(e) => {
                error!(request_id, %channel, error = %e, "failed to serialize notification");
                return;
            }
        };

        match self.sink.send(queue, channel, body).await {
            Ok(()) => info!(request_id, %channel, queue, "notification queued"),
            Err(e) => error!(
                request_id,
                %channel,
                queue,
                error = %e,
                causes = ?e.causes(),
                "failed to queue notification"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
