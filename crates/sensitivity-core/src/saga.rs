//! Classification saga.
//!
//! ```text
//! Started → Labeling ─┬→ LabelFailed                       (terminal)
//!                     └→ StepsRunning → Aggregating ─┬→ Notifying → Done
//!                                                    └→ Done
//! ```
//!
//! Labeling is the only fatal step: if the label cannot be applied nothing
//! else is mutated and a failure record is queued. Tier steps always run to
//! the end of the policy; any failed step only suppresses the success
//! notification. Applied mutations are never rolled back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::clients::{IdentityClient, SiteClient};
use crate::config::SiteConfig;
use crate::error::{Result, SensitivityError};
use crate::notify::Notifier;
use crate::policy::{PolicyTable, TierPolicy};
use crate::request::ClassificationRequest;
use crate::step::{StepContext, StepExecutor, StepResult};
use crate::types::Tier;

// ---------------------------------------------------------------------------
// SagaState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaState {
    Started,
    Labeling,
    LabelFailed,
    StepsRunning,
    Aggregating,
    Notifying,
    Done,
}

impl SagaState {
    pub fn as_str(self) -> &'static str {
        match self {
            SagaState::Started => "started",
            SagaState::Labeling => "labeling",
            SagaState::LabelFailed => "label_failed",
            SagaState::StepsRunning => "steps_running",
            SagaState::Aggregating => "aggregating",
            SagaState::Notifying => "notifying",
            SagaState::Done => "done",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SagaState::LabelFailed | SagaState::Done)
    }

    pub fn can_transition_to(self, next: SagaState) -> bool {
        use SagaState::*;
        matches!(
            (self, next),
            (Started, Labeling)
                | (Labeling, LabelFailed)
                | (Labeling, StepsRunning)
                | (StepsRunning, Aggregating)
                | (Aggregating, Notifying)
                | (Aggregating, Done)
                | (Notifying, Done)
        )
    }
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// WorkflowOutcome
// ---------------------------------------------------------------------------

/// Everything one saga run produced. Owned by the run, handed to the
/// notifier and then to the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    pub run_id: Uuid,
    pub request_id: String,
    pub group_id: String,
    pub tier: Tier,
    pub security_category_tag: String,
    pub state: SagaState,
    pub label_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_error: Option<String>,
    pub step_results: Vec<StepResult>,
    pub overall_success: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowOutcome {
    pub fn start(request: &ClassificationRequest, policy: &TierPolicy) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            request_id: request.request_id.clone(),
            group_id: request.group_id.clone(),
            tier: request.tier,
            security_category_tag: policy.security_category_tag.clone(),
            state: SagaState::Started,
            label_applied: false,
            label_error: None,
            step_results: Vec::with_capacity(policy.mandatory_steps.len()),
            overall_success: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move to `next`. Re-entering the current terminal state is a no-op.
    pub fn advance(&mut self, next: SagaState) -> Result<()> {
        if self.state == next && next.is_terminal() {
            return Ok(());
        }
        if !self.state.can_transition_to(next) {
            return Err(SensitivityError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.step_results.iter().filter(|r| !r.succeeded)
    }
}

/// `label_applied` AND every step succeeded. Order of `results` is irrelevant.
pub fn aggregate(label_applied: bool, results: &[StepResult]) -> bool {
    label_applied && results.iter().all(|r| r.succeeded)
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs one saga per request. Holds only shared, read-only collaborators, so
/// a single instance serves concurrent requests.
#[derive(Clone)]
pub struct Orchestrator {
    policies: Arc<PolicyTable>,
    identity: Arc<dyn IdentityClient>,
    executor: StepExecutor,
    notifier: Notifier,
    site: SiteConfig,
}

impl Orchestrator {
    pub fn new(
        policies: Arc<PolicyTable>,
        identity: Arc<dyn IdentityClient>,
        site_client: Arc<dyn SiteClient>,
        notifier: Notifier,
        site: SiteConfig,
    ) -> Self {
        let executor = StepExecutor::new(identity.clone(), site_client);
        Self {
            policies,
            identity,
            executor,
            notifier,
            site,
        }
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    /// Run the saga for `request` to a terminal state.
    ///
    /// Only an unregistered tier is returned as `Err`; every failure of an
    /// external system is reported through the outcome and the queues.
    pub async fn run(&self, request: &ClassificationRequest) -> Result<WorkflowOutcome> {
        let policy = self.policies.resolve(request.tier)?;
        let outcome = WorkflowOutcome::start(request, policy);
        let span = info_span!(
            "saga",
            run_id = %outcome.run_id,
            request_id = %request.request_id,
            group_id = %request.group_id,
            tier = %request.tier,
        );
        self.drive(request, policy, outcome).instrument(span).await
    }

    async fn drive(
        &self,
        request: &ClassificationRequest,
        policy: &TierPolicy,
        mut outcome: WorkflowOutcome,
    ) -> Result<WorkflowOutcome> {
        info!("classification request received");

        outcome.advance(SagaState::Labeling)?;
        if let Err(e) = self
            .identity
            .assign_label(&request.group_id, &policy.label_id)
            .await
        {
            let detail = e.to_string();
            error!(
                label_id = %policy.label_id,
                error = %e,
                causes = ?e.causes(),
                "label assignment failed; aborting"
            );
            outcome.label_error = Some(detail.clone());
            outcome.advance(SagaState::LabelFailed)?;
            self.notifier.notify_label_failure(request, &detail).await;
            return Ok(outcome);
        }
        outcome.label_applied = true;
        info!(label_id = %policy.label_id, "label applied");

        outcome.advance(SagaState::StepsRunning)?;
        let site_url = self.site.site_url(&request.request_id);
        let ctx = StepContext {
            request_id: &request.request_id,
            group_id: &request.group_id,
            site_url: &site_url,
        };
        for step in &policy.mandatory_steps {
            let result = self.executor.execute(step, &ctx).await;
            outcome.step_results.push(result);
        }

        outcome.advance(SagaState::Aggregating)?;
        outcome.overall_success = aggregate(outcome.label_applied, &outcome.step_results);

        if outcome.overall_success {
            outcome.advance(SagaState::Notifying)?;
            self.notifier.notify_success(&outcome, request).await;
        } else {
            let failed: Vec<&str> = outcome.failed_steps().map(|r| r.name.as_str()).collect();
            warn!(?failed, "tier steps failed; success notification suppressed");
        }

        outcome.advance(SagaState::Done)?;
        info!(overall_success = outcome.overall_success, "classification finished");
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::fakes::{CallLog, FakeIdentityClient, FakeQueue, FakeSiteClient};
    use crate::policy::{StepDefinition, StepOperation};
    use crate::types::{Channel, StepTarget, Visibility};
    use serde_json::json;

    const PREFIX: &str = "https://contoso.sharepoint.com/teams/";

    struct Harness {
        log: CallLog,
        identity: Arc<FakeIdentityClient>,
        site: Arc<FakeSiteClient>,
        queue: Arc<FakeQueue>,
        orchestrator: Orchestrator,
    }

    fn unclassified_policy() -> TierPolicy {
        let principals = crate::config::PrincipalsConfig {
            service_owner_id: "svc-owner".into(),
            site_admin_login: "sca".into(),
            support_group_login: "support".into(),
            read_only_groups: vec!["all-users".into()],
        };
        TierPolicy {
            tier: Tier::Unclassified,
            label_id: "label-u".into(),
            security_category_tag: "unclassified".into(),
            mandatory_steps: crate::policy::default_steps(Tier::Unclassified, &principals),
        }
    }

    /// One step per distinct client method so each can be failed alone.
    fn four_step_policy(n: usize) -> TierPolicy {
        let steps = vec![
            StepDefinition::new(
                "visibility",
                StepOperation::SetVisibility {
                    visibility: Visibility::Private,
                },
            ),
            StepDefinition::new(
                "owner",
                StepOperation::RemoveOwner {
                    owner_id: "svc".into(),
                },
            ),
            StepDefinition::new(
                "admins",
                StepOperation::HandOverSiteAdministration {
                    administrator: "sca".into(),
                },
            ),
            StepDefinition::new(
                "grant",
                StepOperation::GrantRole {
                    principals: vec!["support".into()],
                    role: "Full Control".into(),
                    isolate_default_library: false,
                },
            ),
        ];
        TierPolicy {
            tier: Tier::Restricted,
            label_id: "label-b".into(),
            security_category_tag: "protected_b".into(),
            mandatory_steps: steps.into_iter().take(n).collect(),
        }
    }

    const STEP_METHODS: [&str; 4] = [
        "set_visibility",
        "remove_owner",
        "add_site_administrator",
        "grant_role",
    ];

    fn harness(policy: TierPolicy) -> Harness {
        let log = CallLog::default();
        let identity = Arc::new(FakeIdentityClient::new(log.clone()));
        let site = Arc::new(FakeSiteClient::new(log.clone()));
        let queue = Arc::new(FakeQueue::default());
        let orchestrator = Orchestrator::new(
            Arc::new(PolicyTable::new([policy])),
            identity.clone(),
            site.clone(),
            Notifier::new(queue.clone(), QueueConfig::default()),
            SiteConfig {
                url_prefix: PREFIX.into(),
            },
        );
        Harness {
            log,
            identity,
            site,
            queue,
            orchestrator,
        }
    }

    fn request(tier: Tier) -> ClassificationRequest {
        ClassificationRequest {
            request_id: "R1".into(),
            group_id: "G1".into(),
            item_id: Some("I1".into()),
            display_name_en: Some("Team A".into()),
            display_name_fr: None,
            requester_name: None,
            requester_email: Some("a@b.com".into()),
            tier,
        }
    }

    #[tokio::test]
    async fn unclassified_success_scenario() {
        let h = harness(unclassified_policy());
        let outcome = h.orchestrator.run(&request(Tier::Unclassified)).await.unwrap();

        assert!(outcome.label_applied);
        assert!(outcome.overall_success);
        assert_eq!(outcome.state, SagaState::Done);
        assert!(outcome.finished_at.is_some());
        assert_eq!(outcome.step_results.len(), 4);

        assert_eq!(
            h.queue.on(Channel::Status),
            vec![json!({"Id": "I1", "Status": "Complete"})]
        );
        let emails = h.queue.on(Channel::Email);
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0]["Id"], "R1");
        assert_eq!(emails[0]["groupId"], "G1");
        assert_eq!(emails[0]["SpaceName"], "Team A");
        assert_eq!(emails[0]["Status"], "Team Created");
        assert_eq!(emails[0]["SecurityCategory"], "unclassified");
        assert!(h.queue.on(Channel::List).is_empty());
    }

    #[tokio::test]
    async fn label_is_applied_before_any_step() {
        let h = harness(unclassified_policy());
        h.orchestrator.run(&request(Tier::Unclassified)).await.unwrap();
        let calls = h.log.calls();
        assert_eq!(calls[0].method, "assign_label");
        assert_eq!(calls[0].args, vec!["G1".to_string(), "label-u".to_string()]);
        assert_eq!(calls[1].args[0], format!("{PREFIX}R1"));
    }

    #[tokio::test]
    async fn label_failure_scenario() {
        let h = harness(unclassified_policy());
        h.identity.fail("assign_label", "403 Forbidden");
        let outcome = h.orchestrator.run(&request(Tier::Unclassified)).await.unwrap();

        assert_eq!(outcome.state, SagaState::LabelFailed);
        assert!(!outcome.label_applied);
        assert!(!outcome.overall_success);
        assert!(outcome.step_results.is_empty());
        assert_eq!(outcome.label_error.as_deref(), Some("403 Forbidden"));

        assert_eq!(h.log.methods(), vec!["assign_label"]);
        let emails = h.queue.on(Channel::Email);
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0]["Id"], "R1");
        assert_eq!(emails[0]["groupId"], "G1");
        assert_eq!(emails[0]["Status"], "Failed");
        assert_eq!(emails[0]["ErrorMessage"], "403 Forbidden");
        assert_eq!(
            h.queue.on(Channel::List),
            vec![json!({"Id": "I1", "Status": "Failed"})]
        );
        assert!(h.queue.on(Channel::Status).is_empty());
    }

    #[tokio::test]
    async fn label_failure_without_item_skips_list() {
        let h = harness(unclassified_policy());
        h.identity.fail("assign_label", "boom");
        let mut req = request(Tier::Unclassified);
        req.item_id = None;
        h.orchestrator.run(&req).await.unwrap();
        assert_eq!(h.queue.on(Channel::Email).len(), 1);
        assert!(h.queue.on(Channel::List).is_empty());
    }

    #[tokio::test]
    async fn failed_step_does_not_stop_later_steps() {
        let h = harness(unclassified_policy());
        h.site.fail("add_site_administrator", "500 Internal Server Error");
        let outcome = h.orchestrator.run(&request(Tier::Unclassified)).await.unwrap();

        let names: Vec<_> = outcome.step_results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "hand-over-site-administration",
                "grant-support-full-control",
                "grant-read-only",
                "remove-service-owner",
            ]
        );
        assert!(!outcome.step_results[0].succeeded);
        assert!(outcome.step_results[1..].iter().all(|r| r.succeeded));
        assert_eq!(h.log.count("grant_role"), 2);
        assert_eq!(h.log.count("remove_owner"), 1);

        assert!(!outcome.overall_success);
        assert_eq!(outcome.state, SagaState::Done);
        assert!(h.queue.sent().is_empty(), "no record for step failures");
    }

    #[tokio::test]
    async fn last_step_failure_suppresses_notification() {
        let h = harness(unclassified_policy());
        h.identity.fail("remove_owner", "404 Not Found");
        let outcome = h.orchestrator.run(&request(Tier::Unclassified)).await.unwrap();
        let last = outcome.step_results.last().unwrap();
        assert_eq!(last.target, StepTarget::IdentitySystem);
        assert_eq!(last.error_detail.as_deref(), Some("404 Not Found"));
        assert!(h.queue.sent().is_empty());
    }

    #[tokio::test]
    async fn overall_success_truth_table() {
        for n in 2..=4 {
            for mask in 0u32..(1 << n) {
                let h = harness(four_step_policy(n));
                for (i, method) in STEP_METHODS.iter().take(n).enumerate() {
                    if mask & (1 << i) != 0 {
                        if i < 2 {
                            h.identity.fail(method, "fail");
                        } else {
                            h.site.fail(method, "fail");
                        }
                    }
                }
                let outcome = h.orchestrator.run(&request(Tier::Restricted)).await.unwrap();

                assert_eq!(outcome.step_results.len(), n, "n={n} mask={mask:b}");
                for (i, r) in outcome.step_results.iter().enumerate() {
                    assert_eq!(r.succeeded, mask & (1 << i) == 0, "n={n} mask={mask:b}");
                }
                assert_eq!(outcome.overall_success, mask == 0, "n={n} mask={mask:b}");
                assert_eq!(h.queue.on(Channel::Email).len(), usize::from(mask == 0));
            }
        }
    }

    #[tokio::test]
    async fn unknown_tier_is_an_error_without_side_effects() {
        let h = harness(four_step_policy(2));
        let err = h
            .orchestrator
            .run(&request(Tier::Unclassified))
            .await
            .unwrap_err();
        assert!(matches!(err, SensitivityError::UnknownTier(_)));
        assert!(h.log.calls().is_empty());
        assert!(h.queue.sent().is_empty());
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_the_run() {
        let h = harness(unclassified_policy());
        h.queue.fail(Channel::Email);
        let outcome = h.orchestrator.run(&request(Tier::Unclassified)).await.unwrap();
        assert!(outcome.overall_success);
        assert_eq!(outcome.state, SagaState::Done);
        assert_eq!(h.queue.on(Channel::Status).len(), 1);
    }

    #[test]
    fn aggregate_requires_label() {
        let ok = StepResult::success("a", StepTarget::SiteSystem);
        assert!(aggregate(true, &[ok.clone()]));
        assert!(!aggregate(false, &[ok]));
        assert!(aggregate(true, &[]));
    }

    #[test]
    fn aggregate_is_order_independent() {
        let ok = StepResult::success("a", StepTarget::SiteSystem);
        let bad = StepResult::failure("b", StepTarget::IdentitySystem, "x");
        assert_eq!(
            aggregate(true, &[ok.clone(), bad.clone()]),
            aggregate(true, &[bad, ok])
        );
    }

    #[test]
    fn done_is_idempotent() {
        let mut outcome = WorkflowOutcome::start(&request(Tier::Unclassified), &unclassified_policy());
        for state in [
            SagaState::Labeling,
            SagaState::StepsRunning,
            SagaState::Aggregating,
            SagaState::Notifying,
            SagaState::Done,
        ] {
            outcome.advance(state).unwrap();
        }
        let finished = outcome.finished_at;
        outcome.advance(SagaState::Done).unwrap();
        assert_eq!(outcome.state, SagaState::Done);
        assert_eq!(outcome.finished_at, finished);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut outcome = WorkflowOutcome::start(&request(Tier::Unclassified), &unclassified_policy());
        let err = outcome.advance(SagaState::StepsRunning).unwrap_err();
        assert!(err.to_string().contains("started to steps_running"));

        outcome.advance(SagaState::Labeling).unwrap();
        outcome.advance(SagaState::LabelFailed).unwrap();
        assert!(outcome.advance(SagaState::StepsRunning).is_err());
    }

    #[tokio::test]
    async fn concurrent_runs_share_one_orchestrator() {
        let h = harness(unclassified_policy());
        let mut a = request(Tier::Unclassified);
        a.group_id = "GA".into();
        let mut b = request(Tier::Unclassified);
        b.group_id = "GB".into();
        let (ra, rb) = tokio::join!(h.orchestrator.run(&a), h.orchestrator.run(&b));
        let (ra, rb) = (ra.unwrap(), rb.unwrap());
        assert_ne!(ra.run_id, rb.run_id);
        assert!(ra.overall_success && rb.overall_success);
        assert_eq!(h.log.count("assign_label"), 2);
    }
}
