use axum::extract::{Path, State};
use axum::Json;

use sensitivity_core::request::ClassificationRequest;
use sensitivity_core::types::Tier;
use sensitivity_core::WorkflowOutcome;

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/requests: Run the saga for a payload that names its tier.
///
/// Any run that started answers 200 with the outcome, whether or not every
/// step succeeded. Only validation failures and unknown tiers are errors.
pub async fn submit_request(
    State(app): State<AppState>,
    body: String,
) -> Result<Json<WorkflowOutcome>, AppError> {
    let request = ClassificationRequest::parse(&body)?;
    let outcome = app.orchestrator.run(&request).await?;
    Ok(Json(outcome))
}

/// POST /api/tiers/{tier}/requests: Tier-bound channel. A tier named in the
/// payload still wins.
pub async fn submit_tier_request(
    State(app): State<AppState>,
    Path(tier): Path<String>,
    body: String,
) -> Result<Json<WorkflowOutcome>, AppError> {
    let tier: Tier = tier.parse()?;
    let request = ClassificationRequest::parse_with_tier(&body, tier)?;
    let outcome = app.orchestrator.run(&request).await?;
    Ok(Json(outcome))
}
