use axum::extract::{Path, State};
use axum::Json;

use sensitivity_core::policy::TierPolicy;
use sensitivity_core::types::Tier;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/tiers: Every registered tier policy.
pub async fn list_tiers(State(app): State<AppState>) -> Json<Vec<TierPolicy>> {
    Json(app.policies().iter().cloned().collect())
}

/// GET /api/tiers/{tier}
pub async fn get_tier(
    State(app): State<AppState>,
    Path(tier): Path<String>,
) -> Result<Json<TierPolicy>, AppError> {
    let tier: Tier = tier.parse()?;
    let policy = app.policies().resolve(tier)?;
    Ok(Json(policy.clone()))
}
