//! UF rate endpoints.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use propia_core::AppError;
use serde::{Deserialize, Serialize};

use crate::error::HttpAppError;
use crate::services::rates::{self, UfRate};
use crate::state::AppState;

/// Current UF value in CLP.
pub async fn current_uf(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UfRate>, HttpAppError> {
    let rate = state
        .rates
        .current()
        .await
        .map_err(|e| AppError::RateLookup(e.to_string()))?;
    Ok(Json(rate))
}

#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    pub amount: f64,
    /// Source unit: "clp" or "uf"
    pub from: String,
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub amount: f64,
    pub from: String,
    /// CLP per 1 UF used for the conversion
    pub rate: f64,
    pub result: f64,
}

/// Convert an amount between CLP and UF at the current rate.
pub async fn convert(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConvertQuery>,
) -> Result<Json<ConvertResponse>, HttpAppError> {
    if !query.amount.is_finite() || query.amount < 0.0 {
        return Err(AppError::InvalidInput("amount must be a non-negative number".to_string()).into());
    }

    let rate = state
        .rates
        .current()
        .await
        .map_err(|e| AppError::RateLookup(e.to_string()))?;

    let result = match query.from.to_lowercase().as_str() {
        "clp" => rates::clp_to_uf(query.amount, rate.value),
        "uf" => rates::uf_to_clp(query.amount, rate.value),
        other => {
            return Err(AppError::InvalidInput(format!(
                "Unknown source unit {:?}, expected \"clp\" or \"uf\"",
                other
            ))
            .into())
        }
    };

    Ok(Json(ConvertResponse {
        amount: query.amount,
        from: query.from.to_lowercase(),
        rate: rate.value,
        result,
    }))
}
