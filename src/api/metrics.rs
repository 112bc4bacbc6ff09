use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};

use crate::api::AppState;
use crate::error::Result;
use crate::query::run_query;

pub async fn metrics_statistics(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse> {
    let result = run_query(&state.pool, &state.registry, "metrics/statistics", &query).await?;
    Ok(Json(result))
}

pub async fn metrics_names(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse> {
    let result = run_query(&state.pool, &state.registry, "metrics/names", &query).await?;
    Ok(Json(result))
}

pub async fn metrics_dimension_names(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse> {
    let result = run_query(
        &state.pool,
        &state.registry,
        "metrics/dimension_names",
        &query,
    )
    .await?;
    Ok(Json(result))
}

pub async fn metrics_dimension_values(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse> {
    let result = run_query(
        &state.pool,
        &state.registry,
        "metrics/dimension_values",
        &query,
    )
    .await?;
    Ok(Json(result))
}
