use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};

use crate::api::AppState;
use crate::error::Result;
use crate::query::run_query;

pub async fn logs_list(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse> {
    let result = run_query(&state.pool, &state.registry, "logs/list", &query).await?;
    Ok(Json(result))
}

pub async fn logs_dimension_names(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse> {
    let result = run_query(&state.pool, &state.registry, "logs/dimension_names", &query).await?;
    Ok(Json(result))
}

pub async fn logs_dimension_values(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse> {
    let result = run_query(
        &state.pool,
        &state.registry,
        "logs/dimension_values",
        &query,
    )
    .await?;
    Ok(Json(result))
}
