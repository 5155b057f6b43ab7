use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use cdx_access::{AccessPolicy, AccessRule, DateWindow, RelativeWindow};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NewPolicy {
    name: String,
    access_points: Vec<String>,
}

pub async fn list_policies(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Vec<AccessPolicy>>, AppError> {
    let access = state.access_store(&name, false)?;
    Ok(Json(access.list_policies()))
}

pub async fn get_policy(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, u64)>,
) -> Result<Json<AccessPolicy>, AppError> {
    let access = state.access_store(&name, false)?;
    access.policy(id).map(Json).ok_or(AppError::UnknownPolicy(id))
}

pub async fn create_policy(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<NewPolicy>,
) -> Result<(StatusCode, Json<AccessPolicy>), AppError> {
    let access = state.access_store(&name, true)?;
    let policy = access.put_policy(body.name, body.access_points)?;
    Ok((StatusCode::CREATED, Json(policy)))
}

#[derive(Debug, Deserialize)]
pub struct NewRule {
    policy_id: u64,
    surts: Vec<String>,
    #[serde(default)]
    captured: Option<DateWindow>,
    #[serde(default)]
    accessed: Option<DateWindow>,
    #[serde(default)]
    period: Option<RelativeWindow>,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct RulesQuery {
    surt: String,
}

pub async fn list_rules(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<RulesQuery>,
) -> Result<Json<Vec<AccessRule>>, AppError> {
    let access = state.access_store(&name, false)?;
    Ok(Json(access.rules_for_surt(&params.surt)))
}

pub async fn create_rule(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<NewRule>,
) -> Result<(StatusCode, Json<AccessRule>), AppError> {
    let access = state.access_store(&name, true)?;
    let rule = access.put_rule(AccessRule {
        id: 0,
        policy_id: body.policy_id,
        surts: body.surts,
        captured: body.captured,
        accessed: body.accessed,
        period: body.period,
        enabled: body.enabled,
    })?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn delete_rule(State(state): State<AppState>, Path((name, id)): Path<(String, u64)>) -> Result<StatusCode, AppError> {
    let access = state.access_store(&name, false)?;
    access.delete_rule(id)?;
    Ok(StatusCode::NO_CONTENT)
}

