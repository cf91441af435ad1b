//! The seven HTTP handlers (§6), each a thin adapter from an axum request
//! onto the planner (C7), recommend (C8), suggest (C9), and mutation (C10)
//! entry points.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::filter::{FilterCtx, ParsedQuery};
use crate::group::GroupFieldKind;
use crate::http::dto::{account_summary_json, account_to_json, group_row_to_json};
use crate::mutation::{apply_create, apply_likes_batch, apply_update};
use crate::payload::{AccountPayload, LikesBatchPayload};
use crate::planner::{execute_filter, execute_group, finalize_group_rows};
use crate::recommend::{recommend, resolve_location};
use crate::suggest::suggest;

pub async fn filter_accounts(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, EngineError> {
    let parsed = ParsedQuery::parse_filter_query(&params, &engine.dict)?;
    let index = engine.index.load();
    let ctx = FilterCtx {
        dict: &engine.dict,
        index: &index,
        store: &engine.store,
    };
    let accounts = execute_filter(&parsed.filters, parsed.limit, &ctx);
    let rendered: Vec<Value> = accounts
        .iter()
        .map(|a| account_to_json(a, &parsed.selected_fields, &engine.dict))
        .collect();
    Ok(Json(json!({ "accounts": rendered })))
}

pub async fn group_accounts(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, EngineError> {
    let (parsed, key_names) = ParsedQuery::parse_group_query(&params, &engine.dict)?;
    let keys: Vec<GroupFieldKind> = key_names
        .iter()
        .map(|name| {
            GroupFieldKind::from_name(name)
                .ok_or_else(|| EngineError::BadRequest(format!("unknown group key: {name}")))
        })
        .collect::<Result<_, _>>()?;

    let index = engine.index.load();
    let ctx = FilterCtx {
        dict: &engine.dict,
        index: &index,
        store: &engine.store,
    };
    let rows = execute_group(&parsed.filters, &keys, &ctx, &engine.group_cache)?;
    let rendered = finalize_group_rows(rows, parsed.order, parsed.limit, &engine.dict);
    let groups: Vec<Value> = rendered
        .into_iter()
        .map(|(values, count)| group_row_to_json(&values, count))
        .collect();
    Ok(Json(json!({ "groups": groups })))
}

/// Pulls `limit`/`country`/`city` out of a query param list shared by both
/// recommend and suggest — neither endpoint accepts any other param besides
/// the ignored `query_id`.
fn parse_ranked_query(params: &[(String, String)]) -> Result<(usize, Option<String>, Option<String>), EngineError> {
    let mut limit: Option<usize> = None;
    let mut country = None;
    let mut city = None;
    for (key, value) in params {
        match key.as_str() {
            "query_id" => {}
            "limit" => {
                let n: i64 = value
                    .parse()
                    .map_err(|_| EngineError::BadRequest("limit must be an integer".into()))?;
                if n <= 0 {
                    return Err(EngineError::BadRequest("limit must be positive".into()));
                }
                limit = Some(n as usize);
            }
            "country" => country = Some(value.clone()),
            "city" => city = Some(value.clone()),
            _ => return Err(EngineError::BadRequest(format!("unknown param: {key}"))),
        }
    }
    let limit = limit.ok_or_else(|| EngineError::BadRequest("limit is required".into()))?;
    Ok((limit, country, city))
}

pub async fn recommend_accounts(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<u32>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, EngineError> {
    let me = engine
        .store
        .get(id)
        .ok_or_else(|| EngineError::NotFound(format!("account {id} not found")))?;
    let (limit, country, city) = parse_ranked_query(&params)?;
    let location = resolve_location(country.as_deref(), city.as_deref(), &engine.dict)?;
    let index = engine.index.load();
    let ids = recommend(&me, limit, &location, &index, &engine.store)?;
    let accounts: Vec<Value> = ids
        .iter()
        .filter_map(|&id| engine.store.get(id))
        .map(|a| account_summary_json(&a))
        .collect();
    Ok(Json(json!({ "accounts": accounts })))
}

pub async fn suggest_accounts(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<u32>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, EngineError> {
    let me = engine
        .store
        .get(id)
        .ok_or_else(|| EngineError::NotFound(format!("account {id} not found")))?;
    let (limit, country, city) = parse_ranked_query(&params)?;
    let location = resolve_location(country.as_deref(), city.as_deref(), &engine.dict)?;
    let ids = suggest(&me, limit, &location, &engine.store)?;
    let accounts: Vec<Value> = ids
        .iter()
        .filter_map(|&id| engine.store.get(id))
        .map(|a| account_summary_json(&a))
        .collect();
    Ok(Json(json!({ "accounts": accounts })))
}

pub async fn create_account(
    State(engine): State<Arc<Engine>>,
    Json(payload): Json<AccountPayload>,
) -> Result<(StatusCode, Json<Value>), EngineError> {
    let id = payload
        .id
        .ok_or_else(|| EngineError::BadRequest("id is required".into()))?;
    apply_create(&engine, id, &payload)?;
    Ok((StatusCode::CREATED, Json(json!({}))))
}

pub async fn likes_batch(
    State(engine): State<Arc<Engine>>,
    Json(payload): Json<LikesBatchPayload>,
) -> Result<(StatusCode, Json<Value>), EngineError> {
    apply_likes_batch(&engine, &payload.likes)?;
    Ok((StatusCode::ACCEPTED, Json(json!({}))))
}

pub async fn update_account(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<u32>,
    Json(payload): Json<AccountPayload>,
) -> Result<(StatusCode, Json<Value>), EngineError> {
    apply_update(&engine, id, &payload)?;
    Ok((StatusCode::ACCEPTED, Json(json!({}))))
}
