use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::server::AppState;
use crate::store::{Provider, RequestShape};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInput {
    pub name: String,
    pub base_address: String,
    pub api_key: String,
    pub request_shape: RequestShape,
    pub azure_api_version: Option<String>,
    pub models: Vec<String>,
}

pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<Provider>> {
    Json(state.store.list_providers().await)
}

pub async fn create_provider(
    State(state): State<AppState>,
    Json(input): Json<ProviderInput>,
) -> AppResult<Json<Provider>> {
    let now = Utc::now();
    let provider = Provider {
        id: Uuid::new_v4(),
        name: input.name,
        base_address: input.base_address,
        api_key: input.api_key,
        request_shape: input.request_shape,
        azure_api_version: input.azure_api_version,
        models: input.models,
        refreshed_at: now,
    };
    Ok(Json(state.store.create_provider(provider).await?))
}

pub async fn update_provider(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ProviderInput>,
) -> AppResult<Json<Provider>> {
    let provider = Provider {
        id,
        name: input.name,
        base_address: input.base_address,
        api_key: input.api_key,
        request_shape: input.request_shape,
        azure_api_version: input.azure_api_version,
        models: input.models,
        refreshed_at: Utc::now(),
    };
    Ok(Json(state.store.update_provider(provider).await?))
}

pub async fn delete_provider(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<()> {
    state.store.delete_provider(id).await
}
