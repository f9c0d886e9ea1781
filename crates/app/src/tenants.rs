use std::borrow::Cow;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use grainstore_storage::{NewTenant, Tenant, TenantError};

use crate::problem::ProblemResponse;
use crate::router::AppState;
use crate::translations::record_request;

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
pub struct TenantResponse {
    id: String,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<Tenant> for TenantResponse {
    fn from(tenant: Tenant) -> Self {
        Self {
            id: tenant.id,
            name: tenant.name,
            created_at: tenant.created_at,
        }
    }
}

/// `POST /api/tenants`
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateTenantRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TenantResponse>), ProblemResponse> {
    let result = register(&state, payload).await;
    record_request("create_tenant", &result);
    result
}

async fn register(
    state: &AppState,
    payload: Result<Json<CreateTenantRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TenantResponse>), ProblemResponse> {
    let Json(request) = payload
        .map_err(|rejection| ProblemResponse::from_json_rejection("invalid_tenant", rejection))?;

    let id = request.id.trim();
    let name = request.name.trim();
    if id.is_empty() || name.is_empty() {
        return Err(ProblemResponse::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_tenant",
            "tenant id and name must not be blank",
        ));
    }

    let tenant = state
        .storage()
        .tenants()
        .create(NewTenant {
            id: Cow::Borrowed(id),
            name: Cow::Borrowed(name),
            created_at: state.now(),
        })
        .await
        .map_err(|err| match err {
            TenantError::AlreadyExists => ProblemResponse::new(
                StatusCode::CONFLICT,
                "tenant_exists",
                format!("tenant {id} already exists"),
            ),
            other => {
                error!(stage = "api", tenant = %id, error = %other, "failed to create tenant");
                ProblemResponse::internal("storage_error", "failed to create tenant")
            }
        })?;

    info!(stage = "api", tenant = %tenant.id, "tenant created");
    Ok((StatusCode::CREATED, Json(TenantResponse::from(tenant))))
}
