use std::str::FromStr;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use grainstore_core::{
    locale::direction_for, resolve_with_source, EntityKind, LocaleMap, ResolvedFrom,
    TranslationContext, Translator,
};
use grainstore_storage::{LocalizedTextError, NewLocalizedText, TenantError};

use crate::problem::ProblemResponse;
use crate::router::AppState;

/// `(locale, tenant, kind, entity_id, field)` path segments of a text lookup.
type TextPath = (String, String, String, String, String);

#[derive(Debug, Deserialize)]
pub struct TextQuery {
    #[serde(default)]
    fallback: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TextResponse {
    locale: String,
    direction: &'static str,
    text: String,
    source: ResolvedFrom,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    items: Vec<BatchItem>,
}

#[derive(Debug, Deserialize)]
pub struct BatchItem {
    kind: EntityKind,
    id: String,
    field: String,
    #[serde(default)]
    fallback: String,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    locale: String,
    direction: &'static str,
    items: Vec<BatchResult>,
}

#[derive(Debug, Serialize)]
pub struct BatchResult {
    kind: EntityKind,
    id: String,
    field: String,
    text: String,
}

/// `GET /api/locales/:locale/tenants/:tenant/:kind/:entity_id/text/:field`
pub async fn get_text(
    State(state): State<AppState>,
    Path((locale, tenant_id, kind, entity_id, field)): Path<TextPath>,
    Query(query): Query<TextQuery>,
) -> Result<Json<TextResponse>, ProblemResponse> {
    let result = lookup_text(&state, locale, &tenant_id, &kind, &entity_id, &field, query).await;
    record_request("get_text", &result);
    result
}

async fn lookup_text(
    state: &AppState,
    locale: String,
    tenant_id: &str,
    kind: &str,
    entity_id: &str,
    field: &str,
    query: TextQuery,
) -> Result<Json<TextResponse>, ProblemResponse> {
    let kind = parse_kind(kind)?;
    ensure_tenant(state, tenant_id).await?;

    let map = state
        .storage()
        .localized_texts()
        .fetch(tenant_id, kind, entity_id, field)
        .await
        .map_err(|err| {
            error!(
                stage = "api",
                tenant = %tenant_id,
                %kind,
                error = %err,
                "failed to load locale map"
            );
            ProblemResponse::internal("storage_error", "failed to load localized text")
        })?;

    let fallback = query.fallback.unwrap_or_default();
    let (text, source) = resolve_with_source(map.as_ref(), &locale, &fallback);
    record_lookup(source);

    Ok(Json(TextResponse {
        direction: direction_for(&locale),
        text: text.to_string(),
        source,
        locale,
    }))
}

/// `POST /api/locales/:locale/tenants/:tenant/translate`
///
/// Loads the tenant's locale maps once and resolves every requested field
/// against the locale from the path.
pub async fn translate_batch(
    State(state): State<AppState>,
    Path((locale, tenant_id)): Path<(String, String)>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ProblemResponse> {
    let result = resolve_batch(&state, locale, &tenant_id, payload).await;
    record_request("translate_batch", &result);
    result
}

async fn resolve_batch(
    state: &AppState,
    locale: String,
    tenant_id: &str,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ProblemResponse> {
    let Json(request) = payload
        .map_err(|rejection| ProblemResponse::from_json_rejection("invalid_batch", rejection))?;
    ensure_tenant(state, tenant_id).await?;

    let index = state
        .storage()
        .localized_texts()
        .load_index(tenant_id)
        .await
        .map_err(|err| {
            error!(stage = "api", tenant = %tenant_id, error = %err, "failed to load locale index");
            ProblemResponse::internal("storage_error", "failed to load localized text")
        })?;

    let context = TranslationContext::new(locale);
    let translator = Translator::new(&index, &context);
    let items = request
        .items
        .into_iter()
        .map(|item| {
            let (text, source) = translator.translate_entity_with_source(
                item.kind,
                &item.id,
                &item.field,
                &item.fallback,
            );
            record_lookup(source);
            BatchResult {
                kind: item.kind,
                id: item.id,
                field: item.field,
                text,
            }
        })
        .collect::<Vec<_>>();

    debug!(
        stage = "api",
        tenant = %tenant_id,
        locale = %context.locale(),
        items = items.len(),
        "resolved translation batch"
    );

    Ok(Json(BatchResponse {
        locale: context.locale().to_string(),
        direction: direction_for(context.locale()),
        items,
    }))
}

/// `PUT /api/tenants/:tenant/:kind/:entity_id/text/:field`
pub async fn put_text(
    State(state): State<AppState>,
    Path((tenant_id, kind, entity_id, field)): Path<(String, String, String, String)>,
    payload: Result<Json<LocaleMap>, JsonRejection>,
) -> Result<StatusCode, ProblemResponse> {
    let result = store_text(&state, &tenant_id, &kind, &entity_id, &field, payload).await;
    record_request("put_text", &result);
    result
}

async fn store_text(
    state: &AppState,
    tenant_id: &str,
    kind: &str,
    entity_id: &str,
    field: &str,
    payload: Result<Json<LocaleMap>, JsonRejection>,
) -> Result<StatusCode, ProblemResponse> {
    let kind = parse_kind(kind)?;
    let Json(texts) = payload.map_err(|rejection| {
        ProblemResponse::from_json_rejection("invalid_locale_map", rejection)
    })?;
    if texts.is_blank() {
        return Err(ProblemResponse::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_locale_map",
            "at least one locale must carry non-blank text",
        ));
    }

    state
        .storage()
        .localized_texts()
        .upsert(&NewLocalizedText {
            tenant_id,
            kind,
            entity_id,
            field,
            texts: &texts,
            updated_at: state.now(),
        })
        .await
        .map_err(|err| match err {
            LocalizedTextError::MissingTenant => ProblemResponse::new(
                StatusCode::NOT_FOUND,
                "tenant_not_found",
                format!("tenant {tenant_id} does not exist"),
            ),
            other => {
                error!(
                    stage = "api",
                    tenant = %tenant_id,
                    %kind,
                    error = %other,
                    "failed to store locale map"
                );
                ProblemResponse::internal("storage_error", "failed to store localized text")
            }
        })?;

    counter!("locale_maps_written_total", "kind" => kind.as_str()).increment(1);
    info!(
        stage = "api",
        tenant = %tenant_id,
        %kind,
        entity = %entity_id,
        %field,
        "stored locale map"
    );
    Ok(StatusCode::NO_CONTENT)
}

fn parse_kind(raw: &str) -> Result<EntityKind, ProblemResponse> {
    EntityKind::from_str(raw).map_err(|err| {
        ProblemResponse::new(StatusCode::BAD_REQUEST, "unknown_entity_kind", err.to_string())
    })
}

async fn ensure_tenant(state: &AppState, tenant_id: &str) -> Result<(), ProblemResponse> {
    match state.storage().tenants().fetch(tenant_id).await {
        Ok(_) => Ok(()),
        Err(TenantError::NotFound) => Err(ProblemResponse::new(
            StatusCode::NOT_FOUND,
            "tenant_not_found",
            format!("tenant {tenant_id} does not exist"),
        )),
        Err(err) => {
            error!(stage = "api", tenant = %tenant_id, error = %err, "failed to load tenant");
            Err(ProblemResponse::internal("storage_error", "failed to load tenant"))
        }
    }
}

fn record_lookup(source: ResolvedFrom) {
    counter!("translation_lookups_total", "source" => source.as_str()).increment(1);
}

pub(crate) fn record_request<T>(endpoint: &'static str, result: &Result<T, ProblemResponse>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(problem) if problem.status().is_client_error() => "client_error",
        Err(_) => "server_error",
    };
    counter!("api_requests_total", "endpoint" => endpoint, "result" => outcome).increment(1);
}
