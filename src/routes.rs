use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::errors::{AppError, FieldError};
use crate::middleware::AppState;
use crate::pages::{home_page, HomeContext};
use crate::push::{self, PushPayload};
use crate::registry;

const SERVICE_WORKER: &str = include_str!("../static/sw.js");

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    /// Id of the link created or renamed by the previous request. Explicit
    /// request-scoped context instead of server-side session state.
    pub created: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LinkForm {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub original_url: String,
    #[serde(default)]
    pub custom_alias: String,
    pub link_id: Option<i64>,
    #[serde(default)]
    pub new_alias: String,
}

/// The browser `PushSubscription.toJSON()` shape.
#[derive(Debug, Deserialize)]
pub struct SubscribePayload {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

pub async fn home(
    State(state): State<AppState>,
    Query(query): Query<HomeQuery>,
) -> Result<Html<String>, AppError> {
    let conn = state.pool.lock().unwrap();

    let created = match query.created {
        Some(id) => registry::find_by_id(&conn, id)?,
        None => None,
    };
    let created = created
        .as_ref()
        .map(|link| (link, short_url(&state, &link.short_code)));

    let ctx = HomeContext {
        created,
        vapid_public_key: state.config.vapid_public_key.as_deref(),
        ..Default::default()
    };
    Ok(home_page(&ctx))
}

pub async fn submit(
    State(state): State<AppState>,
    Form(form): Form<LinkForm>,
) -> Result<Response, AppError> {
    match form.action.as_str() {
        "update" => update(state, form).await,
        // The original form defaults to "create" when no action is given.
        _ => create(state, form).await,
    }
}

async fn create(state: AppState, form: LinkForm) -> Result<Response, AppError> {
    let result = {
        let conn = state.pool.lock().unwrap();
        registry::create_link(&conn, &form.original_url, &form.custom_alias)
    };

    match result {
        Ok(link) => {
            info!("created {} -> {}", link.short_code, link.original_url);
            let notification = PushPayload {
                title: "New short link".to_string(),
                body: format!("{} now points to {}", link.short_code, link.original_url),
                url: short_url(&state, &link.short_code),
            };
            tokio::spawn(push::broadcast(state, notification));
            Ok(Redirect::to(&format!("/?created={}", link.id)).into_response())
        }
        Err(AppError::Validation(errors)) => Ok(render_form_errors(&state, &form, &errors)),
        Err(err) => Err(err),
    }
}

async fn update(state: AppState, form: LinkForm) -> Result<Response, AppError> {
    let link_id = form.link_id.ok_or(AppError::NotFound)?;

    let result = {
        let conn = state.pool.lock().unwrap();
        registry::update_alias(&conn, link_id, &form.new_alias)
    };

    match result {
        Ok(link) => {
            info!("renamed link {} to {}", link.id, link.short_code);
            Ok(Redirect::to(&format!("/?created={}", link.id)).into_response())
        }
        Err(AppError::Validation(errors)) => {
            // Re-render the result panel for the link being edited so the
            // user keeps the edit form in front of them.
            let conn = state.pool.lock().unwrap();
            let created = registry::find_by_id(&conn, link_id)?;
            let created = created
                .as_ref()
                .map(|link| (link, short_url(&state, &link.short_code)));
            let ctx = HomeContext {
                created,
                errors: &errors,
                vapid_public_key: state.config.vapid_public_key.as_deref(),
                ..Default::default()
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, home_page(&ctx)).into_response())
        }
        Err(err) => Err(err),
    }
}

fn render_form_errors(state: &AppState, form: &LinkForm, errors: &[FieldError]) -> Response {
    let ctx = HomeContext {
        errors,
        original_url: &form.original_url,
        custom_alias: &form.custom_alias,
        vapid_public_key: state.config.vapid_public_key.as_deref(),
        ..Default::default()
    };
    (StatusCode::UNPROCESSABLE_ENTITY, home_page(&ctx)).into_response()
}

/// `GET /{code}/`: look up the code, count the click, 302 to the
/// destination.
pub async fn follow(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    debug!("looking up code: {}", code);

    let destination = {
        let conn = state.pool.lock().unwrap();
        registry::resolve_and_count(&conn, &code)?
    };

    Ok((StatusCode::FOUND, [(header::LOCATION, destination)]).into_response())
}

pub async fn subscribe(
    State(state): State<AppState>,
    Json(payload): Json<SubscribePayload>,
) -> Result<Response, AppError> {
    let subscription = {
        let conn = state.pool.lock().unwrap();
        push::subscribe(
            &conn,
            &payload.endpoint,
            &payload.keys.p256dh,
            &payload.keys.auth,
        )?
    };

    info!("registered push subscription {}", subscription.id);
    Ok((StatusCode::CREATED, Json(json!({ "id": subscription.id }))).into_response())
}

pub async fn service_worker() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, mime::APPLICATION_JAVASCRIPT_UTF_8.as_ref())],
        SERVICE_WORKER,
    )
}

fn short_url(state: &AppState, code: &str) -> String {
    format!("{}/{}/", state.config.base_url.trim_end_matches('/'), code)
}
