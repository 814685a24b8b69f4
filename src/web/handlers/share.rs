use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use crate::app::AppState;
use crate::cards::{self, CardTemplate};
use crate::models::assistant::AssistantType;
use crate::models::link::{EmbeddedLink, ShortLink};
use crate::models::share::ShareRecord;
use crate::repos::{get_json, put_json};
use crate::web::{escape_html, ApiError};

const SHARE_ID_LEN: usize = 8;
const PREVIEW_DESCRIPTION_CHARS: usize = 200;

fn new_share_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHARE_ID_LEN)
        .map(char::from)
        .collect()
}

fn new_short_code() -> String {
    let bytes: [u8; 4] = rand::random();
    hex::encode(bytes)
}

/// Ids and codes become blob pathnames.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= 256 && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShare {
    pub text: String,
    pub assistant_type: AssistantType,
    #[serde(default)]
    pub image_url: Option<String>,
}

// POST /api/share
pub async fn create_share(
    State(state): State<AppState>,
    Json(req): Json<CreateShare>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::bad_request("missing_text", "Share text must not be empty"));
    }
    if let Some(image_url) = req.image_url.as_deref() {
        if !is_http_url(image_url) {
            return Err(ApiError::bad_request("invalid_image_url", "Image URL must be an absolute http(s) URL"));
        }
    }

    let id = new_share_id();
    let record = ShareRecord {
        text: req.text,
        assistant_type: req.assistant_type,
        image_url: req.image_url,
        created_at: OffsetDateTime::now_utc(),
    };
    put_json(state.blobs.as_ref(), &ShareRecord::pathname(&id), &record).await?;
    tracing::info!(%id, assistant = %record.assistant_type, "stored share record");

    let share_url = state.config.public_link(&format!("s/{}", id));
    Ok((StatusCode::CREATED, Json(json!({ "id": id, "shareUrl": share_url }))))
}

/// Loads a share record, treating expired ones as absent.
async fn load_share(state: &AppState, id: &str) -> Result<Option<ShareRecord>, ApiError> {
    if !is_valid_key(id) {
        return Ok(None);
    }
    let record: Option<ShareRecord> = get_json(state.blobs.as_ref(), &ShareRecord::pathname(id)).await?;
    Ok(record.filter(|r| !r.is_expired(OffsetDateTime::now_utc(), state.config.blob.share_ttl_days)))
}

// GET /api/share/{id}
pub async fn get_share(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<ShareRecord>, ApiError> {
    load_share(&state, &id).await?.map(Json).ok_or(ApiError::NotFound)
}

#[derive(Debug, Deserialize)]
pub struct CardQuery {
    #[serde(default)]
    pub template: CardTemplate,
}

// GET /api/share/{id}/card.svg
pub async fn share_card(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<CardQuery>,
) -> Result<Response, ApiError> {
    let record = load_share(&state, &id).await?.ok_or(ApiError::NotFound)?;
    let svg = cards::render_svg(q.template, &record);
    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        svg,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

// POST /api/shorten
pub async fn shorten(
    State(state): State<AppState>,
    Json(req): Json<ShortenRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !is_http_url(&req.url) {
        return Err(ApiError::bad_request("invalid_url", "URL must be an absolute http(s) URL"));
    }

    let code = new_short_code();
    let link = ShortLink { url: req.url, created_at: OffsetDateTime::now_utc() };
    put_json(state.blobs.as_ref(), &ShortLink::pathname(&code), &link).await?;
    tracing::info!(%code, "stored short link");

    Ok(Json(json!({
        "shortUrl": state.config.public_link(&format!("s/{}", code)),
        "shortCode": code,
    })))
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

// GET /s/{code}
pub async fn resolve(State(state): State<AppState>, Path(code): Path<String>) -> Result<Response, ApiError> {
    let now = OffsetDateTime::now_utc();
    let ttl_days = state.config.blob.share_ttl_days;

    if let Some(link) = EmbeddedLink::decode(&code) {
        if link.is_expired(now, ttl_days) {
            tracing::debug!(%code, "embedded link expired");
            return Ok(not_found_page());
        }
        return Ok(found(&link.url));
    }

    if !is_valid_key(&code) {
        return Ok(not_found_page());
    }

    let link: Option<ShortLink> = get_json(state.blobs.as_ref(), &ShortLink::pathname(&code)).await?;
    if let Some(link) = link {
        if link.is_expired(now, ttl_days) {
            return Ok(not_found_page());
        }
        return Ok(found(&link.url));
    }

    match load_share(&state, &code).await? {
        Some(record) => {
            let page_url = state.config.public_link(&format!("s/{}", code));
            let card_url = state.config.public_link(&format!("api/share/{}/card.svg", code));
            Ok(Html(render_share_page(&record, &page_url, &card_url)).into_response())
        }
        None => Ok(not_found_page()),
    }
}

fn render_share_page(record: &ShareRecord, page_url: &str, card_url: &str) -> String {
    let title = match record.assistant_type {
        AssistantType::Roast => "My music taste got roasted",
        AssistantType::Hype => "My music taste got hyped",
        AssistantType::Analysis => "My music taste, analyzed",
    };
    let description = cards::truncate(&record.text, PREVIEW_DESCRIPTION_CHARS);
    let image = record.image_url.as_deref().unwrap_or(card_url);

    let paragraphs: String = record
        .text
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p.trim()).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n        ");

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <meta name="description" content="{description}">
    <meta property="og:type" content="article">
    <meta property="og:title" content="{title}">
    <meta property="og:description" content="{description}">
    <meta property="og:url" content="{page_url}">
    <meta property="og:image" content="{image}">
    <meta name="twitter:card" content="summary_large_image">
    <meta name="twitter:title" content="{title}">
    <meta name="twitter:description" content="{description}">
    <meta name="twitter:image" content="{image}">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #0f0f0f; color: #f5f5f5; margin: 0; }}
        main {{ max-width: 640px; margin: 48px auto; padding: 0 24px; }}
        h1 {{ color: #1db954; font-size: 1.4rem; text-transform: uppercase; letter-spacing: 0.1em; }}
        p {{ line-height: 1.6; font-size: 1.1rem; }}
        a {{ color: #1db954; }}
    </style>
</head>
<body>
    <main>
        <h1>{kind}</h1>
        {paragraphs}
        <p><a href="/">Get your own</a></p>
    </main>
</body>
</html>"#,
        title = escape_html(title),
        description = escape_html(&description),
        page_url = escape_html(page_url),
        image = escape_html(image),
        kind = escape_html(record.assistant_type.as_str()),
        paragraphs = paragraphs,
    )
}

fn not_found_page() -> Response {
    (
        StatusCode::NOT_FOUND,
        Html(
            r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Link not found</title></head>
<body style="font-family: sans-serif; background: #0f0f0f; color: #f5f5f5; text-align: center; padding-top: 80px;">
    <h1>This link has expired or never existed</h1>
    <p><a href="/" style="color: #1db954;">Get your own roast</a></p>
</body>
</html>"#,
        ),
    )
        .into_response()
}
