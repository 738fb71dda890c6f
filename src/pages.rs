use actix_web::HttpResponse;

use crate::auth::MaybeUser;
use crate::core::errors::{ApiError, ApiResult};
use crate::templates;

pub async fn about_author(viewer: MaybeUser) -> ApiResult<HttpResponse> {
    let html = templates::render("about/author.html", "About the author", viewer.0.as_ref(), &[])?;
    Ok(templates::html_response(html))
}

pub async fn about_tech(viewer: MaybeUser) -> ApiResult<HttpResponse> {
    let html = templates::render("about/tech.html", "Technologies", viewer.0.as_ref(), &[])?;
    Ok(templates::html_response(html))
}

/// Fallback for every unrouted path.
pub async fn not_found() -> ApiResult<HttpResponse> {
    Err(ApiError::NotFound("no route".to_string()))
}
