use actix_web::{web, HttpResponse};
use sqlx::SqlitePool;

use crate::auth::MaybeUser;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::sanitize_html;
use crate::forms::PageQuery;
use crate::models::models::Group;
use crate::posts::{paginate_posts, PostFilter};
use crate::templates::{self, escape};
use crate::AppState;

pub async fn create_group(
    pool: &SqlitePool,
    title: &str,
    slug: &str,
    description: &str,
) -> anyhow::Result<Group> {
    if !is_valid_slug(slug) {
        anyhow::bail!("slug {:?} may only contain letters, digits, '-' and '_'", slug);
    }

    let group = sqlx::query_as::<_, Group>(
        "INSERT INTO groups (title, slug, description) VALUES (?, ?, ?) \
         RETURNING id, title, slug, description",
    )
    .bind(title.trim())
    .bind(slug)
    .bind(description)
    .fetch_one(pool)
    .await?;

    tracing::info!(group_id = group.id, slug = %group.slug, "group created");
    Ok(group)
}

pub async fn find_group_by_slug(
    pool: &SqlitePool,
    slug: &str,
) -> Result<Option<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>("SELECT id, title, slug, description FROM groups WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await
}

pub async fn list_groups(pool: &SqlitePool) -> Result<Vec<Group>, sqlx::Error> {
    sqlx::query_as::<_, Group>("SELECT id, title, slug, description FROM groups ORDER BY title, id")
        .fetch_all(pool)
        .await
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
}

// === HTTP Handlers ===

pub async fn group_posts(
    query: web::Query<PageQuery>,
    state: web::Data<AppState>,
    path: web::Path<String>,
    viewer: MaybeUser,
) -> ApiResult<HttpResponse> {
    let slug = path.into_inner();
    let group = find_group_by_slug(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("group {}", slug)))?;

    let page = paginate_posts(
        &state.db,
        &PostFilter::Group(group.id),
        state.config.posts_per_page,
        query.page.as_deref(),
    )
    .await?;

    let base_path = format!("/group/{}/", urlencoding::encode(&group.slug));
    let html = templates::render(
        "posts/group_list.html",
        &group.to_string(),
        viewer.0.as_ref(),
        &[
            ("title", escape(&group.title)),
            ("description", sanitize_html(&group.description)),
            ("posts", templates::post_list(&page, &base_path)),
        ],
    )?;

    Ok(templates::html_response(html))
}
