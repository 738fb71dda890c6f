use actix_web::{web, HttpResponse};
use sqlx::SqlitePool;

use crate::auth::MaybeUser;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::{hash_password, now};
use crate::forms::PageQuery;
use crate::follow::is_following;
use crate::models::models::User;
use crate::posts::{paginate_posts, PostFilter};
use crate::templates::{self, escape};
use crate::AppState;

pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> anyhow::Result<User> {
    let password_hash = hash_password(password)?;
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?) \
         RETURNING id, username, password_hash, created_at",
    )
    .bind(username)
    .bind(password_hash)
    .bind(now())
    .fetch_one(pool)
    .await?;

    tracing::info!(user_id = user.id, username = %user.username, "user created");
    Ok(user)
}

/// True when `create_user` lost to an existing row with the same username.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>()
        .and_then(|e| e.as_database_error())
        .is_some_and(|e| e.is_unique_violation())
}

pub async fn get_user(pool: &SqlitePool, user_id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, created_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn find_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn get_user_by_username(pool: &SqlitePool, username: &str) -> ApiResult<User> {
    find_user_by_username(pool, username)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {}", username)))
}

// === HTTP Handlers ===

pub async fn profile(
    query: web::Query<PageQuery>,
    state: web::Data<AppState>,
    path: web::Path<String>,
    viewer: MaybeUser,
) -> ApiResult<HttpResponse> {
    let author = get_user_by_username(&state.db, &path.into_inner()).await?;

    let following = match &viewer.0 {
        Some(user) => is_following(&state.db, user.id, author.id).await?,
        None => false,
    };

    let page = paginate_posts(
        &state.db,
        &PostFilter::Author(author.id),
        state.config.posts_per_page,
        query.page.as_deref(),
    )
    .await?;

    let base_path = format!("/profile/{}/", urlencoding::encode(&author.username));
    let follow_button = templates::follow_button(viewer.0.as_ref(), &author, following);

    let html = templates::render(
        "posts/profile.html",
        &format!("Profile of {}", author.username),
        viewer.0.as_ref(),
        &[
            ("username", escape(&author.username)),
            ("joined", templates::date(&author.created_at)),
            ("posts_count", page.total.to_string()),
            ("follow_button", follow_button),
            ("posts", templates::post_list(&page, &base_path)),
        ],
    )?;

    Ok(templates::html_response(html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::connect_in_memory;
    use crate::core::helpers::verify_password;

    #[actix_web::test]
    async fn creates_and_finds_users() {
        let pool = connect_in_memory().await.unwrap();
        let user = create_user(&pool, "leo", "secret-password").await.unwrap();
        assert!(verify_password("secret-password", &user.password_hash));

        let found = find_user_by_username(&pool, "leo").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(get_user(&pool, user.id).await.unwrap().is_some());
        assert!(find_user_by_username(&pool, "nobody").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn duplicate_usernames_are_rejected_by_the_database() {
        let pool = connect_in_memory().await.unwrap();
        create_user(&pool, "leo", "secret-password").await.unwrap();
        let err = create_user(&pool, "leo", "other-password").await.unwrap_err();
        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&anyhow::anyhow!("something else")));
    }

    #[actix_web::test]
    async fn unknown_username_is_not_found() {
        let pool = connect_in_memory().await.unwrap();
        let err = get_user_by_username(&pool, "ghost").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
