use actix_web::{web, HttpResponse};
use sqlx::SqlitePool;

use crate::auth::CurrentUser;
use crate::core::errors::ApiResult;
use crate::forms::PageQuery;
use crate::models::models::Follow;
use crate::posts::{paginate_posts, PostFilter};
use crate::templates::{self, redirect};
use crate::users::get_user_by_username;
use crate::AppState;

/// Get-or-create. Following oneself is refused and reported as `false`.
pub async fn follow_user(
    pool: &SqlitePool,
    follower_id: i64,
    author_id: i64,
) -> Result<bool, sqlx::Error> {
    if follower_id == author_id {
        return Ok(false);
    }

    sqlx::query("INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?, ?)")
        .bind(follower_id)
        .bind(author_id)
        .execute(pool)
        .await?;

    Ok(true)
}

pub async fn unfollow_user(
    pool: &SqlitePool,
    follower_id: i64,
    author_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM follows WHERE user_id = ? AND author_id = ?")
        .bind(follower_id)
        .bind(author_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn is_following(
    pool: &SqlitePool,
    follower_id: i64,
    author_id: i64,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = ? AND author_id = ?)",
    )
    .bind(follower_id)
    .bind(author_id)
    .fetch_one(pool)
    .await
}

/// Authors the user follows.
pub async fn get_followings(pool: &SqlitePool, user_id: i64) -> Result<Vec<Follow>, sqlx::Error> {
    sqlx::query_as::<_, Follow>(
        "SELECT id, user_id, author_id FROM follows WHERE user_id = ? ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Users following the author.
pub async fn get_followers(pool: &SqlitePool, author_id: i64) -> Result<Vec<Follow>, sqlx::Error> {
    sqlx::query_as::<_, Follow>(
        "SELECT id, user_id, author_id FROM follows WHERE author_id = ? ORDER BY id",
    )
    .bind(author_id)
    .fetch_all(pool)
    .await
}

// === HTTP Handlers ===

pub async fn follow_index(
    query: web::Query<PageQuery>,
    CurrentUser(user): CurrentUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    let page = paginate_posts(
        &state.db,
        &PostFilter::FollowedBy(user.id),
        state.config.posts_per_page,
        query.page.as_deref(),
    )
    .await?;

    let html = templates::render(
        "posts/follow.html",
        "Subscriptions",
        Some(&user),
        &[("posts", templates::post_list(&page, "/follow/"))],
    )?;

    Ok(templates::html_response(html))
}

pub async fn profile_follow(
    CurrentUser(user): CurrentUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let author = get_user_by_username(&state.db, &path.into_inner()).await?;

    if follow_user(&state.db, user.id, author.id).await? {
        tracing::info!(user_id = user.id, author_id = author.id, "followed");
    }

    Ok(redirect(&format!("/profile/{}/", urlencoding::encode(&author.username))))
}

pub async fn profile_unfollow(
    CurrentUser(user): CurrentUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let author = get_user_by_username(&state.db, &path.into_inner()).await?;

    if unfollow_user(&state.db, user.id, author.id).await? {
        tracing::info!(user_id = user.id, author_id = author.id, "unfollowed");
    }

    Ok(redirect(&format!("/profile/{}/", urlencoding::encode(&author.username))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::connect_in_memory;
    use crate::users::create_user;

    #[actix_web::test]
    async fn follow_is_idempotent_and_reversible() {
        let pool = connect_in_memory().await.unwrap();
        let ann = create_user(&pool, "ann", "password-1").await.unwrap();
        let ben = create_user(&pool, "ben", "password-2").await.unwrap();

        assert!(follow_user(&pool, ann.id, ben.id).await.unwrap());
        assert!(follow_user(&pool, ann.id, ben.id).await.unwrap());
        assert!(is_following(&pool, ann.id, ben.id).await.unwrap());
        assert!(!is_following(&pool, ben.id, ann.id).await.unwrap());
        assert_eq!(get_followings(&pool, ann.id).await.unwrap().len(), 1);
        assert_eq!(get_followers(&pool, ben.id).await.unwrap()[0].user_id, ann.id);

        assert!(unfollow_user(&pool, ann.id, ben.id).await.unwrap());
        assert!(!unfollow_user(&pool, ann.id, ben.id).await.unwrap());
        assert!(!is_following(&pool, ann.id, ben.id).await.unwrap());
    }

    #[actix_web::test]
    async fn self_follow_is_refused() {
        let pool = connect_in_memory().await.unwrap();
        let ann = create_user(&pool, "ann", "password-1").await.unwrap();

        assert!(!follow_user(&pool, ann.id, ann.id).await.unwrap());
        assert!(get_followings(&pool, ann.id).await.unwrap().is_empty());

        // the table refuses it as well
        let direct = sqlx::query("INSERT INTO follows (user_id, author_id) VALUES (?, ?)")
            .bind(ann.id)
            .bind(ann.id)
            .execute(&pool)
            .await;
        assert!(direct.is_err());
    }
}
