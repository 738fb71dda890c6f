use actix_web::{web, HttpResponse};
use sqlx::SqlitePool;

use crate::auth::CurrentUser;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::now;
use crate::forms::CommentForm;
use crate::models::models::{Comment, CommentView};
use crate::posts::get_post;
use crate::templates::redirect;
use crate::AppState;

pub async fn create_comment(
    pool: &SqlitePool,
    post_id: i64,
    author_id: i64,
    text: &str,
) -> Result<Comment, sqlx::Error> {
    sqlx::query_as::<_, Comment>(
        "INSERT INTO comments (post_id, author_id, text, created) VALUES (?, ?, ?, ?) \
         RETURNING id, post_id, author_id, text, created",
    )
    .bind(post_id)
    .bind(author_id)
    .bind(text)
    .bind(now())
    .fetch_one(pool)
    .await
}

/// Oldest first, so a thread reads top to bottom.
pub async fn list_comments(
    pool: &SqlitePool,
    post_id: i64,
) -> Result<Vec<CommentView>, sqlx::Error> {
    sqlx::query_as::<_, CommentView>(
        "SELECT c.id, c.text, c.created, u.username AS author_username \
         FROM comments c JOIN users u ON u.id = c.author_id \
         WHERE c.post_id = ? ORDER BY c.created, c.id",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
}

/// Any method is accepted; without a valid form body nothing is saved and
/// the client simply lands back on the post.
pub async fn add_comment(
    CurrentUser(user): CurrentUser,
    state: web::Data<AppState>,
    path: web::Path<i64>,
    form: Option<web::Form<CommentForm>>,
) -> ApiResult<HttpResponse> {
    let post_id = path.into_inner();
    let post = get_post(&state.db, post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("post {}", post_id)))?;

    if let Some(text) = form.as_ref().and_then(|f| f.cleaned_text()) {
        let comment = create_comment(&state.db, post.id, user.id, text).await?;
        tracing::info!(comment_id = comment.id, post_id = post.id, "comment added");
    }

    Ok(redirect(&format!("/posts/{}/", post.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::connect_in_memory;
    use crate::posts::{create_post, NewPost};
    use crate::users::create_user;

    #[actix_web::test]
    async fn comments_are_listed_in_order_with_authors() {
        let pool = connect_in_memory().await.unwrap();
        let ann = create_user(&pool, "ann", "password-1").await.unwrap();
        let ben = create_user(&pool, "ben", "password-2").await.unwrap();
        let post = create_post(
            &pool,
            NewPost {
                author_id: ann.id,
                text: "hello".to_string(),
                group_id: None,
                image: None,
            },
        )
        .await
        .unwrap();

        create_comment(&pool, post.id, ben.id, "first!").await.unwrap();
        create_comment(&pool, post.id, ann.id, "thanks").await.unwrap();

        let comments = list_comments(&pool, post.id).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].text, "first!");
        assert_eq!(comments[0].author_username, "ben");
        assert_eq!(comments[1].author_username, "ann");
    }

    #[actix_web::test]
    async fn comments_need_an_existing_post() {
        let pool = connect_in_memory().await.unwrap();
        let ann = create_user(&pool, "ann", "password-1").await.unwrap();
        assert!(create_comment(&pool, 404, ann.id, "orphan").await.is_err());
    }
}
