use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use sqlx::SqlitePool;

use crate::auth::{CurrentUser, MaybeUser};
use crate::cache::IndexCache;
use crate::comments::list_comments;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::now;
use crate::core::paginator::{Page, Paginator};
use crate::forms::{read_post_form, FormErrors, PageQuery, PostFormData, ValidPost};
use crate::groups::list_groups;
use crate::media::{discard_on_error, remove_image, save_image};
use crate::models::models::{Post, PostView, User};
use crate::templates::{self, attr, escape, redirect};
use crate::AppState;

const POST_VIEW_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.image, p.author_id, \
     u.username AS author_username, p.group_id, g.title AS group_title, g.slug AS group_slug \
     FROM posts p \
     JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id";

const NEWEST_FIRST: &str = "ORDER BY p.pub_date DESC, p.id DESC";

pub struct NewPost {
    pub author_id: i64,
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

/// Which posts a listing page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by every author the given user follows.
    FollowedBy(i64),
}

impl PostFilter {
    fn condition(&self) -> (&'static str, Option<i64>) {
        match self {
            PostFilter::All => ("1 = 1", None),
            PostFilter::Group(id) => ("p.group_id = ?", Some(*id)),
            PostFilter::Author(id) => ("p.author_id = ?", Some(*id)),
            PostFilter::FollowedBy(id) => (
                "p.author_id IN (SELECT author_id FROM follows WHERE user_id = ?)",
                Some(*id),
            ),
        }
    }
}

pub async fn create_post(pool: &SqlitePool, new_post: NewPost) -> Result<Post, sqlx::Error> {
    let post = sqlx::query_as::<_, Post>(
        "INSERT INTO posts (text, pub_date, author_id, group_id, image) VALUES (?, ?, ?, ?, ?) \
         RETURNING id, text, pub_date, author_id, group_id, image",
    )
    .bind(new_post.text)
    .bind(now())
    .bind(new_post.author_id)
    .bind(new_post.group_id)
    .bind(new_post.image)
    .fetch_one(pool)
    .await?;

    tracing::info!(post_id = post.id, author_id = post.author_id, "post created");
    Ok(post)
}

pub async fn get_post(pool: &SqlitePool, post_id: i64) -> Result<Option<Post>, sqlx::Error> {
    sqlx::query_as::<_, Post>(
        "SELECT id, text, pub_date, author_id, group_id, image FROM posts WHERE id = ?",
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await
}

pub async fn get_post_view(
    pool: &SqlitePool,
    post_id: i64,
) -> Result<Option<PostView>, sqlx::Error> {
    let sql = format!("{} WHERE p.id = ?", POST_VIEW_SELECT);
    sqlx::query_as::<_, PostView>(&sql)
        .bind(post_id)
        .fetch_optional(pool)
        .await
}

/// Author and publish date never change on edit.
pub async fn update_post(
    pool: &SqlitePool,
    post_id: i64,
    text: &str,
    group_id: Option<i64>,
    image: Option<&str>,
) -> Result<Post, sqlx::Error> {
    sqlx::query_as::<_, Post>(
        "UPDATE posts SET text = ?, group_id = ?, image = ? WHERE id = ? \
         RETURNING id, text, pub_date, author_id, group_id, image",
    )
    .bind(text)
    .bind(group_id)
    .bind(image)
    .bind(post_id)
    .fetch_one(pool)
    .await
}

pub async fn delete_post(pool: &SqlitePool, post_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(post_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_posts(pool: &SqlitePool, filter: &PostFilter) -> Result<i64, sqlx::Error> {
    let (condition, param) = filter.condition();
    let sql = format!("SELECT COUNT(*) FROM posts p WHERE {}", condition);
    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    if let Some(id) = param {
        query = query.bind(id);
    }
    query.fetch_one(pool).await
}

pub async fn list_posts(
    pool: &SqlitePool,
    filter: &PostFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<PostView>, sqlx::Error> {
    let (condition, param) = filter.condition();
    let sql = format!(
        "{} WHERE {} {} LIMIT ? OFFSET ?",
        POST_VIEW_SELECT, condition, NEWEST_FIRST
    );
    let mut query = sqlx::query_as::<_, PostView>(&sql);
    if let Some(id) = param {
        query = query.bind(id);
    }
    query.bind(limit).bind(offset).fetch_all(pool).await
}

pub async fn paginate_posts(
    pool: &SqlitePool,
    filter: &PostFilter,
    per_page: usize,
    raw_page: Option<&str>,
) -> Result<Page<PostView>, sqlx::Error> {
    let total = count_posts(pool, filter).await?;
    let paginator = Paginator::new(total, per_page);
    let number = paginator.resolve(raw_page);
    let items = list_posts(pool, filter, paginator.limit(), paginator.offset(number)).await?;
    Ok(paginator.page(number, items))
}

async fn load_post(pool: &SqlitePool, post_id: i64) -> ApiResult<Post> {
    get_post(pool, post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("post {}", post_id)))
}

// === HTTP Handlers ===

pub async fn index(
    query: web::Query<PageQuery>,
    state: web::Data<AppState>,
    viewer: MaybeUser,
) -> ApiResult<HttpResponse> {
    let raw_page = query.page.as_deref();

    let total = count_posts(&state.db, &PostFilter::All).await?;
    let number = Paginator::new(total, state.config.posts_per_page).resolve(raw_page);
    let cache_key = IndexCache::key(number, viewer.0.as_ref().map(|u| u.id));
    if let Some(html) = state.index_cache.get(&cache_key) {
        return Ok(templates::html_response(html));
    }

    let page = paginate_posts(
        &state.db,
        &PostFilter::All,
        state.config.posts_per_page,
        raw_page,
    )
    .await?;

    let html = templates::render(
        "posts/index.html",
        "Latest updates",
        viewer.0.as_ref(),
        &[("posts", templates::post_list(&page, "/"))],
    )?;
    state.index_cache.insert(cache_key, html.clone());

    Ok(templates::html_response(html))
}

pub async fn post_detail(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    viewer: MaybeUser,
) -> ApiResult<HttpResponse> {
    let post_id = path.into_inner();
    let post = get_post_view(&state.db, post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("post {}", post_id)))?;

    let author_posts_count = count_posts(&state.db, &PostFilter::Author(post.author_id)).await?;
    let comments = list_comments(&state.db, post.id).await?;
    let is_author = viewer.0.as_ref().map(|u| u.id) == Some(post.author_id);

    let html = templates::render(
        "posts/post_detail.html",
        &format!("Post {}", templates::preview(&post.text)),
        viewer.0.as_ref(),
        &[
            ("post", templates::post_body(&post)),
            ("author_posts_count", author_posts_count.to_string()),
            ("author_actions", templates::author_actions(&post, is_author)),
            ("comments", templates::comment_list(&comments)),
            ("comment_form", templates::comment_form(post.id, viewer.0.is_some())),
        ],
    )?;

    Ok(templates::html_response(html))
}

pub async fn create_form(
    CurrentUser(user): CurrentUser,
    state: web::Data<AppState>,
) -> ApiResult<HttpResponse> {
    render_post_form(&state, &user, None, &PostFormData::default(), &FormErrors::default()).await
}

pub async fn post_create(
    CurrentUser(user): CurrentUser,
    state: web::Data<AppState>,
    payload: Multipart,
) -> ApiResult<HttpResponse> {
    let form = read_post_form(payload, state.config.max_upload_bytes).await?;
    let groups = list_groups(&state.db).await?;

    let valid = match form.validate(&groups) {
        Ok(valid) => valid,
        Err(errors) => return render_post_form(&state, &user, None, &form, &errors).await,
    };

    let image = match &valid.image {
        Some(upload) => Some(save_image(&state.config.media_root, upload).await?),
        None => None,
    };

    let created = create_post(
        &state.db,
        NewPost {
            author_id: user.id,
            text: valid.text,
            group_id: valid.group_id,
            image: image.clone(),
        },
    )
    .await;
    discard_on_error(&state.config.media_root, image.as_deref(), created).await?;

    Ok(redirect(&format!("/profile/{}/", urlencoding::encode(&user.username))))
}

pub async fn edit_form(
    CurrentUser(user): CurrentUser,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let post = load_post(&state.db, path.into_inner()).await?;
    if post.author_id != user.id {
        return Ok(redirect(&format!("/posts/{}/", post.id)));
    }

    let form = PostFormData::from_post(&post);
    render_post_form(&state, &user, Some(&post), &form, &FormErrors::default()).await
}

pub async fn post_edit(
    CurrentUser(user): CurrentUser,
    state: web::Data<AppState>,
    path: web::Path<i64>,
    payload: Multipart,
) -> ApiResult<HttpResponse> {
    let post = load_post(&state.db, path.into_inner()).await?;
    if post.author_id != user.id {
        tracing::warn!(post_id = post.id, user_id = user.id, "edit attempt by non-author");
        return Ok(redirect(&format!("/posts/{}/", post.id)));
    }

    let form = read_post_form(payload, state.config.max_upload_bytes).await?;
    let groups = list_groups(&state.db).await?;
    let valid: ValidPost = match form.validate(&groups) {
        Ok(valid) => valid,
        Err(errors) => return render_post_form(&state, &user, Some(&post), &form, &errors).await,
    };

    let uploaded = match &valid.image {
        Some(upload) => Some(save_image(&state.config.media_root, upload).await?),
        None => None,
    };
    let image = match (&uploaded, valid.clear_image) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => None,
        (None, false) => post.image.clone(),
    };

    let updated = update_post(
        &state.db,
        post.id,
        &valid.text,
        valid.group_id,
        image.as_deref(),
    )
    .await;
    discard_on_error(&state.config.media_root, uploaded.as_deref(), updated).await?;

    if let Some(old) = post.image.as_deref() {
        if image.as_deref() != Some(old) {
            remove_image(&state.config.media_root, old).await;
        }
    }

    tracing::info!(post_id = post.id, "post updated");
    Ok(redirect(&format!("/posts/{}/", post.id)))
}

pub async fn post_delete(
    CurrentUser(user): CurrentUser,
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let post = load_post(&state.db, path.into_inner()).await?;
    if post.author_id != user.id {
        return Ok(redirect(&format!("/posts/{}/", post.id)));
    }

    delete_post(&state.db, post.id).await?;
    if let Some(image) = post.image.as_deref() {
        remove_image(&state.config.media_root, image).await;
    }

    tracing::info!(post_id = post.id, "post deleted");
    Ok(redirect(&format!("/profile/{}/", urlencoding::encode(&user.username))))
}

async fn render_post_form(
    state: &AppState,
    user: &User,
    post: Option<&Post>,
    form: &PostFormData,
    errors: &FormErrors,
) -> ApiResult<HttpResponse> {
    let groups = list_groups(&state.db).await?;
    let selected_group = form.group.trim().parse::<i64>().ok();

    let (title, action, heading, button) = match post {
        Some(post) => (
            "Edit post",
            format!("/posts/{}/edit/", post.id),
            "Edit post",
            "Save",
        ),
        None => ("New post", "/create/".to_string(), "New post", "Add"),
    };

    let html = templates::render(
        "posts/create_post.html",
        title,
        Some(user),
        &[
            ("heading", heading.to_string()),
            ("action", attr(&action)),
            ("button", button.to_string()),
            ("text", escape(&form.text)),
            ("text_errors", templates::field_errors(errors, "text")),
            ("group_options", templates::group_options(&groups, selected_group)),
            ("group_errors", templates::field_errors(errors, "group")),
            ("current_image", templates::current_image(post.and_then(|p| p.image.as_deref()))),
            ("image_errors", templates::field_errors(errors, "image")),
        ],
    )?;

    Ok(templates::html_response(html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::connect_in_memory;
    use crate::follow::follow_user;
    use crate::groups::create_group;
    use crate::users::create_user;

    async fn post_by(pool: &SqlitePool, author_id: i64, text: &str, group_id: Option<i64>) -> Post {
        create_post(
            pool,
            NewPost {
                author_id,
                text: text.to_string(),
                group_id,
                image: None,
            },
        )
        .await
        .unwrap()
    }

    #[actix_web::test]
    async fn filters_select_the_right_posts() {
        let pool = connect_in_memory().await.unwrap();
        let ann = create_user(&pool, "ann", "password-1").await.unwrap();
        let ben = create_user(&pool, "ben", "password-2").await.unwrap();
        let cats = create_group(&pool, "Cats", "cats", "").await.unwrap();

        post_by(&pool, ann.id, "ann in cats", Some(cats.id)).await;
        post_by(&pool, ann.id, "ann alone", None).await;
        post_by(&pool, ben.id, "ben alone", None).await;

        assert_eq!(count_posts(&pool, &PostFilter::All).await.unwrap(), 3);
        assert_eq!(count_posts(&pool, &PostFilter::Group(cats.id)).await.unwrap(), 1);
        assert_eq!(count_posts(&pool, &PostFilter::Author(ann.id)).await.unwrap(), 2);
        assert_eq!(count_posts(&pool, &PostFilter::FollowedBy(ben.id)).await.unwrap(), 0);

        follow_user(&pool, ben.id, ann.id).await.unwrap();
        let feed = list_posts(&pool, &PostFilter::FollowedBy(ben.id), 10, 0).await.unwrap();
        assert_eq!(feed.len(), 2);
        assert!(feed.iter().all(|p| p.author_id == ann.id));
    }

    #[actix_web::test]
    async fn lists_are_newest_first_and_paginated() {
        let pool = connect_in_memory().await.unwrap();
        let ann = create_user(&pool, "ann", "password-1").await.unwrap();
        for i in 1..=13 {
            post_by(&pool, ann.id, &format!("post {}", i), None).await;
        }

        let first = paginate_posts(&pool, &PostFilter::All, 10, None).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first.items[0].text, "post 13");
        assert_eq!(first.num_pages, 2);

        let second = paginate_posts(&pool, &PostFilter::All, 10, Some("2")).await.unwrap();
        assert_eq!(second.len(), 3);
        assert_eq!(second.items[2].text, "post 1");

        let clamped = paginate_posts(&pool, &PostFilter::All, 10, Some("40")).await.unwrap();
        assert_eq!(clamped.number, 2);
    }

    #[actix_web::test]
    async fn update_keeps_author_and_delete_cascades() {
        let pool = connect_in_memory().await.unwrap();
        let ann = create_user(&pool, "ann", "password-1").await.unwrap();
        let post = post_by(&pool, ann.id, "draft", None).await;

        let updated = update_post(&pool, post.id, "final", None, Some("posts/a.gif"))
            .await
            .unwrap();
        assert_eq!(updated.text, "final");
        assert_eq!(updated.author_id, ann.id);
        assert_eq!(updated.pub_date, post.pub_date);
        assert_eq!(updated.image.as_deref(), Some("posts/a.gif"));

        crate::comments::create_comment(&pool, post.id, ann.id, "self reply").await.unwrap();
        assert!(delete_post(&pool, post.id).await.unwrap());
        assert!(get_post(&pool, post.id).await.unwrap().is_none());
        assert!(list_comments(&pool, post.id).await.unwrap().is_empty());
        assert!(!delete_post(&pool, post.id).await.unwrap());
    }

    #[actix_web::test]
    async fn post_view_carries_names() {
        let pool = connect_in_memory().await.unwrap();
        let ann = create_user(&pool, "ann", "password-1").await.unwrap();
        let cats = create_group(&pool, "Cats", "cats", "").await.unwrap();
        let post = post_by(&pool, ann.id, "meow", Some(cats.id)).await;

        let view = get_post_view(&pool, post.id).await.unwrap().unwrap();
        assert_eq!(view.author_username, "ann");
        assert_eq!(view.group_slug.as_deref(), Some("cats"));
        assert_eq!(view.group_title.as_deref(), Some("Cats"));
    }
}
