use actix_web::web;

use crate::core::errors::ApiError;
use crate::{auth, comments, follow, groups, media, pages, posts, static_server, users};

/// Every route of the site. Paths are registered with a trailing slash; the
/// server normalises incoming paths to match.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| ApiError::NotFound(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::FormConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .route("/", web::get().to(posts::index))
    .route("/group/{slug}/", web::get().to(groups::group_posts))
    .route("/profile/{username}/", web::get().to(users::profile))
    .route("/profile/{username}/follow/", web::get().to(follow::profile_follow))
    .route("/profile/{username}/follow/", web::post().to(follow::profile_follow))
    .route("/profile/{username}/unfollow/", web::get().to(follow::profile_unfollow))
    .route("/profile/{username}/unfollow/", web::post().to(follow::profile_unfollow))
    .route("/follow/", web::get().to(follow::follow_index))
    .route("/create/", web::get().to(posts::create_form))
    .route("/create/", web::post().to(posts::post_create))
    .route("/posts/{post_id}/", web::get().to(posts::post_detail))
    .route("/posts/{post_id}/edit/", web::get().to(posts::edit_form))
    .route("/posts/{post_id}/edit/", web::post().to(posts::post_edit))
    .route("/posts/{post_id}/delete/", web::post().to(posts::post_delete))
    .route("/posts/{post_id}/comment/", web::route().to(comments::add_comment))
    .route("/auth/signup/", web::get().to(auth::signup_form))
    .route("/auth/signup/", web::post().to(auth::signup))
    .route("/auth/login/", web::get().to(auth::login_form))
    .route("/auth/login/", web::post().to(auth::login))
    .route("/auth/logout/", web::route().to(auth::logout))
    .route("/about/author/", web::get().to(pages::about_author))
    .route("/about/tech/", web::get().to(pages::about_tech))
    .route("/static/{path:.*}", web::get().to(static_server::serve_static))
    .route("/media/{path:.*}", web::get().to(media::serve_media))
    .default_service(web::route().to(pages::not_found));
}
