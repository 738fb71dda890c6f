use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use chrono::Duration;
use futures_util::future::LocalBoxFuture;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::config::SESSION_COOKIE;
use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::{is_local_path, now, validate_uuid, verify_password};
use crate::forms::{FormErrors, LoginForm, PageQuery, SignupForm};
use crate::models::models::{Session, User};
use crate::templates::{self, attr, redirect};
use crate::users::{create_user, find_user_by_username, get_user, is_unique_violation};
use crate::AppState;

const USERNAME_TAKEN: &str = "A user with that username already exists.";

pub async fn create_session(pool: &SqlitePool, user_id: i64) -> Result<String, sqlx::Error> {
    let token = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (token, user_id, created_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(user_id)
        .bind(now())
        .execute(pool)
        .await?;
    Ok(token)
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// The user behind a session token, if the token exists, has not expired and
/// still points at a user.
pub async fn validate_session(
    pool: &SqlitePool,
    token: &str,
    expiration_hours: i64,
) -> Result<Option<User>, sqlx::Error> {
    if !validate_uuid(token) {
        return Ok(None);
    }

    let session = sqlx::query_as::<_, Session>(
        "SELECT token, user_id, created_at FROM sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    let Some(session) = session else {
        return Ok(None);
    };

    if now() - session.created_at > Duration::hours(expiration_hours) {
        delete_session(pool, token).await?;
        return Ok(None);
    }

    get_user(pool, session.user_id).await
}

pub fn session_cookie(token: &str, expiration_hours: i64) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::hours(expiration_hours))
        .finish()
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::ZERO)
        .finish()
}

async fn viewer_from_request(
    state: Option<web::Data<AppState>>,
    token: Option<String>,
) -> ApiResult<Option<User>> {
    let state = state
        .ok_or_else(|| ApiError::InternalError("application state missing".to_string()))?;
    let Some(token) = token else {
        return Ok(None);
    };
    let hours = state.config.session_expiration_hours;
    Ok(validate_session(&state.db, &token, hours).await?)
}

/// The logged-in user; anonymous requests are sent to the login page.
pub struct CurrentUser(pub User);

impl FromRequest for CurrentUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
        let next = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.path().to_string());

        Box::pin(async move {
            match viewer_from_request(state, token).await? {
                Some(user) => Ok(CurrentUser(user)),
                None => Err(ApiError::LoginRequired(next)),
            }
        })
    }
}

/// The logged-in user, if any.
pub struct MaybeUser(pub Option<User>);

impl FromRequest for MaybeUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());

        Box::pin(async move { Ok(MaybeUser(viewer_from_request(state, token).await?)) })
    }
}

// === HTTP Handlers ===

pub async fn login_form(
    query: web::Query<PageQuery>,
    viewer: MaybeUser,
) -> ApiResult<HttpResponse> {
    let next = query.next.as_deref().unwrap_or("/");
    render_login(viewer.0.as_ref(), "", next, None)
}

pub async fn login(
    state: web::Data<AppState>,
    form: web::Form<LoginForm>,
) -> ApiResult<HttpResponse> {
    let form = form.into_inner();
    let user = find_user_by_username(&state.db, form.username.trim()).await?;

    let user = match user {
        Some(user) if verify_password(&form.password, &user.password_hash) => user,
        _ => {
            tracing::warn!(username = %form.username, "failed login");
            return render_login(
                None,
                &form.username,
                &form.next,
                Some("Please enter a correct username and password."),
            );
        }
    };

    let token = create_session(&state.db, user.id).await?;
    tracing::info!(user_id = user.id, "logged in");

    let target = if is_local_path(&form.next) { form.next.as_str() } else { "/" };
    let mut response = redirect(target);
    response
        .add_cookie(&session_cookie(&token, state.config.session_expiration_hours))
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(response)
}

pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        delete_session(&state.db, cookie.value()).await?;
    }

    let mut response = redirect("/");
    response
        .add_cookie(&removal_cookie())
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(response)
}

pub async fn signup_form(viewer: MaybeUser) -> ApiResult<HttpResponse> {
    render_signup(viewer.0.as_ref(), &SignupForm::default(), &FormErrors::default())
}

pub async fn signup(
    state: web::Data<AppState>,
    form: web::Form<SignupForm>,
) -> ApiResult<HttpResponse> {
    let form = form.into_inner();
    let mut errors = form.validate();
    let username = form.username.trim();

    if errors.get("username").is_none()
        && find_user_by_username(&state.db, username).await?.is_some()
    {
        errors.add("username", USERNAME_TAKEN);
    }
    if !errors.is_empty() {
        return render_signup(None, &form, &errors);
    }

    // a concurrent signup can still win the name between the check and the insert
    let user = match create_user(&state.db, username, &form.password1).await {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => {
            errors.add("username", USERNAME_TAKEN);
            return render_signup(None, &form, &errors);
        }
        Err(e) => return Err(e.into()),
    };
    let token = create_session(&state.db, user.id).await?;

    let mut response = redirect("/");
    response
        .add_cookie(&session_cookie(&token, state.config.session_expiration_hours))
        .map_err(|e| ApiError::InternalError(e.to_string()))?;
    Ok(response)
}

fn render_login(
    viewer: Option<&User>,
    username: &str,
    next: &str,
    error: Option<&str>,
) -> ApiResult<HttpResponse> {
    let html = templates::render(
        "auth/login.html",
        "Log in",
        viewer,
        &[
            ("username", attr(username)),
            ("next", attr(next)),
            ("errors", error.map(templates::error_block).unwrap_or_default()),
        ],
    )?;
    Ok(templates::html_response(html))
}

fn render_signup(
    viewer: Option<&User>,
    form: &SignupForm,
    errors: &FormErrors,
) -> ApiResult<HttpResponse> {
    let html = templates::render(
        "auth/signup.html",
        "Sign up",
        viewer,
        &[
            ("username", attr(&form.username)),
            ("username_errors", templates::field_errors(errors, "username")),
            ("password1_errors", templates::field_errors(errors, "password1")),
            ("password2_errors", templates::field_errors(errors, "password2")),
        ],
    )?;
    Ok(templates::html_response(html))
}
