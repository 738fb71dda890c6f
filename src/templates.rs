use std::sync::OnceLock;

use actix_web::http::{header, StatusCode};
use actix_web::HttpResponse;
use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use rust_embed::RustEmbed;

use crate::core::errors::{ApiError, ApiResult};
use crate::core::helpers::{format_date, render_text};
use crate::core::paginator::Page;
use crate::forms::FormErrors;
use crate::models::models::{CommentView, Group, PostView, User};

#[derive(RustEmbed)]
#[folder = "templates"]
struct Templates;

const BASE_TEMPLATE: &str = "base.html";
const SITE_NAME: &str = "Scribe";

fn placeholder_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"\{\{\s*([a-z0-9_]+)\s*\}\}").expect("Regex should compile")
    })
}

fn load(name: &str) -> ApiResult<String> {
    let file = Templates::get(name)
        .ok_or_else(|| ApiError::InternalError(format!("template {} not found", name)))?;
    String::from_utf8(file.data.into_owned())
        .map_err(|e| ApiError::InternalError(format!("template {} is not UTF-8: {}", name, e)))
}

/// Fills `{{ name }}` placeholders in one pass, so substituted values are
/// never scanned for placeholders themselves. Unknown names become empty.
fn substitute(template: &str, vars: &[(&str, String)]) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            vars.iter()
                .find(|(key, _)| *key == &caps[1])
                .map(|(_, value)| value.clone())
                .unwrap_or_default()
        })
        .into_owned()
}

/// Renders a page template inside the base layout.
///
/// Values are inserted verbatim: callers escape anything user supplied.
pub fn render(
    template: &str,
    title: &str,
    viewer: Option<&User>,
    vars: &[(&str, String)],
) -> ApiResult<String> {
    let content = substitute(&load(template)?, vars);
    let base = load(BASE_TEMPLATE)?;

    Ok(substitute(
        &base,
        &[
            ("title", format!("{} | {}", escape(title), SITE_NAME)),
            ("template", attr(template)),
            ("nav", nav(viewer)),
            ("content", content),
        ],
    ))
}

pub fn render_error(template: &str, status: StatusCode) -> ApiResult<String> {
    render(
        template,
        status.canonical_reason().unwrap_or("Error"),
        None,
        &[("status", status.as_u16().to_string())],
    )
}

pub fn html_response(html: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html)
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location.to_string()))
        .finish()
}

/// For element content only; values placed inside `"..."` attributes go through [`attr`].
pub fn escape(text: &str) -> String {
    html_escape::encode_text(text).to_string()
}

pub fn attr(text: &str) -> String {
    html_escape::encode_double_quoted_attribute(text).to_string()
}

pub fn date(date: &DateTime<Utc>) -> String {
    escape(&format_date(date))
}

pub fn preview(text: &str) -> String {
    text.chars().take(30).collect()
}

fn profile_href(username: &str) -> String {
    attr(&format!("/profile/{}/", urlencoding::encode(username)))
}

fn nav(viewer: Option<&User>) -> String {
    match viewer {
        Some(user) => format!(
            r#"<a href="/about/author/">About</a>
      <a href="/create/">New post</a>
      <a href="/follow/">Subscriptions</a>
      <a href="{}">@{}</a>
      <a href="/auth/logout/">Log out</a>"#,
            profile_href(&user.username),
            escape(&user.username)
        ),
        None => r#"<a href="/about/author/">About</a>
      <a href="/auth/login/">Log in</a>
      <a href="/auth/signup/">Sign up</a>"#
            .to_string(),
    }
}

fn image_tag(image: Option<&str>) -> String {
    image
        .map(|path| format!(r#"<img class="post-image" src="/media/{}" alt="">"#, attr(path)))
        .unwrap_or_default()
}

fn post_meta(post: &PostView) -> String {
    let group = match (&post.group_slug, &post.group_title) {
        (Some(slug), Some(title)) => format!(
            r#" &middot; <a href="/group/{}/">#{}</a>"#,
            attr(&urlencoding::encode(slug)),
            escape(title)
        ),
        _ => String::new(),
    };

    format!(
        r#"<p class="post-meta"><a href="{}">{}</a> &middot; {}{}</p>"#,
        profile_href(&post.author_username),
        escape(&post.author_username),
        date(&post.pub_date),
        group
    )
}

pub fn post_card(post: &PostView) -> String {
    format!(
        r#"<article class="post">
  {}
  {}
  <div class="post-text">{}</div>
  <a class="post-link" href="/posts/{}/">details</a>
</article>"#,
        post_meta(post),
        image_tag(post.image.as_deref()),
        render_text(&post.text),
        post.id
    )
}

pub fn post_body(post: &PostView) -> String {
    format!(
        r#"<article class="post post-full">
  {}
  {}
  <div class="post-text">{}</div>
</article>"#,
        post_meta(post),
        image_tag(post.image.as_deref()),
        render_text(&post.text)
    )
}

pub fn post_list(page: &Page<PostView>, base_path: &str) -> String {
    if page.is_empty() {
        return r#"<p class="empty">No posts yet.</p>"#.to_string();
    }

    let mut html: String = page
        .items
        .iter()
        .map(post_card)
        .collect::<Vec<_>>()
        .join("\n<hr>\n");
    html.push_str(&paginator_nav(page, base_path));
    html
}

pub fn paginator_nav<T>(page: &Page<T>, base_path: &str) -> String {
    if page.num_pages <= 1 {
        return String::new();
    }

    let link = |number: usize, label: &str| {
        format!(
            r#"<a href="{}?page={}">{}</a>"#,
            attr(base_path),
            number,
            label
        )
    };

    let mut parts = Vec::new();
    if page.has_previous() {
        parts.push(link(1, "&laquo; first"));
        parts.push(link(page.number - 1, "previous"));
    }
    parts.push(format!(
        r#"<span class="current">Page {} of {}</span>"#,
        page.number, page.num_pages
    ));
    if page.has_next() {
        parts.push(link(page.number + 1, "next"));
        parts.push(link(page.num_pages, "last &raquo;"));
    }

    format!(r#"<nav class="pagination">{}</nav>"#, parts.join(" "))
}

pub fn author_actions(post: &PostView, is_author: bool) -> String {
    if !is_author {
        return String::new();
    }
    format!(
        r#"<div class="author-actions">
  <a href="/posts/{id}/edit/">Edit post</a>
  <form method="post" action="/posts/{id}/delete/"><button type="submit">Delete</button></form>
</div>"#,
        id = post.id
    )
}

pub fn comment_list(comments: &[CommentView]) -> String {
    if comments.is_empty() {
        return r#"<p class="empty">No comments yet.</p>"#.to_string();
    }

    comments
        .iter()
        .map(|comment| {
            format!(
                r#"<div class="comment" id="comment-{}">
  <p class="comment-meta"><a href="{}">{}</a> &middot; {}</p>
  <p>{}</p>
</div>"#,
                comment.id,
                profile_href(&comment.author_username),
                escape(&comment.author_username),
                date(&comment.created),
                render_text(&comment.text)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn comment_form(post_id: i64, logged_in: bool) -> String {
    if !logged_in {
        return format!(
            r#"<p><a href="/auth/login/?next=/posts/{}/">Log in</a> to comment.</p>"#,
            post_id
        );
    }
    format!(
        r#"<form method="post" action="/posts/{}/comment/" class="comment-form">
  <label for="id_text">Comment text</label>
  <textarea name="text" id="id_text" rows="3" required></textarea>
  <button type="submit">Send</button>
</form>"#,
        post_id
    )
}

pub fn follow_button(viewer: Option<&User>, author: &User, following: bool) -> String {
    match viewer {
        Some(user) if user.id != author.id => {
            let (action, label) = if following {
                ("unfollow", "Unfollow")
            } else {
                ("follow", "Follow")
            };
            format!(
                r#"<a class="button" href="/profile/{}/{}/">{}</a>"#,
                attr(&urlencoding::encode(&author.username)),
                action,
                label
            )
        }
        _ => String::new(),
    }
}

pub fn group_options(groups: &[Group], selected: Option<i64>) -> String {
    let mut options = vec![r#"<option value="">---------</option>"#.to_string()];
    options.extend(groups.iter().map(|group| {
        format!(
            r#"<option value="{}"{}>{}</option>"#,
            group.id,
            if selected == Some(group.id) { " selected" } else { "" },
            escape(&group.title)
        )
    }));
    options.join("\n")
}

pub fn current_image(image: Option<&str>) -> String {
    match image {
        Some(path) => format!(
            r#"<p class="current-image">Currently: <a href="/media/{0}">{0}</a>
  <label><input type="checkbox" name="image-clear" value="on"> Clear</label></p>"#,
            attr(path)
        ),
        None => String::new(),
    }
}

pub fn error_block(message: &str) -> String {
    format!(r#"<ul class="errorlist"><li>{}</li></ul>"#, escape(message))
}

pub fn field_errors(errors: &FormErrors, field: &str) -> String {
    errors.get(field).map(error_block).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitution_is_single_pass() {
        let out = substitute(
            "<p>{{ first }}</p><p>{{second}}</p>{{missing}}",
            &[("first", "{{second}}".to_string()), ("second", "two".to_string())],
        );
        assert_eq!(out, "<p>{{second}}</p><p>two</p>");
    }

    #[test]
    fn pages_name_their_template() {
        let html = render("about/tech.html", "Technologies", None, &[]).unwrap();
        assert!(html.contains(r#"data-template="about/tech.html""#));
        assert!(html.contains("Log in"));
    }

    #[test]
    fn error_pages_render() {
        let html = render_error("core/404.html", StatusCode::NOT_FOUND).unwrap();
        assert!(html.contains(r#"data-template="core/404.html""#));
        assert!(html.contains("404"));
    }

    #[test]
    fn pagination_links_only_when_needed() {
        let single: Page<()> = Page { items: vec![], number: 1, num_pages: 1, total: 0 };
        assert!(paginator_nav(&single, "/").is_empty());

        let middle: Page<()> = Page { items: vec![], number: 2, num_pages: 3, total: 25 };
        let nav = paginator_nav(&middle, "/follow/");
        assert!(nav.contains(r#"href="/follow/?page=1""#));
        assert!(nav.contains(r#"href="/follow/?page=3""#));
        assert!(nav.contains("Page 2 of 3"));
    }

    #[test]
    fn attribute_values_cannot_close_the_quote() {
        let value = attr(r#"" autofocus onfocus="alert(1)"#);
        assert!(!value.contains('"'));
        assert!(value.contains("&quot;"));
    }

    #[test]
    fn user_text_is_escaped() {
        let post = PostView {
            id: 7,
            text: "<script>x</script>".to_string(),
            pub_date: Utc::now(),
            image: None,
            author_id: 1,
            author_username: "ann".to_string(),
            group_id: None,
            group_title: None,
            group_slug: None,
        };
        let card = post_card(&post);
        assert!(!card.contains("<script>"));
        assert!(card.contains(r#"href="/posts/7/""#));
    }
}
