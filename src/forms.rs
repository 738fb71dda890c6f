use std::collections::BTreeMap;

use actix_multipart::Multipart;
use futures_util::StreamExt;
use serde::Deserialize;

use crate::config::{MAX_USERNAME_LENGTH, MIN_PASSWORD_LENGTH, MIN_USERNAME_LENGTH};
use crate::core::errors::{ApiError, ApiResult};
use crate::media::{detect_image, ImageUpload};
use crate::models::models::{Group, Post};

const REQUIRED: &str = "This field is required.";
const INVALID_GROUP: &str =
    "Select a valid choice. That choice is not one of the available choices.";
const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Field name to message; rendered next to the offending input.
#[derive(Debug, Default, Clone)]
pub struct FormErrors(BTreeMap<&'static str, String>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Raw values of the post form, kept as typed so they can be redisplayed.
#[derive(Debug, Default, Clone)]
pub struct PostFormData {
    pub text: String,
    pub group: String,
    /// Bytes of a non-empty upload.
    pub image: Option<Vec<u8>>,
    pub clear_image: bool,
}

#[derive(Debug)]
pub struct ValidPost {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<ImageUpload>,
    pub clear_image: bool,
}

impl PostFormData {
    pub fn from_post(post: &Post) -> Self {
        Self {
            text: post.text.clone(),
            group: post.group_id.map(|id| id.to_string()).unwrap_or_default(),
            image: None,
            clear_image: false,
        }
    }

    pub fn validate(&self, groups: &[Group]) -> Result<ValidPost, FormErrors> {
        let mut errors = FormErrors::default();

        if self.text.trim().is_empty() {
            errors.add("text", REQUIRED);
        }

        let group_id = match self.group.trim() {
            "" => None,
            raw => match raw.parse::<i64>() {
                Ok(id) if groups.iter().any(|g| g.id == id) => Some(id),
                _ => {
                    errors.add("group", INVALID_GROUP);
                    None
                }
            },
        };

        let image = match &self.image {
            Some(bytes) => match detect_image(bytes) {
                Some(extension) => Some(ImageUpload {
                    extension,
                    bytes: bytes.clone(),
                }),
                None => {
                    errors.add("image", INVALID_IMAGE);
                    None
                }
            },
            None => None,
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidPost {
            text: self.text.clone(),
            group_id,
            image,
            clear_image: self.clear_image,
        })
    }
}

/// Reads the `multipart/form-data` body of the post form.
///
/// A file input left empty by the browser arrives as a part with no bytes
/// and is treated as "no upload".
pub async fn read_post_form(
    mut payload: Multipart,
    max_upload_bytes: usize,
) -> ApiResult<PostFormData> {
    let mut form = PostFormData::default();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(invalid_body)?;

        let name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .unwrap_or_default()
            .to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(invalid_body)?;
            if bytes.len() + chunk.len() > max_upload_bytes {
                return Err(ApiError::BadRequest(format!(
                    "upload exceeds {} bytes",
                    max_upload_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        match name.as_str() {
            "text" => form.text = String::from_utf8_lossy(&bytes).into_owned(),
            "group" => form.group = String::from_utf8_lossy(&bytes).into_owned(),
            "image-clear" => form.clear_image = !bytes.is_empty(),
            "image" if !bytes.is_empty() => form.image = Some(bytes),
            _ => {}
        }
    }

    Ok(form)
}

fn invalid_body(err: actix_multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("invalid multipart body: {}", err))
}

/// Query string of listing pages and the login page.
///
/// `page` stays a string so the paginator decides what a bad value means.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn cleaned_text(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

impl SignupForm {
    /// Checks everything except uniqueness, which needs the database.
    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        let username = self.username.trim();

        if username.is_empty() {
            errors.add("username", REQUIRED);
        } else if username.chars().count() < MIN_USERNAME_LENGTH
            || username.chars().count() > MAX_USERNAME_LENGTH
        {
            errors.add(
                "username",
                format!(
                    "Username must be {}-{} characters.",
                    MIN_USERNAME_LENGTH, MAX_USERNAME_LENGTH
                ),
            );
        } else if !is_valid_username(username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, \
                 and @/./+/-/_ characters.",
            );
        }

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        } else if self.password1.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add(
                "password1",
                format!(
                    "This password is too short. It must contain at least {} characters.",
                    MIN_PASSWORD_LENGTH
                ),
            );
        }

        if self.password2 != self.password1 {
            errors.add("password2", "The two password fields didn't match.");
        }

        errors
    }
}

fn username_regex() -> &'static regex::Regex {
    static REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    REGEX.get_or_init(|| regex::Regex::new(r"^[\w.@+-]+$").expect("Regex should compile"))
}

pub fn is_valid_username(username: &str) -> bool {
    username_regex().is_match(username)
}
