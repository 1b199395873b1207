// Input validation - every violated field is reported, nothing is mutated
use crate::blog::domain::PostInput;
use crate::error::FieldError;

pub const TITLE_MAX: usize = 100;
pub const EXCERPT_MAX: usize = 200;
pub const CATEGORY_NAME_MAX: usize = 50;
pub const DESCRIPTION_MAX: usize = 200;
pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 30;
pub const PASSWORD_MIN: usize = 6;

/// Post fields that passed create validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPost {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category: String,
    pub tags: Vec<String>,
    pub is_published: bool,
    pub featured_image: Option<String>,
}

fn too_long(value: &str, max: usize) -> bool {
    value.chars().count() > max
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn validate_new_post(input: PostInput) -> Result<ValidPost, Vec<FieldError>> {
    let mut errors = Vec::new();

    let title = non_blank(input.title);
    match &title {
        None => errors.push(FieldError::new("title", "Title is required")),
        Some(t) if too_long(t, TITLE_MAX) => errors.push(FieldError::new(
            "title",
            "Title cannot be more than 100 characters",
        )),
        Some(_) => {}
    }

    let content = input.content.filter(|c| !c.trim().is_empty());
    if content.is_none() {
        errors.push(FieldError::new("content", "Content is required"));
    }

    let excerpt = input.excerpt.unwrap_or_default();
    if too_long(&excerpt, EXCERPT_MAX) {
        errors.push(FieldError::new(
            "excerpt",
            "Excerpt cannot be more than 200 characters",
        ));
    }

    let category = non_blank(input.category);
    if category.is_none() {
        errors.push(FieldError::new("category", "Category is required"));
    }

    match (title, content, category) {
        (Some(title), Some(content), Some(category)) if errors.is_empty() => Ok(ValidPost {
            title,
            content,
            excerpt,
            category,
            tags: input.tags.unwrap_or_default(),
            is_published: input.is_published.unwrap_or(false),
            featured_image: input.featured_image,
        }),
        _ => Err(errors),
    }
}

/// Checks only the fields present; returns the input with the title trimmed.
pub fn validate_post_update(mut input: PostInput) -> Result<PostInput, Vec<FieldError>> {
    let mut errors = Vec::new();

    if let Some(title) = input.title.as_mut() {
        *title = title.trim().to_string();
        if title.is_empty() {
            errors.push(FieldError::new("title", "Title cannot be empty"));
        } else if too_long(title, TITLE_MAX) {
            errors.push(FieldError::new(
                "title",
                "Title cannot be more than 100 characters",
            ));
        }
    }

    if let Some(content) = &input.content {
        if content.trim().is_empty() {
            errors.push(FieldError::new("content", "Content cannot be empty"));
        }
    }

    if let Some(excerpt) = &input.excerpt {
        if too_long(excerpt, EXCERPT_MAX) {
            errors.push(FieldError::new(
                "excerpt",
                "Excerpt cannot be more than 200 characters",
            ));
        }
    }

    if let Some(category) = input.category.as_mut() {
        *category = category.trim().to_string();
        if category.is_empty() {
            errors.push(FieldError::new("category", "Category cannot be empty"));
        }
    }

    if errors.is_empty() {
        Ok(input)
    } else {
        Err(errors)
    }
}

pub fn validate_comment(content: Option<String>) -> Result<String, Vec<FieldError>> {
    non_blank(content).ok_or_else(|| {
        vec![FieldError::new(
            "content",
            "Comment content is required",
        )]
    })
}

/// Validated category name and description.
pub fn validate_category(
    name: Option<String>,
    description: Option<String>,
    name_required: bool,
) -> Result<(Option<String>, Option<String>), Vec<FieldError>> {
    let mut errors = Vec::new();

    let name = match name.map(|n| n.trim().to_string()) {
        Some(n) if n.is_empty() => {
            errors.push(FieldError::new("name", "Category name is required"));
            None
        }
        Some(n) if too_long(&n, CATEGORY_NAME_MAX) => {
            errors.push(FieldError::new(
                "name",
                "Category name cannot be more than 50 characters",
            ));
            None
        }
        Some(n) => Some(n),
        None => {
            if name_required {
                errors.push(FieldError::new("name", "Category name is required"));
            }
            None
        }
    };

    if let Some(d) = &description {
        if too_long(d, DESCRIPTION_MAX) {
            errors.push(FieldError::new(
                "description",
                "Description cannot be more than 200 characters",
            ));
        }
    }

    if errors.is_empty() {
        Ok((name, description))
    } else {
        Err(errors)
    }
}

pub fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

pub fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    let username_len = username.trim().chars().count();
    if username_len == 0 {
        errors.push(FieldError::new("username", "Username is required"));
    } else if username_len < USERNAME_MIN {
        errors.push(FieldError::new(
            "username",
            "Username must be at least 3 characters",
        ));
    } else if username_len > USERNAME_MAX {
        errors.push(FieldError::new(
            "username",
            "Username cannot be more than 30 characters",
        ));
    }

    let email = email.trim();
    if email.is_empty() {
        errors.push(FieldError::new("email", "Email is required"));
    } else if !is_plausible_email(email) {
        errors.push(FieldError::new("email", "Please provide a valid email"));
    }

    if password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    } else if password.chars().count() < PASSWORD_MIN {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 6 characters",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
