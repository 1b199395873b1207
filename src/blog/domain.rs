// Domain types - plain values, no storage access
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::blog::reactions::Reaction;
use crate::db::models::Role;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Fresh time-ordered identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(UserId);
string_id!(PostId);
string_id!(CommentId);
string_id!(CategoryId);

pub const DEFAULT_FEATURED_IMAGE: &str = "default-post.jpg";
pub const ANONYMOUS: &str = "Anonymous";

/// The identity a request acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: UserId,
    pub role: Role,
}

impl Requester {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorRef {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    #[serde(rename = "user")]
    pub author: Option<AuthorRef>,
    pub content: String,
    pub reactions: Vec<Reaction>,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn display_name(&self) -> &str {
        self.author
            .as_ref()
            .map(|a| a.username.as_str())
            .unwrap_or(ANONYMOUS)
    }
}

/// Snapshot of a post and everything it owns, as loaded from storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub author: AuthorRef,
    pub category: CategoryRef,
    pub tags: Vec<String>,
    pub is_published: bool,
    pub view_count: i64,
    pub featured_image: String,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Owners and admins may update or delete a post; nobody else may.
    pub fn can_be_modified_by(&self, requester: &Requester) -> bool {
        self.author.id == requester.id || requester.is_admin()
    }
}

/// Raw post fields after boundary parsing, before validation.
/// Create requires title/content/category; update treats every field as optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_published: Option<bool>,
    pub featured_image: Option<String>,
}

/// Row written on create. The slug is always derived from `title` by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub id: PostId,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub author_id: UserId,
    pub category_id: CategoryId,
    pub tags: Vec<String>,
    pub is_published: bool,
    pub featured_image: String,
    pub created_at: DateTime<Utc>,
}

/// Update command; `None` leaves the stored column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostChanges {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category_id: Option<CategoryId>,
    pub tags: Option<Vec<String>>,
    pub is_published: Option<bool>,
    pub featured_image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub id: CommentId,
    pub author_id: Option<UserId>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Drops duplicate tags, keeping the first occurrence.
pub fn dedupe_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}
