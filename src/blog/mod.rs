pub mod categories;
pub mod domain;
pub mod query;
pub mod reactions;
pub mod repository;
pub mod service;
pub mod slug;
pub mod tags;
pub mod validation;

pub use categories::{CategoryRepository, DynCategoryRepository, SqliteCategoryRepository};
pub use domain::{CategoryId, CommentId, Post, PostId, Requester, UserId};
pub use repository::{DynPostRepository, PostRepository, SqlitePostRepository};
pub use service::{PostPage, PostService};
