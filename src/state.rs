use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::blog::{
    DynCategoryRepository, PostService, SqliteCategoryRepository, SqlitePostRepository,
};
use crate::config::Config;
use crate::uploads::ImageStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub posts: PostService,
    pub categories: DynCategoryRepository,
    pub images: ImageStore,
}

impl AppState {
    /// Wire the SQLite repositories and image store around a migrated pool.
    pub fn new(db: DbPool, config: Config) -> Self {
        let categories: DynCategoryRepository =
            Arc::new(SqliteCategoryRepository::new(db.clone()));
        let images = ImageStore::new(config.uploads_path(), config.storage.max_image_bytes);
        let posts = PostService::new(
            Arc::new(SqlitePostRepository::new(db.clone())),
            categories.clone(),
            images.clone(),
        );

        Self {
            db,
            config,
            posts,
            categories,
            images,
        }
    }
}
