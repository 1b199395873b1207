use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

use crate::blog::domain::CategoryId;
use crate::blog::repository::{timestamp, RepositoryError};
use crate::db::models::Category;
use crate::db::{is_foreign_key_violation, is_unique_violation};
use crate::state::DbPool;

pub const CATEGORY_EXISTS: &str = "A category with this name already exists";
pub const CATEGORY_IN_USE: &str = "Cannot delete a category that still has posts";

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// All categories ordered by name
    async fn list(&self) -> Result<Vec<Category>, RepositoryError>;

    /// Look up by id, falling back to slug
    async fn find(&self, id_or_slug: &str) -> Result<Option<Category>, RepositoryError>;

    async fn insert(&self, category: &Category) -> Result<(), RepositoryError>;

    async fn update(
        &self,
        id: &CategoryId,
        name: Option<&str>,
        slug: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), RepositoryError>;

    async fn delete(&self, id: &CategoryId) -> Result<bool, RepositoryError>;
}

pub type DynCategoryRepository = Arc<dyn CategoryRepository>;

pub struct SqliteCategoryRepository {
    pool: DbPool,
}

impl SqliteCategoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: CategoryId(row.get(0)?),
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_write_error(err: rusqlite::Error) -> RepositoryError {
    if is_unique_violation(&err) {
        RepositoryError::Conflict(CATEGORY_EXISTS.to_string())
    } else if is_foreign_key_violation(&err) {
        RepositoryError::Conflict(CATEGORY_IN_USE.to_string())
    } else {
        RepositoryError::Sql(err)
    }
}

/// Build a new category value with a fresh id.
pub fn new_category(name: &str, description: &str, at: DateTime<Utc>) -> Category {
    Category {
        id: CategoryId::generate(),
        name: name.to_string(),
        slug: crate::blog::slug::slugify(name),
        description: description.to_string(),
        created_at: timestamp(at),
    }
}

#[async_trait]
impl CategoryRepository for SqliteCategoryRepository {
    async fn list(&self) -> Result<Vec<Category>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, slug, description, created_at FROM categories ORDER BY name ASC",
        )?;
        let categories = stmt
            .query_map([], category_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    async fn find(&self, id_or_slug: &str) -> Result<Option<Category>, RepositoryError> {
        let conn = self.pool.get()?;
        let category = conn
            .query_row(
                "SELECT id, name, slug, description, created_at FROM categories
                 WHERE id = ?1 OR slug = ?1
                 ORDER BY id = ?1 DESC
                 LIMIT 1",
                params![id_or_slug],
                category_from_row,
            )
            .optional()?;
        Ok(category)
    }

    async fn insert(&self, category: &Category) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO categories (id, name, slug, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                category.id.as_str(),
                category.name,
                category.slug,
                category.description,
                category.created_at,
            ],
        )
        .map_err(map_write_error)?;
        tracing::info!(category = %category.slug, "category created");
        Ok(())
    }

    async fn update(
        &self,
        id: &CategoryId,
        name: Option<&str>,
        slug: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "UPDATE categories SET
                   name = COALESCE(?2, name),
                   slug = COALESCE(?3, slug),
                   description = COALESCE(?4, description)
                 WHERE id = ?1",
                params![id.as_str(), name, slug, description],
            )
            .map_err(map_write_error)?;
        if rows == 0 {
            return Err(RepositoryError::NotFound("Category not found".into()));
        }
        Ok(())
    }

    async fn delete(&self, id: &CategoryId) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute("DELETE FROM categories WHERE id = ?1", params![id.as_str()])
            .map_err(map_write_error)?;
        Ok(rows > 0)
    }
}
