// Repository pattern - isolates all post storage side effects
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::blog::domain::*;
use crate::blog::query::{Page, PostFilter};
use crate::blog::reactions::{apply_reaction, Emoji, Reaction, ReactionOutcome};
use crate::db::{is_foreign_key_violation, is_unique_violation};
use crate::state::DbPool;

pub const DUPLICATE_TITLE: &str =
    "You already have a post with this title. Please use a different title.";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Repository trait - all post, comment and reaction storage
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// One page of posts matching `filter`, newest first, plus the total match count
    async fn list(&self, filter: &PostFilter, page: Page)
        -> Result<(Vec<Post>, u64), RepositoryError>;

    /// Newest posts matching a free-text term, at most `cap` of them
    async fn search(&self, term: &str, cap: u32) -> Result<Vec<Post>, RepositoryError>;

    /// Look up by id, falling back to slug (newest post wins on a shared slug)
    async fn find(&self, id_or_slug: &str) -> Result<Option<Post>, RepositoryError>;

    async fn find_by_id(&self, id: &PostId) -> Result<Option<Post>, RepositoryError>;

    /// Atomic counter bump; no read-modify-write
    async fn increment_view_count(&self, id: &PostId) -> Result<(), RepositoryError>;

    /// Fails with `Conflict` when the author already owns the slug
    async fn insert(&self, post: &NewPost) -> Result<(), RepositoryError>;

    async fn update(
        &self,
        id: &PostId,
        changes: &PostChanges,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Returns false when nothing was deleted
    async fn delete(&self, id: &PostId) -> Result<bool, RepositoryError>;

    async fn append_comment(
        &self,
        post_id: &PostId,
        comment: &NewComment,
    ) -> Result<(), RepositoryError>;

    /// Run the reaction rules against the stored set and write the result,
    /// all inside one write transaction
    async fn apply_reaction(
        &self,
        post_id: &PostId,
        comment_id: &CommentId,
        user_id: &UserId,
        emoji: Emoji,
        at: DateTime<Utc>,
    ) -> Result<ReactionOutcome, RepositoryError>;
}

/// Type alias for Arc-wrapped repository (for AppState)
pub type DynPostRepository = Arc<dyn PostRepository>;

/// SQLite implementation
pub struct SqlitePostRepository {
    pool: DbPool,
}

impl SqlitePostRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn emoji_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Emoji> {
    let raw: String = row.get(idx)?;
    raw.parse::<Emoji>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn tags_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const POST_COLUMNS: &str = "p.id, p.title, p.slug, p.content, p.excerpt,
        p.author_id, u.username, p.category_id, c.name, c.slug,
        p.tags, p.is_published, p.view_count, p.featured_image,
        p.created_at, p.updated_at
     FROM posts p
     JOIN users u ON u.id = p.author_id
     JOIN categories c ON c.id = p.category_id";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: PostId(row.get(0)?),
        title: row.get(1)?,
        slug: row.get(2)?,
        content: row.get(3)?,
        excerpt: row.get(4)?,
        author: AuthorRef {
            id: UserId(row.get(5)?),
            username: row.get(6)?,
        },
        category: CategoryRef {
            id: CategoryId(row.get(7)?),
            name: row.get(8)?,
            slug: row.get(9)?,
        },
        tags: tags_column(row, 10)?,
        is_published: row.get(11)?,
        view_count: row.get(12)?,
        featured_image: row.get(13)?,
        comments: Vec::new(),
        created_at: timestamp_column(row, 14)?,
        updated_at: timestamp_column(row, 15)?,
    })
}

/// Fill in the comment sequence, each with its reactions in arrival order.
fn load_comments(conn: &Connection, post: &mut Post) -> Result<(), RepositoryError> {
    let mut reactions: HashMap<String, Vec<Reaction>> = HashMap::new();
    {
        let mut stmt = conn.prepare(
            "SELECT r.comment_id, r.user_id, r.emoji
             FROM comment_reactions r
             JOIN comments c ON c.id = r.comment_id
             WHERE c.post_id = ?1
             ORDER BY r.created_at ASC, r.rowid ASC",
        )?;
        let rows = stmt.query_map(params![post.id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                Reaction::new(UserId(row.get(1)?), emoji_column(row, 2)?),
            ))
        })?;
        for row in rows {
            let (comment_id, reaction) = row?;
            reactions.entry(comment_id).or_default().push(reaction);
        }
    }

    let mut stmt = conn.prepare(
        "SELECT c.id, c.user_id, u.username, c.content, c.created_at
         FROM comments c
         LEFT JOIN users u ON u.id = c.user_id
         WHERE c.post_id = ?1
         ORDER BY c.created_at ASC, c.rowid ASC",
    )?;
    post.comments = stmt
        .query_map(params![post.id.as_str()], |row| {
            let author = match (
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
            ) {
                (Some(id), Some(username)) => Some(AuthorRef {
                    id: UserId(id),
                    username,
                }),
                _ => None,
            };
            Ok(Comment {
                id: CommentId(row.get(0)?),
                author,
                content: row.get(3)?,
                reactions: Vec::new(),
                created_at: timestamp_column(row, 4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for comment in &mut post.comments {
        if let Some(list) = reactions.remove(comment.id.as_str()) {
            comment.reactions = list;
        }
    }

    Ok(())
}

fn select_posts(
    conn: &Connection,
    filter: &PostFilter,
    limit: Option<u64>,
    offset: u64,
) -> Result<Vec<Post>, RepositoryError> {
    // An offset past i64 is past every row
    let Ok(offset) = i64::try_from(offset) else {
        return Ok(Vec::new());
    };
    let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(-1));

    let (clause, values) = filter.to_sql();
    let mut bound: Vec<Value> = values.into_iter().map(Value::Text).collect();
    // SQLite treats a negative LIMIT as "no limit"
    bound.push(Value::Integer(limit));
    bound.push(Value::Integer(offset));

    let sql = format!(
        "SELECT {POST_COLUMNS}
         WHERE {clause}
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ?{} OFFSET ?{}",
        bound.len() - 1,
        bound.len()
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut posts = stmt
        .query_map(params_from_iter(bound.iter()), post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    for post in &mut posts {
        load_comments(conn, post)?;
    }
    Ok(posts)
}

fn count_posts(conn: &Connection, filter: &PostFilter) -> Result<u64, RepositoryError> {
    let (clause, values) = filter.to_sql();
    let sql = format!("SELECT COUNT(*) FROM posts p WHERE {clause}");
    let total: i64 = conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
    Ok(total as u64)
}

fn select_one(
    conn: &Connection,
    clause: &str,
    key: &str,
) -> Result<Option<Post>, RepositoryError> {
    let sql = format!(
        "SELECT {POST_COLUMNS}
         WHERE {clause}
         ORDER BY p.created_at DESC
         LIMIT 1"
    );
    let post = conn
        .query_row(&sql, params![key], post_from_row)
        .optional()?;

    match post {
        Some(mut post) => {
            load_comments(conn, &mut post)?;
            Ok(Some(post))
        }
        None => Ok(None),
    }
}

fn post_exists(conn: &Connection, id: &PostId) -> Result<bool, RepositoryError> {
    Ok(conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![id.as_str()],
        |row| row.get(0),
    )?)
}

fn touch(conn: &Connection, id: &PostId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
    conn.execute(
        "UPDATE posts SET updated_at = ?2 WHERE id = ?1",
        params![id.as_str(), timestamp(at)],
    )?;
    Ok(())
}

/// Run `work` inside `BEGIN IMMEDIATE`, committing on success.
/// The write lock is taken up front so concurrent writers queue instead of
/// interleaving their reads and writes.
fn immediate<T>(
    conn: &Connection,
    work: impl FnOnce(&Connection) -> Result<T, RepositoryError>,
) -> Result<T, RepositoryError> {
    conn.execute_batch("BEGIN IMMEDIATE")?;

    match work(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(e) => {
            conn.execute_batch("ROLLBACK")?;
            Err(e)
        }
    }
}

fn map_write_error(err: rusqlite::Error) -> RepositoryError {
    if is_unique_violation(&err) {
        RepositoryError::Conflict(DUPLICATE_TITLE.to_string())
    } else if is_foreign_key_violation(&err) {
        RepositoryError::NotFound("Category not found".to_string())
    } else {
        RepositoryError::Sql(err)
    }
}

#[async_trait]
impl PostRepository for SqlitePostRepository {
    async fn list(
        &self,
        filter: &PostFilter,
        page: Page,
    ) -> Result<(Vec<Post>, u64), RepositoryError> {
        let conn = self.pool.get()?;
        let posts = select_posts(&conn, filter, Some(u64::from(page.limit)), page.skip())?;
        let total = count_posts(&conn, filter)?;
        Ok((posts, total))
    }

    async fn search(&self, term: &str, cap: u32) -> Result<Vec<Post>, RepositoryError> {
        let conn = self.pool.get()?;
        select_posts(&conn, &PostFilter::search(term), Some(u64::from(cap)), 0)
    }

    async fn find(&self, id_or_slug: &str) -> Result<Option<Post>, RepositoryError> {
        let conn = self.pool.get()?;
        match select_one(&conn, "p.id = ?1", id_or_slug)? {
            Some(post) => Ok(Some(post)),
            None => select_one(&conn, "p.slug = ?1", id_or_slug),
        }
    }

    async fn find_by_id(&self, id: &PostId) -> Result<Option<Post>, RepositoryError> {
        let conn = self.pool.get()?;
        select_one(&conn, "p.id = ?1", id.as_str())
    }

    async fn increment_view_count(&self, id: &PostId) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE posts SET view_count = view_count + 1 WHERE id = ?1",
            params![id.as_str()],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound("Post not found".into()));
        }
        Ok(())
    }

    async fn insert(&self, post: &NewPost) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let created_at = timestamp(post.created_at);

        conn.execute(
            "INSERT INTO posts (id, title, slug, content, excerpt, author_id, category_id,
                                tags, is_published, view_count, featured_image, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11, ?11)",
            params![
                post.id.as_str(),
                post.title,
                post.slug,
                post.content,
                post.excerpt,
                post.author_id.as_str(),
                post.category_id.as_str(),
                serde_json::to_string(&post.tags)?,
                post.is_published,
                post.featured_image,
                created_at,
            ],
        )
        .map_err(map_write_error)?;

        tracing::debug!(post_id = %post.id, slug = %post.slug, "post inserted");
        Ok(())
    }

    async fn update(
        &self,
        id: &PostId,
        changes: &PostChanges,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let tags = changes
            .tags
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let rows = conn
            .execute(
                "UPDATE posts SET
                   title = COALESCE(?2, title),
                   slug = COALESCE(?3, slug),
                   content = COALESCE(?4, content),
                   excerpt = COALESCE(?5, excerpt),
                   category_id = COALESCE(?6, category_id),
                   tags = COALESCE(?7, tags),
                   is_published = COALESCE(?8, is_published),
                   featured_image = COALESCE(?9, featured_image),
                   updated_at = ?10
                 WHERE id = ?1",
                params![
                    id.as_str(),
                    changes.title,
                    changes.slug,
                    changes.content,
                    changes.excerpt,
                    changes.category_id.as_ref().map(|c| c.as_str()),
                    tags,
                    changes.is_published,
                    changes.featured_image,
                    timestamp(at),
                ],
            )
            .map_err(map_write_error)?;

        if rows == 0 {
            return Err(RepositoryError::NotFound("Post not found".into()));
        }
        Ok(())
    }

    async fn delete(&self, id: &PostId) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id.as_str()])?;
        Ok(rows > 0)
    }

    async fn append_comment(
        &self,
        post_id: &PostId,
        comment: &NewComment,
    ) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;

        immediate(&conn, |conn| {
            if !post_exists(conn, post_id)? {
                return Err(RepositoryError::NotFound("Post not found".into()));
            }

            conn.execute(
                "INSERT INTO comments (id, post_id, user_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    comment.id.as_str(),
                    post_id.as_str(),
                    comment.author_id.as_ref().map(|u| u.as_str()),
                    comment.content,
                    timestamp(comment.created_at),
                ],
            )?;
            touch(conn, post_id, comment.created_at)
        })
    }

    async fn apply_reaction(
        &self,
        post_id: &PostId,
        comment_id: &CommentId,
        user_id: &UserId,
        emoji: Emoji,
        at: DateTime<Utc>,
    ) -> Result<ReactionOutcome, RepositoryError> {
        let conn = self.pool.get()?;

        immediate(&conn, |conn| {
            if !post_exists(conn, post_id)? {
                return Err(RepositoryError::NotFound("Post not found".into()));
            }

            let comment_found: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM comments WHERE id = ?1 AND post_id = ?2",
                params![comment_id.as_str(), post_id.as_str()],
                |row| row.get(0),
            )?;
            if !comment_found {
                return Err(RepositoryError::NotFound("Comment not found".into()));
            }

            let current = {
                let mut stmt = conn.prepare(
                    "SELECT user_id, emoji FROM comment_reactions
                     WHERE comment_id = ?1
                     ORDER BY created_at ASC, rowid ASC",
                )?;
                let rows = stmt.query_map(params![comment_id.as_str()], |row| {
                    Ok(Reaction::new(UserId(row.get(0)?), emoji_column(row, 1)?))
                })?;
                rows.collect::<Result<Vec<_>, _>>()?
            };

            let (_, outcome) = apply_reaction(&current, user_id, emoji);

            match outcome {
                ReactionOutcome::Removed(held) => {
                    conn.execute(
                        "DELETE FROM comment_reactions
                         WHERE comment_id = ?1 AND user_id = ?2 AND emoji = ?3",
                        params![comment_id.as_str(), user_id.as_str(), held.as_str()],
                    )?;
                }
                ReactionOutcome::Added(chosen) | ReactionOutcome::Switched { to: chosen, .. } => {
                    // A switch re-appends, matching the rule engine's ordering
                    conn.execute(
                        "DELETE FROM comment_reactions WHERE comment_id = ?1 AND user_id = ?2",
                        params![comment_id.as_str(), user_id.as_str()],
                    )?;
                    conn.execute(
                        "INSERT INTO comment_reactions (comment_id, user_id, emoji, created_at)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![
                            comment_id.as_str(),
                            user_id.as_str(),
                            chosen.as_str(),
                            timestamp(at)
                        ],
                    )?;
                }
            }

            touch(conn, post_id, at)?;
            Ok(outcome)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::slug::slugify;
    use crate::db;
    use chrono::Duration;
    use tempfile::TempDir;

    fn create_test_repo() -> (SqlitePostRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let pool = db::create_pool(&db_path).unwrap();
        db::run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO users (id, username, email, password_hash, created_at) VALUES
                ('ada', 'ada', 'ada@example.com', 'x', '2025-01-01T00:00:00.000000Z'),
                ('bob', 'bob', 'bob@example.com', 'x', '2025-01-01T00:00:00.000000Z');
             INSERT INTO categories (id, name, slug, created_at) VALUES
                ('travel', 'Travel', 'travel', '2025-01-01T00:00:00.000000Z'),
                ('food', 'Food', 'food', '2025-01-01T00:00:00.000000Z');",
        )
        .unwrap();

        (SqlitePostRepository::new(pool), temp_dir)
    }

    fn new_post(author: &str, title: &str, at: DateTime<Utc>) -> NewPost {
        NewPost {
            id: PostId::generate(),
            title: title.to_string(),
            slug: slugify(title),
            content: format!("Body of {}", title),
            excerpt: String::new(),
            author_id: UserId::new(author),
            category_id: CategoryId::new("travel"),
            tags: vec!["notes".into()],
            is_published: true,
            featured_image: DEFAULT_FEATURED_IMAGE.into(),
            created_at: at,
        }
    }

    fn new_comment(author: &str, at: DateTime<Utc>) -> NewComment {
        NewComment {
            id: CommentId::generate(),
            author_id: Some(UserId::new(author)),
            content: "Nice".into(),
            created_at: at,
        }
    }

    #[tokio::test]
    async fn insert_and_find_by_id_and_slug() {
        let (repo, _temp) = create_test_repo();
        let post = new_post("ada", "Hello, World!", Utc::now());
        repo.insert(&post).await.unwrap();

        let by_id = repo.find(post.id.as_str()).await.unwrap().unwrap();
        assert_eq!(by_id.slug, "hello-world");
        assert_eq!(by_id.author.username, "ada");
        assert_eq!(by_id.category.slug, "travel");
        assert_eq!(by_id.tags, vec!["notes"]);

        let by_slug = repo.find("hello-world").await.unwrap().unwrap();
        assert_eq!(by_slug.id, post.id);

        assert!(repo.find("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn same_slug_same_author_conflicts() {
        let (repo, _temp) = create_test_repo();
        repo.insert(&new_post("ada", "Trip", Utc::now()))
            .await
            .unwrap();

        let err = repo
            .insert(&new_post("ada", "Trip", Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(msg) if msg == DUPLICATE_TITLE));
    }

    #[tokio::test]
    async fn same_slug_different_authors_allowed() {
        let (repo, _temp) = create_test_repo();
        repo.insert(&new_post("ada", "Trip", Utc::now()))
            .await
            .unwrap();
        repo.insert(&new_post("bob", "Trip", Utc::now()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_to_taken_slug_conflicts() {
        let (repo, _temp) = create_test_repo();
        repo.insert(&new_post("ada", "First", Utc::now()))
            .await
            .unwrap();
        let second = new_post("ada", "Second", Utc::now());
        repo.insert(&second).await.unwrap();

        let changes = PostChanges {
            title: Some("First".into()),
            slug: Some("first".into()),
            ..Default::default()
        };
        let err = repo
            .update(&second.id, &changes, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_only_touches_supplied_columns() {
        let (repo, _temp) = create_test_repo();
        let post = new_post("ada", "Draft", Utc::now());
        repo.insert(&post).await.unwrap();

        let changes = PostChanges {
            is_published: Some(false),
            tags: Some(vec!["a".into(), "b".into()]),
            category_id: Some(CategoryId::new("food")),
            ..Default::default()
        };
        repo.update(&post.id, &changes, Utc::now()).await.unwrap();

        let loaded = repo.find_by_id(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Draft");
        assert_eq!(loaded.content, post.content);
        assert!(!loaded.is_published);
        assert_eq!(loaded.tags, vec!["a", "b"]);
        assert_eq!(loaded.category.name, "Food");
    }

    #[tokio::test]
    async fn update_missing_post_is_not_found() {
        let (repo, _temp) = create_test_repo();
        let err = repo
            .update(&PostId::new("nope"), &PostChanges::default(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn view_count_increments() {
        let (repo, _temp) = create_test_repo();
        let post = new_post("ada", "Seen", Utc::now());
        repo.insert(&post).await.unwrap();

        repo.increment_view_count(&post.id).await.unwrap();
        repo.increment_view_count(&post.id).await.unwrap();

        let loaded = repo.find_by_id(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.view_count, 2);
    }

    #[tokio::test]
    async fn pagination_third_page_of_twenty_five() {
        let (repo, _temp) = create_test_repo();
        let start = Utc::now() - Duration::hours(1);
        for i in 0..25 {
            let post = new_post("ada", &format!("Post {}", i), start + Duration::seconds(i));
            repo.insert(&post).await.unwrap();
        }

        let page = Page::from_params(Some("3"), Some("10"));
        let (posts, total) = repo.list(&PostFilter::default(), page).await.unwrap();
        assert_eq!(total, 25);
        assert_eq!(posts.len(), 5);
        assert_eq!(page.page_count(total), 3);
        // Newest first: page three holds the five oldest
        assert_eq!(posts[0].title, "Post 4");
        assert_eq!(posts[4].title, "Post 0");
    }

    #[tokio::test]
    async fn list_filters_by_category() {
        let (repo, _temp) = create_test_repo();
        repo.insert(&new_post("ada", "Trip", Utc::now()))
            .await
            .unwrap();
        let mut food = new_post("ada", "Jollof", Utc::now());
        food.category_id = CategoryId::new("food");
        repo.insert(&food).await.unwrap();

        let filter = PostFilter {
            category_id: Some(CategoryId::new("food")),
            search: None,
        };
        let (posts, total) = repo.list(&filter, Page::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(posts[0].title, "Jollof");
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring() {
        let (repo, _temp) = create_test_repo();
        let mut lagos = new_post("ada", "City notes", Utc::now());
        lagos.content = "A weekend in Lagos".into();
        repo.insert(&lagos).await.unwrap();
        let mut other = new_post("ada", "Mountains", Utc::now());
        other.content = "Snow".into();
        repo.insert(&other).await.unwrap();

        let found = repo.search("lagos", 20).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, lagos.id);
    }

    #[tokio::test]
    async fn page_beyond_addressable_offset_is_empty() {
        let (repo, _temp) = create_test_repo();
        repo.insert(&new_post("ada", "Only", Utc::now()))
            .await
            .unwrap();

        let page = Page::from_params(Some("4294967295"), Some("4294967295"));
        let (posts, total) = repo.list(&PostFilter::default(), page).await.unwrap();
        assert_eq!(total, 1);
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn search_folds_non_ascii_case() {
        let (repo, _temp) = create_test_repo();
        let mut post = new_post("ada", "Pastry", Utc::now());
        post.content = "An ÉCLAIR in Paris".into();
        repo.insert(&post).await.unwrap();

        let found = repo.search("éclair", 20).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, post.id);

        let filter = PostFilter::search("ÉCLAIR IN");
        let (posts, total) = repo.list(&filter, Page::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(posts.len(), 1);
    }

    #[tokio::test]
    async fn search_matches_excerpt_and_treats_wildcards_literally() {
        let (repo, _temp) = create_test_repo();
        let mut post = new_post("ada", "Deals", Utc::now());
        post.excerpt = "Everything 50% off".into();
        repo.insert(&post).await.unwrap();

        assert_eq!(repo.search("50% OFF", 20).await.unwrap().len(), 1);
        assert!(repo.search("5_%", 20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_is_capped() {
        let (repo, _temp) = create_test_repo();
        for i in 0..5 {
            repo.insert(&new_post("ada", &format!("Lagos {}", i), Utc::now()))
                .await
                .unwrap();
        }
        assert_eq!(repo.search("lagos", 3).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn comments_append_in_order() {
        let (repo, _temp) = create_test_repo();
        let post = new_post("ada", "Talk", Utc::now());
        repo.insert(&post).await.unwrap();

        let now = Utc::now();
        let first = new_comment("bob", now);
        let second = new_comment("ada", now + Duration::seconds(1));
        repo.append_comment(&post.id, &first).await.unwrap();
        repo.append_comment(&post.id, &second).await.unwrap();

        let loaded = repo.find_by_id(&post.id).await.unwrap().unwrap();
        let ids: Vec<_> = loaded.comments.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(loaded.comments[0].display_name(), "bob");
    }

    #[tokio::test]
    async fn comment_on_missing_post_is_not_found() {
        let (repo, _temp) = create_test_repo();
        let err = repo
            .append_comment(&PostId::new("nope"), &new_comment("bob", Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(msg) if msg == "Post not found"));
    }

    #[tokio::test]
    async fn reaction_add_toggle_switch_persist() {
        let (repo, _temp) = create_test_repo();
        let post = new_post("ada", "React", Utc::now());
        repo.insert(&post).await.unwrap();
        let comment = new_comment("bob", Utc::now());
        repo.append_comment(&post.id, &comment).await.unwrap();
        let ada = UserId::new("ada");

        let outcome = repo
            .apply_reaction(&post.id, &comment.id, &ada, Emoji::ThumbsUp, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, ReactionOutcome::Added(Emoji::ThumbsUp));

        let outcome = repo
            .apply_reaction(&post.id, &comment.id, &ada, Emoji::Heart, Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, ReactionOutcome::Switched { .. }));
        let loaded = repo.find_by_id(&post.id).await.unwrap().unwrap();
        assert_eq!(
            loaded.comments[0].reactions,
            vec![Reaction::new(ada.clone(), Emoji::Heart)]
        );

        let outcome = repo
            .apply_reaction(&post.id, &comment.id, &ada, Emoji::Heart, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, ReactionOutcome::Removed(Emoji::Heart));
        let loaded = repo.find_by_id(&post.id).await.unwrap().unwrap();
        assert!(loaded.comments[0].reactions.is_empty());
    }

    #[tokio::test]
    async fn reactions_from_several_users_coexist() {
        let (repo, _temp) = create_test_repo();
        let post = new_post("ada", "Crowd", Utc::now());
        repo.insert(&post).await.unwrap();
        let comment = new_comment("ada", Utc::now());
        repo.append_comment(&post.id, &comment).await.unwrap();

        for user in ["ada", "bob"] {
            repo.apply_reaction(
                &post.id,
                &comment.id,
                &UserId::new(user),
                Emoji::Party,
                Utc::now(),
            )
            .await
            .unwrap();
        }

        let loaded = repo.find_by_id(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.comments[0].reactions.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reactions_all_persist() {
        const USERS: usize = 24;

        let (repo, _temp) = create_test_repo();
        {
            let conn = repo.pool.get().unwrap();
            for i in 0..USERS {
                conn.execute(
                    "INSERT INTO users (id, username, email, password_hash, created_at)
                     VALUES (?1, ?1, ?2, 'x', '2025-01-01T00:00:00.000000Z')",
                    params![format!("reader{i}"), format!("reader{i}@example.com")],
                )
                .unwrap();
            }
        }
        let post = new_post("ada", "Busy", Utc::now());
        repo.insert(&post).await.unwrap();
        let comment = new_comment("ada", Utc::now());
        repo.append_comment(&post.id, &comment).await.unwrap();

        let repo = Arc::new(repo);
        let tasks: Vec<_> = (0..USERS)
            .map(|i| {
                let repo = Arc::clone(&repo);
                let post_id = post.id.clone();
                let comment_id = comment.id.clone();
                tokio::spawn(async move {
                    repo.apply_reaction(
                        &post_id,
                        &comment_id,
                        &UserId::new(format!("reader{i}")),
                        Emoji::Heart,
                        Utc::now(),
                    )
                    .await
                })
            })
            .collect();

        for task in tasks {
            let outcome = task.await.unwrap().unwrap();
            assert_eq!(outcome, ReactionOutcome::Added(Emoji::Heart));
        }

        let loaded = repo.find_by_id(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.comments[0].reactions.len(), USERS);
    }

    #[tokio::test]
    async fn reaction_on_unknown_comment_is_not_found() {
        let (repo, _temp) = create_test_repo();
        let post = new_post("ada", "Quiet", Utc::now());
        repo.insert(&post).await.unwrap();

        let err = repo
            .apply_reaction(
                &post.id,
                &CommentId::new("nope"),
                &UserId::new("ada"),
                Emoji::Sad,
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(msg) if msg == "Comment not found"));
    }

    #[tokio::test]
    async fn comment_of_another_post_is_not_found() {
        let (repo, _temp) = create_test_repo();
        let a = new_post("ada", "A", Utc::now());
        let b = new_post("ada", "B", Utc::now());
        repo.insert(&a).await.unwrap();
        repo.insert(&b).await.unwrap();
        let comment = new_comment("bob", Utc::now());
        repo.append_comment(&a.id, &comment).await.unwrap();

        let err = repo
            .apply_reaction(&b.id, &comment.id, &UserId::new("bob"), Emoji::Wow, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_cascades_to_comments_and_reactions() {
        let (repo, _temp) = create_test_repo();
        let post = new_post("ada", "Gone", Utc::now());
        repo.insert(&post).await.unwrap();
        let comment = new_comment("bob", Utc::now());
        repo.append_comment(&post.id, &comment).await.unwrap();
        repo.apply_reaction(&post.id, &comment.id, &UserId::new("bob"), Emoji::Sad, Utc::now())
            .await
            .unwrap();

        assert!(repo.delete(&post.id).await.unwrap());
        assert!(!repo.delete(&post.id).await.unwrap());

        let conn = repo.pool.get().unwrap();
        let leftovers: i64 = conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM comments) + (SELECT COUNT(*) FROM comment_reactions)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(leftovers, 0);
    }
}
