// Post use cases: validation, slug derivation and authorization happen here,
// before anything reaches the repositories.
use chrono::Utc;

use crate::blog::categories::DynCategoryRepository;
use crate::blog::domain::*;
use crate::blog::query::{ListParams, Page, PostFilter, SEARCH_CAP};
use crate::blog::reactions::Emoji;
use crate::blog::repository::DynPostRepository;
use crate::blog::slug::slugify;
use crate::blog::validation::{validate_comment, validate_new_post, validate_post_update};
use crate::error::{AppError, AppResult};
use crate::uploads::{ImageStore, ImageUpload};

/// One page of a post listing.
#[derive(Debug, Clone)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub total: u64,
    pub page: Page,
}

impl PostPage {
    pub fn pages(&self) -> u64 {
        self.page.page_count(self.total)
    }
}

#[derive(Clone)]
pub struct PostService {
    posts: DynPostRepository,
    categories: DynCategoryRepository,
    images: ImageStore,
}

fn post_not_found() -> AppError {
    AppError::NotFound("Post not found".into())
}

impl PostService {
    pub fn new(
        posts: DynPostRepository,
        categories: DynCategoryRepository,
        images: ImageStore,
    ) -> Self {
        Self {
            posts,
            categories,
            images,
        }
    }

    pub async fn list(&self, params: &ListParams) -> AppResult<PostPage> {
        let page = Page::from_params(params.page.as_deref(), params.limit.as_deref());

        let mut filter = PostFilter::default();
        if let Some(slug) = params.category.as_deref().filter(|s| !s.trim().is_empty()) {
            // An unknown category leaves the listing unfiltered
            match self.categories.find(slug.trim()).await? {
                Some(category) => filter.category_id = Some(category.id),
                None => tracing::debug!(category = slug, "unknown category filter ignored"),
            }
        }
        filter.search = params
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);

        let (posts, total) = self.posts.list(&filter, page).await?;
        Ok(PostPage { posts, total, page })
    }

    /// Fetch a post for reading; counts as a view.
    pub async fn view(&self, id_or_slug: &str) -> AppResult<Post> {
        let mut post = self
            .posts
            .find(id_or_slug)
            .await?
            .ok_or_else(post_not_found)?;

        self.posts.increment_view_count(&post.id).await?;
        post.view_count += 1;
        Ok(post)
    }

    pub async fn search(&self, q: Option<&str>) -> AppResult<Vec<Post>> {
        let term = q
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| AppError::BadRequest("Please provide a search query".into()))?;

        Ok(self.posts.search(term, SEARCH_CAP).await?)
    }

    pub async fn create(
        &self,
        requester: &Requester,
        input: PostInput,
        image: Option<ImageUpload>,
    ) -> AppResult<Post> {
        let valid = validate_new_post(input).map_err(AppError::Validation)?;
        let category = self.resolve_category(&valid.category).await?;
        if let Some(upload) = &image {
            self.images.check(upload)?;
        }

        let featured_image = match &image {
            Some(upload) => self.images.save(upload).await?,
            None => valid
                .featured_image
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FEATURED_IMAGE.to_string()),
        };

        let post = NewPost {
            id: PostId::generate(),
            slug: slugify(&valid.title),
            title: valid.title,
            content: valid.content,
            excerpt: valid.excerpt,
            author_id: requester.id.clone(),
            category_id: category,
            tags: dedupe_tags(valid.tags),
            is_published: valid.is_published,
            featured_image,
            created_at: Utc::now(),
        };

        if let Err(e) = self.posts.insert(&post).await {
            if image.is_some() {
                self.images.discard(&post.featured_image).await;
            }
            return Err(e.into());
        }

        tracing::info!(post_id = %post.id, author = %requester.id, "post created");
        self.posts
            .find_by_id(&post.id)
            .await?
            .ok_or_else(post_not_found)
    }

    pub async fn update(
        &self,
        requester: &Requester,
        id: &PostId,
        input: PostInput,
        image: Option<ImageUpload>,
    ) -> AppResult<Post> {
        let existing = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or_else(post_not_found)?;

        if !existing.can_be_modified_by(requester) {
            return Err(AppError::Forbidden(
                "Not authorized to update this post".into(),
            ));
        }

        let input = validate_post_update(input).map_err(AppError::Validation)?;
        let category_id = match &input.category {
            Some(key) => Some(self.resolve_category(key).await?),
            None => None,
        };
        if let Some(upload) = &image {
            self.images.check(upload)?;
        }

        let stored_image = match &image {
            Some(upload) => Some(self.images.save(upload).await?),
            None => None,
        };

        let changes = PostChanges {
            // The slug always follows the title
            slug: input.title.as_deref().map(slugify),
            title: input.title,
            content: input.content,
            excerpt: input.excerpt,
            category_id,
            tags: input.tags.map(dedupe_tags),
            is_published: input.is_published,
            featured_image: stored_image.clone().or(input.featured_image),
        };

        if let Err(e) = self.posts.update(id, &changes, Utc::now()).await {
            if let Some(name) = &stored_image {
                self.images.discard(name).await;
            }
            return Err(e.into());
        }

        // The replaced upload is unreferenced now
        if stored_image.is_some() && self.images.owns(&existing.featured_image) {
            self.images.discard(&existing.featured_image).await;
        }

        tracing::info!(post_id = %id, by = %requester.id, "post updated");
        self.posts.find_by_id(id).await?.ok_or_else(post_not_found)
    }

    pub async fn delete(&self, requester: &Requester, id: &PostId) -> AppResult<()> {
        let existing = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or_else(post_not_found)?;

        if !existing.can_be_modified_by(requester) {
            return Err(AppError::Forbidden(
                "Not authorized to delete this post".into(),
            ));
        }

        if !self.posts.delete(id).await? {
            return Err(post_not_found());
        }
        tracing::info!(post_id = %id, by = %requester.id, "post deleted");
        Ok(())
    }

    pub async fn add_comment(
        &self,
        requester: &Requester,
        post_id: &PostId,
        content: Option<String>,
    ) -> AppResult<Post> {
        let content = validate_comment(content).map_err(AppError::Validation)?;

        let comment = NewComment {
            id: CommentId::generate(),
            author_id: Some(requester.id.clone()),
            content,
            created_at: Utc::now(),
        };
        self.posts.append_comment(post_id, &comment).await?;

        self.posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(post_not_found)
    }

    pub async fn react(
        &self,
        requester: &Requester,
        post_id: &PostId,
        comment_id: &CommentId,
        emoji: Option<&str>,
    ) -> AppResult<Post> {
        let raw = emoji
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Please provide an emoji".into()))?;
        let emoji: Emoji = raw
            .parse()
            .map_err(|e: crate::blog::reactions::UnsupportedEmoji| {
                AppError::BadRequest(e.to_string())
            })?;

        let outcome = self
            .posts
            .apply_reaction(post_id, comment_id, &requester.id, emoji, Utc::now())
            .await?;
        tracing::debug!(comment_id = %comment_id, user = %requester.id, ?outcome, "reaction applied");

        self.posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(post_not_found)
    }

    /// Accepts a category id or slug.
    async fn resolve_category(&self, key: &str) -> AppResult<CategoryId> {
        self.categories
            .find(key)
            .await?
            .map(|c| c.id)
            .ok_or_else(|| AppError::NotFound("Category not found".into()))
    }
}
