// Postgres persistence for the post catalog. One transaction per drained
// chunk; a mid-chunk failure rolls back that chunk only.

use std::collections::HashMap;

use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use techfeed_common::{StagedBatch, TechBlogKey};

use crate::error::{CatalogError, Result};

/// Normalize a tag title for lookup and storage: whitespace trimmed,
/// lowercased. All tag dedup runs on this form.
pub fn normalize_tag(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Per-source insert counts from one committed chunk.
#[derive(Debug, Default)]
pub struct ChunkReport {
    pub added_by_source: HashMap<String, u32>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TechBlogRow {
    id: i64,
    key: String,
    title: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TagRow {
    id: i64,
    title: String,
}

pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// All registered publishers. Loaded once at fetch-job start.
    pub async fn list_tech_blogs(&self) -> Result<Vec<TechBlogKey>> {
        let rows = sqlx::query_as::<_, TechBlogRow>(
            "SELECT id, key, title FROM tech_blog ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| TechBlogKey {
                id: r.id,
                key: r.key,
                title: r.title,
            })
            .collect())
    }

    /// Initialization guard: true once any post exists for the blog.
    pub async fn has_posts(&self, tech_blog_id: i64) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM post WHERE tech_blog_id = $1)",
        )
        .bind(tech_blog_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Persist one drained chunk in a single transaction: upsert tags by
    /// normalized title, insert posts, link post tags. Returns per-source
    /// insert counts. Any error rolls the whole chunk back.
    pub async fn write_chunk(&self, batches: &[StagedBatch]) -> Result<ChunkReport> {
        let mut tx = self.pool.begin().await?;

        let tags = upsert_tags(&mut tx, batches).await?;
        let category_id = uncategorized_id(&mut tx).await?;

        let mut report = ChunkReport::default();
        for batch in batches {
            let mut added = 0u32;
            for post in &batch.posts {
                let post_id = sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO post
                        (key, title, description, thumbnail_url, source_url,
                         published_at, tech_blog_id, category_id)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    RETURNING id
                    "#,
                )
                .bind(&post.key)
                .bind(&post.title)
                .bind(&post.description)
                .bind(&post.thumbnail_url)
                .bind(&post.source_url)
                .bind(post.published_at)
                .bind(batch.tech_blog_id)
                .bind(category_id)
                .fetch_one(&mut *tx)
                .await?;

                for tag in &post.tags {
                    let normalized = normalize_tag(tag);
                    if normalized.is_empty() {
                        continue;
                    }
                    let tag_id = tags
                        .get(&normalized)
                        .copied()
                        .ok_or_else(|| CatalogError::TagUnresolved(normalized.clone()))?;
                    sqlx::query(
                        "INSERT INTO post_tag (post_id, tag_id) VALUES ($1, $2)
                         ON CONFLICT DO NOTHING",
                    )
                    .bind(post_id)
                    .bind(tag_id)
                    .execute(&mut *tx)
                    .await?;
                }

                added += 1;
            }
            *report
                .added_by_source
                .entry(batch.source.clone())
                .or_insert(0) += added;
        }

        tx.commit().await?;
        debug!(batches = batches.len(), "catalog: chunk committed");
        Ok(report)
    }
}

/// Batch-lookup existing tags by normalized title, insert only the missing
/// ones, and return the combined title→id map for this chunk.
async fn upsert_tags(
    tx: &mut Transaction<'_, Postgres>,
    batches: &[StagedBatch],
) -> Result<HashMap<String, i64>> {
    let mut titles: Vec<String> = batches
        .iter()
        .flat_map(|b| b.posts.iter())
        .flat_map(|p| p.tags.iter())
        .map(|t| normalize_tag(t))
        .filter(|t| !t.is_empty())
        .collect();
    titles.sort();
    titles.dedup();

    if titles.is_empty() {
        return Ok(HashMap::new());
    }

    let existing = sqlx::query_as::<_, TagRow>("SELECT id, title FROM tag WHERE title = ANY($1)")
        .bind(&titles)
        .fetch_all(&mut **tx)
        .await?;

    let mut map: HashMap<String, i64> =
        existing.into_iter().map(|t| (t.title, t.id)).collect();

    let missing: Vec<&String> = titles.iter().filter(|t| !map.contains_key(*t)).collect();
    for title in missing {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO tag (title) VALUES ($1) RETURNING id",
        )
        .bind(title)
        .fetch_one(&mut **tx)
        .await?;
        map.insert(title.clone(), id);
    }

    Ok(map)
}

async fn uncategorized_id(tx: &mut Transaction<'_, Postgres>) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM category WHERE title = 'uncategorized'")
        .fetch_one(&mut **tx)
        .await?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_normalization_trims_and_lowercases() {
        assert_eq!(normalize_tag("  Kotlin "), "kotlin");
        assert_eq!(normalize_tag("Spring Boot"), "spring boot");
        assert_eq!(normalize_tag("   "), "");
    }
}
