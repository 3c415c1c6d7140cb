// Trait abstraction over the catalog store so the collection pipeline can
// run deterministically in tests against an in-memory implementation — no
// network, no database, no Docker.

use async_trait::async_trait;

use techfeed_catalog::{ChunkReport, PgCatalog};
use techfeed_common::{StagedBatch, TechBlogKey};

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Publisher roster, loaded once per fetch job.
    async fn list_tech_blogs(&self) -> anyhow::Result<Vec<TechBlogKey>>;

    /// Initialization guard read: has this publisher been populated before?
    async fn has_posts(&self, tech_blog_id: i64) -> anyhow::Result<bool>;

    /// Persist one drained chunk atomically. An error means the whole chunk
    /// rolled back.
    async fn write_chunk(&self, batches: &[StagedBatch]) -> anyhow::Result<ChunkReport>;
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn list_tech_blogs(&self) -> anyhow::Result<Vec<TechBlogKey>> {
        Ok(PgCatalog::list_tech_blogs(self).await?)
    }

    async fn has_posts(&self, tech_blog_id: i64) -> anyhow::Result<bool> {
        Ok(PgCatalog::has_posts(self, tech_blog_id).await?)
    }

    async fn write_chunk(&self, batches: &[StagedBatch]) -> anyhow::Result<ChunkReport> {
        Ok(PgCatalog::write_chunk(self, batches).await?)
    }
}
