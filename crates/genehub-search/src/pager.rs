//! Explicit pagination over a prepared index query.
//!
//! Every fetch is a visible method call with an explicit offset and limit;
//! there is no index-operator sugar that silently performs I/O. The pager
//! re-runs the same query body with a shifted window, so results are only
//! stable across pages when the query carries an explicit sort (the engine
//! appends an id tie-break to any sorted query).

use futures::stream::{self, Stream, StreamExt, TryStreamExt};

use genehub_core::{Error, Hit, Result, SearchResult};

use crate::engine::IndexEngine;
use crate::query::IndexQuery;

pub struct Pager<'a> {
    engine: &'a IndexEngine,
    query: IndexQuery,
    total: Option<u64>,
}

impl<'a> Pager<'a> {
    pub fn new(engine: &'a IndexEngine, query: IndexQuery) -> Self {
        Self {
            engine,
            query,
            total: None,
        }
    }

    /// Total match count, known after the first fetch.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Fetch one window. A `limit` of 0 keeps the query's own page size.
    pub async fn fetch_page(&mut self, offset: usize, limit: usize) -> Result<SearchResult> {
        let size = if limit == 0 { self.query.size } else { limit };
        let windowed = self.query.clone().with_window(offset, size);
        let result = self.engine.execute(&windowed).await?;
        self.total = Some(result.total);
        Ok(result)
    }

    /// Fetch the single hit at an absolute position, if any.
    pub async fn hit_at(&mut self, index: usize) -> Result<Option<Hit>> {
        let page = self.fetch_page(index, 1).await?;
        Ok(page.hits.into_iter().next())
    }

    /// Fetch every matching hit, page by page.
    pub async fn fetch_all(&mut self) -> Result<Vec<Hit>> {
        let mut hits = Vec::new();
        let page_size = self.query.size.max(1);
        loop {
            let page = self.fetch_page(hits.len(), page_size).await?;
            let total = page.total as usize;
            let got = page.hit_count();
            hits.extend(page.hits);
            if got == 0 || hits.len() >= total {
                return Ok(hits);
            }
        }
    }

    /// Stream hits in order, fetching a page at a time as the stream is
    /// polled.
    pub fn stream(&self) -> impl Stream<Item = Result<Hit>> + '_ {
        let page_size = self.query.size.max(1);
        stream::try_unfold(0usize, move |offset| {
            let windowed = self.query.clone().with_window(offset, page_size);
            async move {
                let page = self.engine.execute(&windowed).await?;
                if page.hits.is_empty() {
                    // annotated so the unfold error type is pinned down
                    return Ok::<_, Error>(None);
                }
                let next = offset + page.hit_count();
                Ok(Some((page.hits, next)))
            }
        })
        .map_ok(|hits| stream::iter(hits.into_iter().map(Ok)))
        .try_flatten()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryIndex;
    use crate::query::QueryNode;
    use genehub_core::SortKey;
    use serde_json::json;
    use std::sync::Arc;

    fn engine_with_docs(n: u64) -> IndexEngine {
        let mut index = MemoryIndex::new();
        for id in 1..=n {
            index.add(json!({
                "id": id,
                "object_type": "plugin",
                "name": format!("plugin {id}"),
            }));
        }
        IndexEngine::new(Arc::new(index))
    }

    fn sorted_query(size: usize) -> IndexQuery {
        let mut q = IndexQuery::new(QueryNode::MatchAll).with_window(0, size);
        q.sort = vec![SortKey::asc("id")];
        q
    }

    #[tokio::test]
    async fn test_fetch_page_windows() {
        let engine = engine_with_docs(25);
        let mut pager = Pager::new(&engine, sorted_query(10));

        let page = pager.fetch_page(10, 10).await.unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.hit_count(), 10);
        assert_eq!(page.hits[0].id, "11");
        assert_eq!(pager.total(), Some(25));

        let last = pager.fetch_page(20, 10).await.unwrap();
        assert_eq!(last.hit_count(), 5);
    }

    #[tokio::test]
    async fn test_zero_limit_keeps_query_size() {
        let engine = engine_with_docs(25);
        let mut pager = Pager::new(&engine, sorted_query(7));
        let page = pager.fetch_page(0, 0).await.unwrap();
        assert_eq!(page.hit_count(), 7);
    }

    #[tokio::test]
    async fn test_hit_at() {
        let engine = engine_with_docs(25);
        let mut pager = Pager::new(&engine, sorted_query(10));
        let hit = pager.hit_at(24).await.unwrap().unwrap();
        assert_eq!(hit.id, "25");
        assert!(pager.hit_at(25).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_all_and_stream_agree() {
        let engine = engine_with_docs(23);
        let mut pager = Pager::new(&engine, sorted_query(10));

        let all = pager.fetch_all().await.unwrap();
        assert_eq!(all.len(), 23);
        assert_eq!(all[22].id, "23");

        let streamed: Vec<Hit> = pager.stream().try_collect().await.unwrap();
        assert_eq!(streamed, all);
    }

    #[tokio::test]
    async fn test_pages_do_not_overlap_with_tie_break() {
        // docs share a name so relevance alone cannot order them; the id
        // tie-break must make consecutive pages disjoint and exhaustive.
        let mut index = MemoryIndex::new();
        for id in 1..=20u64 {
            index.add(json!({
                "id": id,
                "object_type": "plugin",
                "name": "duplicate",
                "popularity": 5,
            }));
        }
        let engine = IndexEngine::new(Arc::new(index));
        let mut q = IndexQuery::new(QueryNode::MatchAll).with_window(0, 10);
        q.sort = vec![SortKey::desc_missing_last("popularity")];
        let mut pager = Pager::new(&engine, q);

        let first = pager.fetch_page(0, 10).await.unwrap();
        let second = pager.fetch_page(10, 10).await.unwrap();
        let mut seen: Vec<String> = first
            .hits
            .iter()
            .chain(second.hits.iter())
            .map(|h| h.id.clone())
            .collect();
        seen.sort_by_key(|id| id.parse::<u64>().unwrap());
        seen.dedup();
        assert_eq!(seen.len(), 20);
    }
}
