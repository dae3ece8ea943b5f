//! 수집 파이프라인 - 크롤링 결과를 청크로 나눠 색인
//!
//! 흐름: 크롤링 -> 페이지/첨부파일 텍스트 -> 청킹 -> 임베딩 ->
//! 문서 저장소 + 벡터 인덱스에 추가.
//!
//! 개별 페이지나 첨부파일의 실패는 건너뛰고 집계만 합니다.
//! 저장소와 인덱스는 같은 순서로 추가되므로 행 번호가 일치합니다.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use url::Url;

use crate::crawler::{Attachment, AttachmentKind, CrawlJob, Crawler, Page};
use crate::embedding::EmbeddingProvider;
use crate::extractor::AttachmentExtractor;
use crate::knowledge::{ChunkConfig, DocRecord, DocStore, SourceType, VectorIndex};

// ============================================================================
// Report
// ============================================================================

/// 수집 결과 요약
#[derive(Debug, Default)]
pub struct IngestReport {
    pub pages_crawled: usize,
    pub pages_skipped: usize,
    pub chunks_added: usize,
    pub attachments_processed: usize,
    pub attachments_failed: usize,
    pub total_chunks: usize,
}

// ============================================================================
// Ingestor
// ============================================================================

/// 수집 파이프라인
pub struct Ingestor {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    store: Arc<DocStore>,
    extractor: AttachmentExtractor,
    chunk_config: ChunkConfig,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        store: Arc<DocStore>,
        chunk_config: ChunkConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
            extractor: AttachmentExtractor::new(),
            chunk_config,
        }
    }

    /// 크롤링부터 색인까지 전체 파이프라인 실행
    pub async fn run(&self, crawler: &Crawler, job: &CrawlJob) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        let outcome = crawler.crawl(job).await.context("크롤링 실패")?;
        report.pages_crawled = outcome.pages.len();
        report.pages_skipped = outcome.pages_skipped;

        for page in &outcome.pages {
            match self.ingest_page(page).await {
                Ok(added) => report.chunks_added += added,
                Err(e) => {
                    tracing::warn!("Page ingest failed: {} ({})", page.url, e);
                }
            }

            for attachment in &page.attachments {
                match self.ingest_attachment(&page.url, &page.title, attachment).await {
                    Ok(added) => {
                        report.attachments_processed += 1;
                        report.chunks_added += added;
                    }
                    Err(e) => {
                        report.attachments_failed += 1;
                        tracing::warn!(
                            "Attachment ingest failed: {} ({})",
                            attachment.url,
                            e
                        );
                    }
                }
            }
        }

        // 행 번호 = 삽입 순서 불변식이 깨진 인덱스는 영속화하지 않음
        let rows = self.index.count().await?;
        if rows != self.store.count() {
            anyhow::bail!(
                "인덱스 행 수({})와 저장소 레코드 수({})가 다릅니다, 저장 중단",
                rows,
                self.store.count()
            );
        }

        self.index.persist().await.context("인덱스 저장 실패")?;
        report.total_chunks = self.store.count();

        tracing::info!(
            "Ingest complete: {} pages, {} chunks added, {} total",
            report.pages_crawled,
            report.chunks_added,
            report.total_chunks
        );

        Ok(report)
    }

    /// 페이지 본문을 청킹해 색인
    async fn ingest_page(&self, page: &Page) -> Result<usize> {
        let records = build_records(
            &page.text,
            &page.url,
            &page.title,
            SourceType::Html,
            None,
            &self.chunk_config,
        );
        self.store_records(records).await
    }

    /// 첨부파일 텍스트를 추출해 색인
    async fn ingest_attachment(
        &self,
        page_url: &Url,
        page_title: &str,
        attachment: &Attachment,
    ) -> Result<usize> {
        let Some(text) = self
            .extractor
            .extract(&attachment.local_path, attachment.kind)
            .await?
        else {
            // 추출은 됐지만 내용이 없음 (빈 문서, 로고 이미지 등)
            return Ok(0);
        };

        let source_type = match attachment.kind {
            AttachmentKind::Pdf => SourceType::Pdf,
            AttachmentKind::Hwp => SourceType::Hwp,
            AttachmentKind::Docx => SourceType::Docx,
            AttachmentKind::Image => SourceType::Image,
        };

        let mut records = build_records(
            &text,
            page_url,
            page_title,
            source_type,
            Some(attachment.url.as_str()),
            &self.chunk_config,
        );
        for record in &mut records {
            record.attachment_path =
                Some(attachment.local_path.to_string_lossy().to_string());
        }

        self.store_records(records).await
    }

    /// 레코드 임베딩 후 저장소와 인덱스에 같은 순서로 추가
    ///
    /// 인덱스 행 번호는 저장소 삽입 순서와 일치해야 합니다. 저장소
    /// 추가가 실패하면 방금 넣은 인덱스 행을 되돌려 쌍을 유지합니다.
    async fn store_records(&self, records: Vec<DocRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let rows_before = self.index.count().await?;
        self.index.upsert(&embeddings).await?;
        if let Err(e) = self.store.append(&records) {
            self.index.truncate(rows_before).await?;
            return Err(e);
        }

        Ok(records.len())
    }
}

// ============================================================================
// Record Construction
// ============================================================================

/// 텍스트를 청킹해 DocRecord 목록 생성
fn build_records(
    text: &str,
    url: &Url,
    title: &str,
    source_type: SourceType,
    attachment_url: Option<&str>,
    config: &ChunkConfig,
) -> Vec<DocRecord> {
    let fetched_at = Utc::now().timestamp();

    // 첨부파일은 원본 URL 기준으로 ID 생성 (페이지와 충돌 방지)
    let id_source = attachment_url.unwrap_or(url.as_str());

    config
        .split(text)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| DocRecord {
            text: chunk,
            url: url.as_str().to_string(),
            title: title.to_string(),
            chunk_id: make_chunk_id(id_source, i),
            source_type,
            fetched_at,
            attachment_url: attachment_url.map(|s| s.to_string()),
            attachment_path: None,
        })
        .collect()
}

/// 청크 ID 생성: 소스 URL 해시 접두 + 청크 순번
fn make_chunk_id(source: &str, index: usize) -> String {
    let digest = Sha256::digest(source.as_bytes());
    let hash = format!("{:x}", digest);
    format!("{}_{}", &hash[..12], index)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::FlatIndex;
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn test_config() -> ChunkConfig {
        ChunkConfig {
            chunk_size: 100,
            overlap: 20,
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    #[tokio::test]
    async fn test_store_append_failure_rolls_back_index_rows() {
        let dir = TempDir::new().unwrap();
        let store_path = dir.path().join("docstore.jsonl");

        let store = Arc::new(DocStore::open(&store_path).unwrap());
        let index: Arc<dyn VectorIndex> =
            Arc::new(FlatIndex::open(&dir.path().join("index.json")).unwrap());
        let ingestor = Ingestor::new(
            Arc::new(StubEmbedder),
            index.clone(),
            store.clone(),
            test_config(),
        );

        // 저장소 경로를 디렉토리로 막아 append를 실패시킴
        std::fs::create_dir(&store_path).unwrap();

        let url = Url::parse("https://cse.example.ac.kr/notice/1").unwrap();
        let records = build_records(
            &"본문 내용 ".repeat(30),
            &url,
            "공지",
            SourceType::Html,
            None,
            &test_config(),
        );
        assert!(!records.is_empty());

        let result = ingestor.store_records(records).await;
        assert!(result.is_err());

        // 저장소에 없는 고아 행이 인덱스에 남으면 안 됨
        assert_eq!(index.count().await.unwrap(), 0);
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn test_store_records_keeps_index_and_store_aligned() {
        let dir = TempDir::new().unwrap();

        let store = Arc::new(DocStore::open(&dir.path().join("docstore.jsonl")).unwrap());
        let index: Arc<dyn VectorIndex> =
            Arc::new(FlatIndex::open(&dir.path().join("index.json")).unwrap());
        let ingestor = Ingestor::new(
            Arc::new(StubEmbedder),
            index.clone(),
            store.clone(),
            test_config(),
        );

        let url = Url::parse("https://cse.example.ac.kr/notice/1").unwrap();
        let records = build_records(
            &"장학금 안내 본문 ".repeat(30),
            &url,
            "공지",
            SourceType::Html,
            None,
            &test_config(),
        );
        let added = ingestor.store_records(records).await.unwrap();

        assert!(added > 0);
        assert_eq!(index.count().await.unwrap(), store.count());
    }

    #[test]
    fn test_make_chunk_id_stable() {
        let a = make_chunk_id("https://example.com/notice/1", 0);
        let b = make_chunk_id("https://example.com/notice/1", 0);
        assert_eq!(a, b);
        assert!(a.ends_with("_0"));
    }

    #[test]
    fn test_make_chunk_id_differs_by_source_and_index() {
        let a = make_chunk_id("https://example.com/a", 0);
        let b = make_chunk_id("https://example.com/b", 0);
        let c = make_chunk_id("https://example.com/a", 1);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_build_records_page() {
        let url = Url::parse("https://cse.example.ac.kr/notice/1").unwrap();
        let text = "가나다라 ".repeat(50);
        let records = build_records(&text, &url, "공지", SourceType::Html, None, &test_config());

        assert!(records.len() > 1);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.url, url.as_str());
            assert_eq!(record.title, "공지");
            assert!(record.chunk_id.ends_with(&format!("_{}", i)));
            assert!(record.attachment_url.is_none());
        }
    }

    #[test]
    fn test_build_records_attachment_id_uses_attachment_url() {
        let url = Url::parse("https://cse.example.ac.kr/notice/1").unwrap();
        let page = build_records("짧은 본문", &url, "공지", SourceType::Html, None, &test_config());
        let attach = build_records(
            "짧은 본문",
            &url,
            "공지",
            SourceType::Pdf,
            Some("https://cse.example.ac.kr/files/a.pdf"),
            &test_config(),
        );

        assert_ne!(page[0].chunk_id, attach[0].chunk_id);
        assert_eq!(
            attach[0].attachment_url.as_deref(),
            Some("https://cse.example.ac.kr/files/a.pdf")
        );
    }
}
