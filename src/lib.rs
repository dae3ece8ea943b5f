//! campus-rag - 학교 홈페이지 크롤링 + 하이브리드 검색 RAG 시스템
//!
//! 학과 사이트를 범위 제한 BFS로 크롤링해 본문과 첨부파일(PDF/HWP/
//! DOCX/이미지)을 청크 단위로 색인하고, Gemini 임베딩 기반 시맨틱
//! 검색과 가중 키워드 검색을 융합해 질의에 답합니다.

pub mod cli;
pub mod config;
pub mod crawler;
pub mod embedding;
pub mod extractor;
pub mod ingest;
pub mod knowledge;

// Re-exports
pub use config::Config;
pub use crawler::{CrawlJob, CrawlOutcome, Crawler, Page};
pub use embedding::{get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding};
pub use ingest::{IngestReport, Ingestor};
pub use knowledge::{
    get_data_dir, split_text, BoostConfig, ChunkConfig, DocRecord, DocStore, FlatIndex,
    HybridEngine, ScoredChunk, SearchParams, SearchResponse, SourceType, VectorIndex,
};
