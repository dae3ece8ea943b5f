//! Knowledge 모듈 - 청킹, 저장, 키워드/벡터 검색, 하이브리드 융합
//!
//! - Chunker: 겹침 윈도우 텍스트 분할
//! - DocStore: JSONL append-only 문서 저장소 + 불변 스냅샷
//! - Keyword: 가중 단어빈도 랭킹 (부스트는 설정 데이터)
//! - Vector: 벡터 인덱스 트레이트 + 플랫 내적 구현
//! - Fusion: 두 검색 경로의 병합/정규화/재정렬

mod chunker;
mod fusion;
pub mod keyword;
mod store;
mod vector;

// Re-exports
pub use chunker::{split_text, ChunkConfig};
pub use fusion::{
    merge, rerank, Candidate, CandidateKey, FusionWeights, HybridEngine, ScoredChunk,
    SearchParams, SearchResponse,
};
pub use keyword::{tokenize, BoostConfig, Category, KeywordHit, KEYWORD_CANDIDATE_LIMIT};
pub use store::{get_data_dir, DocRecord, DocStore, Snapshot, SourceType};
pub use vector::{cosine_similarity, normalize_l2, FlatIndex, VectorIndex};
