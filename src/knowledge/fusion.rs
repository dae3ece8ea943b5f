//! 하이브리드 융합 엔진 - 시맨틱 + 키워드 후보 통합
//!
//! 벡터 검색 후보와 키워드 후보를 (url, text) 키로 병합하고,
//! 키워드 스코어를 최댓값 기준으로 정규화한 뒤 가중합으로 재정렬합니다.
//! URL당 최고 스코어 청크 하나만 남겨 다양한 출처가 유지되도록 합니다.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::embedding::EmbeddingProvider;

use super::keyword::{self, BoostConfig, KEYWORD_CANDIDATE_LIMIT};
use super::store::{DocStore, Snapshot};
use super::vector::VectorIndex;

// ============================================================================
// Types
// ============================================================================

/// 후보 동일성 키
///
/// 두 검색 경로의 레코드는 url과 text가 모두 같을 때만 같은 청크입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateKey {
    pub url: String,
    pub text: String,
}

/// 융합 중간 후보 (한 질의 동안만 존재)
#[derive(Debug, Clone)]
pub struct Candidate {
    pub url: String,
    pub title: String,
    pub text: String,
    pub semantic_score: f32,
    pub keyword_score: f32,
}

impl Candidate {
    fn key(&self) -> CandidateKey {
        CandidateKey {
            url: self.url.clone(),
            text: self.text.clone(),
        }
    }
}

/// 최종 검색 결과 청크
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub url: String,
    pub title: String,
    pub text: String,
    pub semantic_score: f32,
    pub keyword_score: f32,
    pub final_score: f32,
}

/// 검색 응답
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<ScoredChunk>,
    pub semantic_count: usize,
    pub keyword_count: usize,
    pub final_count: usize,
}

/// 융합 가중치
#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub semantic: f32,
    pub keyword: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        // 정확한 용어/수치 중심 질의가 많으면 keyword 쪽을 올림 (0.55/0.45까지)
        Self {
            semantic: 0.7,
            keyword: 0.3,
        }
    }
}

/// 검색 파라미터
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// 시맨틱 후보 배수 (top k * multiplier)
    pub candidate_multiplier: usize,
    /// 시맨틱 후보 최소 개수
    pub candidate_floor: usize,
    /// 키워드 후보 상한
    pub keyword_limit: usize,
    /// 최종 결과 상한
    pub max_chunks: usize,
    pub weights: FusionWeights,
    pub boosts: BoostConfig,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            candidate_multiplier: 4,
            candidate_floor: 8,
            keyword_limit: KEYWORD_CANDIDATE_LIMIT,
            max_chunks: 8,
            weights: FusionWeights::default(),
            boosts: BoostConfig::none(),
        }
    }
}

// ============================================================================
// Merge / Rerank
// ============================================================================

/// 시맨틱 + 키워드 후보 병합
///
/// 한쪽에만 있는 후보는 그 경로의 스코어를 유지하고 다른 쪽은 0,
/// 양쪽에 있는 후보는 시맨틱 스코어를 유지하고 키워드 스코어는
/// 두 값의 최댓값을 취합니다 (중복 방출 방어, 절대 합산하지 않음).
pub fn merge(semantic: Vec<Candidate>, keyword: Vec<Candidate>) -> Vec<Candidate> {
    // 삽입 순서를 보존해야 동점 정렬이 결정적으로 유지됨
    let mut order: Vec<Candidate> = Vec::with_capacity(semantic.len() + keyword.len());
    let mut by_key: HashMap<CandidateKey, usize> = HashMap::new();

    for cand in semantic {
        let key = cand.key();
        match by_key.get(&key) {
            Some(&i) => {
                let existing = &mut order[i];
                existing.keyword_score = existing.keyword_score.max(cand.keyword_score);
            }
            None => {
                by_key.insert(key, order.len());
                order.push(cand);
            }
        }
    }

    for cand in keyword {
        let key = cand.key();
        match by_key.get(&key) {
            Some(&i) => {
                let existing = &mut order[i];
                existing.keyword_score = existing.keyword_score.max(cand.keyword_score);
            }
            None => {
                by_key.insert(key, order.len());
                order.push(cand);
            }
        }
    }

    order
}

/// 재정렬: 정규화 + 가중합 + URL당 1개 + 상한 절단
pub fn rerank(
    candidates: Vec<Candidate>,
    k: usize,
    max_chunks: usize,
    weights: FusionWeights,
) -> Vec<ScoredChunk> {
    if candidates.is_empty() {
        return Vec::new();
    }

    // 키워드 스코어 min-max 정규화 (전부 0이면 분모 1)
    let max_keyword = candidates
        .iter()
        .map(|c| c.keyword_score)
        .fold(0.0f32, f32::max);
    let denominator = if max_keyword > 0.0 { max_keyword } else { 1.0 };

    let mut scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .map(|c| {
            let keyword_norm = c.keyword_score / denominator;
            let final_score = weights.semantic * c.semantic_score + weights.keyword * keyword_norm;
            ScoredChunk {
                url: c.url,
                title: c.title,
                text: c.text,
                semantic_score: c.semantic_score,
                keyword_score: c.keyword_score,
                final_score,
            }
        })
        .collect();

    // URL당 최고 스코어 청크만 유지 (청크가 많은 문서의 독점 방지)
    let mut best_per_url: Vec<ScoredChunk> = Vec::new();
    let mut url_index: HashMap<String, usize> = HashMap::new();
    for chunk in scored.drain(..) {
        match url_index.get(&chunk.url) {
            Some(&i) => {
                if chunk.final_score > best_per_url[i].final_score {
                    best_per_url[i] = chunk;
                }
            }
            None => {
                url_index.insert(chunk.url.clone(), best_per_url.len());
                best_per_url.push(chunk);
            }
        }
    }

    // 안정 정렬: 동점이면 삽입 순서 유지
    best_per_url.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let limit = best_per_url.len().min(max_chunks).min(k.max(1));
    best_per_url.truncate(limit);
    best_per_url
}

// ============================================================================
// HybridEngine
// ============================================================================

/// 하이브리드 검색 엔진
///
/// 임베더와 벡터 인덱스를 주입받아 전역 상태 없이 동작합니다.
/// 저장소와 인덱스가 고정이면 search는 (query, k)의 순수 함수입니다.
pub struct HybridEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    store: Arc<DocStore>,
    params: SearchParams,
}

impl HybridEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        store: Arc<DocStore>,
        params: SearchParams,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
            params,
        }
    }

    /// 하이브리드 검색
    ///
    /// 빈 질의는 호출자 입력 오류, 빈 저장소는 빈 결과입니다.
    pub async fn search(&self, query: &str, k: usize) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            bail!("검색어가 비어 있습니다");
        }

        let snapshot = self.store.snapshot();
        if snapshot.is_empty() {
            return Ok(SearchResponse {
                query: query.to_string(),
                results: Vec::new(),
                semantic_count: 0,
                keyword_count: 0,
                final_count: 0,
            });
        }

        // 1) 시맨틱 후보
        let semantic_k = (k * self.params.candidate_multiplier)
            .max(k)
            .max(self.params.candidate_floor);
        let query_vector = self.embedder.embed(query).await?;
        let hits = self.index.nearest(&query_vector, semantic_k).await?;

        let semantic: Vec<Candidate> = hits
            .iter()
            .filter_map(|&(row, score)| {
                snapshot.get(row).map(|doc| Candidate {
                    url: doc.url.clone(),
                    title: doc.title.clone(),
                    text: doc.text.clone(),
                    semantic_score: score,
                    keyword_score: 0.0,
                })
            })
            .collect();
        let semantic_count = semantic.len();

        // 2) 키워드 후보 (전체 저장소 스캔)
        let keyword_hits = keyword::rank(
            query,
            &snapshot,
            self.params.keyword_limit,
            &self.params.boosts,
        );
        let keyword: Vec<Candidate> = keyword_hits
            .iter()
            .map(|hit| {
                let doc = &snapshot[hit.index];
                Candidate {
                    url: doc.url.clone(),
                    title: doc.title.clone(),
                    text: doc.text.clone(),
                    semantic_score: 0.0,
                    keyword_score: hit.score,
                }
            })
            .collect();
        let keyword_count = keyword.len();

        // 3) 병합 + 재정렬
        let merged = merge(semantic, keyword);
        let results = rerank(merged, k, self.params.max_chunks, self.params.weights);

        tracing::debug!(
            "search: semantic={} keyword={} final={}",
            semantic_count,
            keyword_count,
            results.len()
        );

        Ok(SearchResponse {
            final_count: results.len(),
            query: query.to_string(),
            results,
            semantic_count,
            keyword_count,
        })
    }

    /// 저장소 스냅샷 (통계용)
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }
}

// ============================================================================
// Tests
// ============================================================================
