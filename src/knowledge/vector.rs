//! 벡터 인덱스 - 유사도 검색 트레이트 및 플랫 구현
//!
//! 인덱스 행 번호는 문서 저장소의 삽입 순서와 일치합니다.
//! 코사인 유사도는 L2 정규화 후 내적으로 계산하며 결과는 -1.0 ~ 1.0입니다.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use async_trait::async_trait;

// ============================================================================
// VectorIndex Trait
// ============================================================================

/// 벡터 인덱스 트레이트
///
/// 검색 엔진은 이 트레이트만 의존하므로 테스트에서 가짜 구현으로
/// 대체할 수 있습니다.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// 벡터 추가 (행 번호는 삽입 순서), 전체 행 수 반환
    async fn upsert(&self, embeddings: &[Vec<f32>]) -> Result<usize>;

    /// 최근접 이웃 검색: (행 번호, 유사도) 내림차순
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>>;

    /// 행 수를 지정 길이로 되돌림 (저장소와의 쌍이 깨졌을 때 롤백용)
    async fn truncate(&self, len: usize) -> Result<()>;

    /// 디스크에 저장
    async fn persist(&self) -> Result<()>;

    /// 벡터 개수
    async fn count(&self) -> Result<usize>;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 벡터를 L2 노름 1로 정규화 (제로 벡터는 그대로)
pub fn normalize_l2(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// 코사인 유사도 (-1.0 ~ 1.0)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

// ============================================================================
// FlatIndex
// ============================================================================

/// 플랫 벡터 인덱스 - 정규화 내적 전수 스캔
///
/// 삽입 시 L2 정규화하여 보관하고, 검색 시 쿼리도 정규화한 뒤
/// 내적으로 유사도를 계산합니다. JSON 파일로 영속화합니다.
pub struct FlatIndex {
    path: PathBuf,
    rows: RwLock<Vec<Vec<f32>>>,
}

impl FlatIndex {
    /// 인덱스 열기 (파일이 없으면 빈 인덱스)
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("인덱스 디렉토리 생성 실패")?;
            }
        }

        let rows: Vec<Vec<f32>> = if path.exists() {
            let data = std::fs::read_to_string(path)
                .with_context(|| format!("인덱스 파일 읽기 실패: {:?}", path))?;
            serde_json::from_str(&data).context("인덱스 파일 파싱 실패")?
        } else {
            Vec::new()
        };

        tracing::debug!("Flat index loaded: {} vectors from {:?}", rows.len(), path);

        Ok(Self {
            path: path.to_path_buf(),
            rows: RwLock::new(rows),
        })
    }
}

#[async_trait]
impl VectorIndex for FlatIndex {
    async fn upsert(&self, embeddings: &[Vec<f32>]) -> Result<usize> {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        for embedding in embeddings {
            let mut row = embedding.clone();
            normalize_l2(&mut row);
            rows.push(row);
        }
        Ok(rows.len())
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        let mut normalized = query.to_vec();
        normalize_l2(&mut normalized);

        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        let mut scored: Vec<(usize, f32)> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let dot: f32 = row.iter().zip(normalized.iter()).map(|(x, y)| x * y).sum();
                (i, dot)
            })
            .collect();

        // 동점은 행 번호 순서 유지 (안정 정렬 -> 결정적 결과)
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn truncate(&self, len: usize) -> Result<()> {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        if len < rows.len() {
            rows.truncate(len);
        }
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        let data = serde_json::to_string(&*rows).context("인덱스 직렬화 실패")?;
        std::fs::write(&self.path, data)
            .with_context(|| format!("인덱스 저장 실패: {:?}", self.path))?;
        tracing::info!("Persisted {} vectors to {:?}", rows.len(), self.path);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.rows.read().unwrap_or_else(|e| e.into_inner()).len())
    }
}

// ============================================================================
// Tests
// ============================================================================
