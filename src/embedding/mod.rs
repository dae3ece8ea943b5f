//! 임베딩 모듈 - Gemini API 텍스트 벡터화
//!
//! 검색 엔진은 `EmbeddingProvider` 트레이트만 의존합니다.
//! Gemini 무료 티어 쿼터를 위해 호출 간 최소 딜레이와
//! 429 지수 백오프 재시도를 적용합니다.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 단일 텍스트 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 배치 임베딩 (기본 구현: 순차 호출)
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding {}/{}", i + 1, texts.len());
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Gemini Embedding
// ============================================================================

const GEMINI_EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:embedContent";

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 768;

/// 호출 간 최소 딜레이 (무료 티어 60 RPM)
const MIN_DELAY: Duration = Duration::from_millis(1000);
/// 429 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 초기 백오프
const INITIAL_BACKOFF_MS: u64 = 2000;

/// Gemini 임베딩 구현체
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    dimension: usize,
    last_request: Mutex<Option<Instant>>,
}

impl GeminiEmbedding {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_dimension(api_key, DEFAULT_DIMENSION)
    }

    /// 차원 지정 생성 (768 / 1536 / 3072)
    pub fn with_dimension(api_key: String, dimension: usize) -> Result<Self> {
        if ![768, 1536, 3072].contains(&dimension) {
            anyhow::bail!("지원하지 않는 임베딩 차원: {} (768, 1536, 3072 중 선택)", dimension);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("HTTP 클라이언트 생성 실패")?;

        Ok(Self {
            api_key,
            client,
            dimension,
            last_request: Mutex::new(None),
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key()?)
    }

    /// 직전 호출로부터 최소 간격 보장
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < MIN_DELAY {
                tokio::time::sleep(MIN_DELAY - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: EmbedContent<'a>,
    #[serde(rename = "taskType")]
    task_type: &'a str,
    #[serde(rename = "outputDimensionality")]
    output_dimensionality: usize,
}

#[derive(Serialize)]
struct EmbedContent<'a> {
    parts: Vec<EmbedPart<'a>>,
}

#[derive(Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let request = EmbedRequest {
            model: "models/gemini-embedding-001",
            content: EmbedContent {
                parts: vec![EmbedPart { text }],
            },
            task_type: "RETRIEVAL_DOCUMENT",
            output_dimensionality: self.dimension,
        };

        let mut last_error: Option<anyhow::Error> = None;

        for attempt in 0..=MAX_RETRIES {
            self.throttle().await;

            let response = match self
                .client
                .post(GEMINI_EMBED_URL)
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("임베딩 요청 전송 실패: {}", e));
                    if attempt < MAX_RETRIES {
                        let backoff =
                            Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                        tracing::warn!("Embed request failed, retrying in {:?}", backoff);
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();
            let body = response.text().await.context("임베딩 응답 읽기 실패")?;

            if status.is_success() {
                let parsed: EmbedResponse =
                    serde_json::from_str(&body).context("임베딩 응답 파싱 실패")?;
                return Ok(parsed.embedding.values);
            }

            if status.as_u16() == 429 {
                last_error = Some(anyhow::anyhow!("Gemini rate limit (429)"));
                if attempt < MAX_RETRIES {
                    let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                    tracing::warn!(
                        "Rate limit hit, backing off {:?} ({}/{})",
                        backoff,
                        attempt + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                    continue;
                }
            } else {
                anyhow::bail!("Gemini API 에러 ({}): {}", status, body);
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("임베딩 재시도 {}회 모두 실패", MAX_RETRIES)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "gemini-embedding-001"
    }
}

// ============================================================================
// API Key
// ============================================================================

/// API 키 로드 (GEMINI_API_KEY > GOOGLE_AI_API_KEY 순)
pub fn get_api_key() -> Result<String> {
    for var in ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            if !key.is_empty() {
                return Ok(key);
            }
        }
    }

    anyhow::bail!(
        "API 키가 없습니다. GEMINI_API_KEY 또는 GOOGLE_AI_API_KEY 환경변수를 설정하세요.\n\
         키 발급: https://aistudio.google.com/app/apikey"
    )
}

/// API 키 존재 여부
pub fn has_api_key() -> bool {
    ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"]
        .iter()
        .any(|var| std::env::var(var).map(|k| !k.is_empty()).unwrap_or(false))
}

// ============================================================================
// Tests
// ============================================================================
