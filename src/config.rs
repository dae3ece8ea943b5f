//! 설정 모듈 - 환경변수 기반 런타임 설정
//!
//! 모든 값에 기본값이 있어 환경변수 없이도 동작합니다.
//! 경로 기본값은 `~/.campus-rag/` 아래입니다.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::knowledge::get_data_dir;

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_MAX_PAGES: usize = 300;
pub const DEFAULT_MAX_DEPTH: usize = 2;
pub const DEFAULT_CRAWL_DELAY_MS: u64 = 1500;
pub const DEFAULT_CHUNK_SIZE: usize = 1800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 250;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MAX_CHUNKS: usize = 8;
pub const DEFAULT_SEMANTIC_CAND_MULTIPLIER: usize = 4;
pub const DEFAULT_W_SEMANTIC: f32 = 0.7;
pub const DEFAULT_W_KEYWORD: f32 = 0.3;

// ============================================================================
// Config
// ============================================================================

/// 런타임 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 크롤링 시작 URL (쉼표 구분)
    pub start_urls: Vec<Url>,
    /// 허용 URL 접두 목록 (비어있으면 시작 URL의 오리진으로 제한)
    pub allow_prefixes: Vec<String>,
    pub max_pages: usize,
    pub max_depth: usize,
    pub crawl_delay: Duration,

    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,

    /// 최종 결과 상한
    pub max_chunks: usize,
    /// 시맨틱 후보 배수 (top k 대비)
    pub semantic_cand_multiplier: usize,
    pub w_semantic: f32,
    pub w_keyword: f32,

    pub docstore_path: PathBuf,
    pub index_path: PathBuf,
    pub attachment_dir: PathBuf,
    /// 키워드 부스트 설정 파일 (없으면 부스트 없음)
    pub boosts_path: Option<PathBuf>,
}

impl Config {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        let data_dir = get_data_dir();

        let start_urls = parse_url_list(&env_or("START_URLS", ""))?;

        let allow_prefixes: Vec<String> = match std::env::var("ALLOWLIST") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            // 명시적 allowlist가 없으면 시작 URL의 오리진으로 제한
            _ => start_urls
                .iter()
                .map(|u| format!("{}/", u.origin().ascii_serialization()))
                .collect(),
        };

        let boosts_path = std::env::var("BOOSTS_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            start_urls,
            allow_prefixes,
            max_pages: parse_env("MAX_PAGES", DEFAULT_MAX_PAGES)?,
            max_depth: parse_env("MAX_DEPTH", DEFAULT_MAX_DEPTH)?,
            crawl_delay: Duration::from_millis(parse_env(
                "CRAWL_DELAY_MS",
                DEFAULT_CRAWL_DELAY_MS,
            )?),
            chunk_size: parse_env("CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            chunk_overlap: parse_env("CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?,
            top_k: parse_env("TOP_K", DEFAULT_TOP_K)?,
            max_chunks: parse_env("MAX_CHUNKS", DEFAULT_MAX_CHUNKS)?,
            semantic_cand_multiplier: parse_env(
                "SEMANTIC_CAND_MULTIPLIER",
                DEFAULT_SEMANTIC_CAND_MULTIPLIER,
            )?,
            w_semantic: parse_env("W_SEMANTIC", DEFAULT_W_SEMANTIC)?,
            w_keyword: parse_env("W_KEYWORD", DEFAULT_W_KEYWORD)?,
            docstore_path: env_path("DOCSTORE_PATH", data_dir.join("docstore.jsonl")),
            index_path: env_path("INDEX_PATH", data_dir.join("index.json")),
            attachment_dir: env_path("ATTACHMENT_DIR", data_dir.join("attachments")),
            boosts_path,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_path(name: &str, default: PathBuf) -> PathBuf {
    std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("환경변수 {} 파싱 실패: {}", name, raw)),
        _ => Ok(default),
    }
}

/// 쉼표로 구분된 URL 목록 파싱
fn parse_url_list(raw: &str) -> Result<Vec<Url>> {
    let mut urls = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let url = Url::parse(part).with_context(|| format!("잘못된 URL: {}", part))?;
        urls.push(url);
    }
    Ok(urls)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_list() {
        let urls =
            parse_url_list("https://a.example.com/, https://b.example.com/notice").unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[1].path(), "/notice");
    }

    #[test]
    fn test_parse_url_list_empty() {
        assert!(parse_url_list("").unwrap().is_empty());
        assert!(parse_url_list(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_url_list_invalid() {
        assert!(parse_url_list("not a url").is_err());
    }
}
