//! CLI 모듈
//!
//! campus-rag 명령어 정의 및 구현

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use url::Url;

use crate::config::Config;
use crate::crawler::{CrawlJob, Crawler};
use crate::embedding::{has_api_key, GeminiEmbedding};
use crate::ingest::Ingestor;
use crate::knowledge::{
    BoostConfig, ChunkConfig, DocStore, FlatIndex, FusionWeights, HybridEngine, SearchParams,
    VectorIndex,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "campus-rag")]
#[command(version, about = "학교 홈페이지 크롤링 + 하이브리드 검색 RAG", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 사이트를 크롤링하여 지식베이스 구축
    Ingest {
        /// 시작 URL (미지정 시 START_URLS 환경변수)
        #[arg(short, long)]
        url: Vec<String>,

        /// 허용 URL 접두 (미지정 시 시작 URL의 오리진)
        #[arg(long)]
        allow: Vec<String>,

        /// 최대 페이지 수
        #[arg(long)]
        max_pages: Option<usize>,

        /// 최대 링크 깊이
        #[arg(long)]
        max_depth: Option<usize>,

        /// 페이지 요청 간격 (ms)
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// 지식베이스 검색
    Query {
        /// 검색 쿼리
        query: String,

        /// 결과 개수 제한 (미지정 시 TOP_K 환경변수, 기본 5)
        #[arg(short = 'k', long = "limit")]
        limit: Option<usize>,

        /// JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Ingest {
            url,
            allow,
            max_pages,
            max_depth,
            delay_ms,
        } => cmd_ingest(url, allow, max_pages, max_depth, delay_ms).await,
        Commands::Query { query, limit, json } => cmd_query(&query, limit, json).await,
        Commands::Status => cmd_status().await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 수집 명령어 (ingest)
///
/// 크롤링 -> 청킹 -> 임베딩 -> 색인 파이프라인을 실행합니다.
async fn cmd_ingest(
    urls: Vec<String>,
    allow: Vec<String>,
    max_pages: Option<usize>,
    max_depth: Option<usize>,
    delay_ms: Option<u64>,
) -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }

    let mut config = Config::from_env().context("설정 로드 실패")?;

    if !urls.is_empty() {
        let mut parsed = Vec::new();
        for raw in &urls {
            parsed.push(Url::parse(raw).with_context(|| format!("잘못된 URL: {}", raw))?);
        }
        // CLI로 시작 URL을 주면 allowlist도 해당 오리진으로 재설정
        config.allow_prefixes = parsed
            .iter()
            .map(|u| format!("{}/", u.origin().ascii_serialization()))
            .collect();
        config.start_urls = parsed;
    }

    if config.start_urls.is_empty() {
        bail!("시작 URL이 없습니다. --url 옵션 또는 START_URLS 환경변수를 설정하세요");
    }

    if !allow.is_empty() {
        config.allow_prefixes = allow;
    }
    if let Some(n) = max_pages {
        config.max_pages = n;
    }
    if let Some(d) = max_depth {
        config.max_depth = d;
    }
    if let Some(ms) = delay_ms {
        config.crawl_delay = std::time::Duration::from_millis(ms);
    }

    println!("[*] 크롤링 시작: {} 개 URL", config.start_urls.len());
    for url in &config.start_urls {
        println!("    - {}", url);
    }
    println!(
        "    최대 {} 페이지, 깊이 {}, 간격 {:?}",
        config.max_pages, config.max_depth, config.crawl_delay
    );

    let store = Arc::new(DocStore::open(&config.docstore_path).context("문서 저장소 열기 실패")?);
    let index: Arc<dyn VectorIndex> =
        Arc::new(FlatIndex::open(&config.index_path).context("벡터 인덱스 열기 실패")?);
    let embedder = Arc::new(GeminiEmbedding::from_env().context("임베딩 프로바이더 생성 실패")?);

    let crawler = Crawler::new(config.attachment_dir.clone()).context("크롤러 생성 실패")?;
    let job = CrawlJob {
        start_urls: config.start_urls.clone(),
        allow_prefixes: config.allow_prefixes.clone(),
        max_pages: config.max_pages,
        max_depth: config.max_depth,
        delay: config.crawl_delay,
    };

    let ingestor = Ingestor::new(
        embedder,
        index,
        store,
        ChunkConfig {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        },
    );

    let report = ingestor.run(&crawler, &job).await?;

    println!();
    println!("[OK] 수집 완료");
    println!("     페이지: {} (건너뜀 {})", report.pages_crawled, report.pages_skipped);
    println!(
        "     첨부파일: {} (실패 {})",
        report.attachments_processed, report.attachments_failed
    );
    println!(
        "     청크: +{} (총 {})",
        report.chunks_added, report.total_chunks
    );

    Ok(())
}

/// 검색 명령어 (query)
async fn cmd_query(query: &str, limit: Option<usize>, json: bool) -> Result<()> {
    if !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\
             설정: export GEMINI_API_KEY=your-key"
        );
    }

    let config = Config::from_env().context("설정 로드 실패")?;
    let limit = limit.unwrap_or(config.top_k);

    let store = Arc::new(DocStore::open(&config.docstore_path).context("문서 저장소 열기 실패")?);
    if store.count() == 0 {
        println!("[!] 지식베이스가 비어 있습니다. 먼저 ingest를 실행하세요.");
        return Ok(());
    }

    let index: Arc<dyn VectorIndex> =
        Arc::new(FlatIndex::open(&config.index_path).context("벡터 인덱스 열기 실패")?);
    let embedder = Arc::new(GeminiEmbedding::from_env().context("임베딩 프로바이더 생성 실패")?);

    let boosts = match &config.boosts_path {
        Some(path) => BoostConfig::load(path).context("부스트 설정 로드 실패")?,
        None => BoostConfig::none(),
    };

    let engine = HybridEngine::new(
        embedder,
        index,
        store,
        SearchParams {
            candidate_multiplier: config.semantic_cand_multiplier,
            max_chunks: config.max_chunks,
            weights: FusionWeights {
                semantic: config.w_semantic,
                keyword: config.w_keyword,
            },
            boosts,
            ..SearchParams::default()
        },
    );

    let response = engine.search(query, limit).await.context("검색 실패")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.results.is_empty() {
        println!("[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!(
        "[OK] 검색 결과 {} 건 (시맨틱 {}, 키워드 {}):\n",
        response.final_count, response.semantic_count, response.keyword_count
    );

    for (i, chunk) in response.results.iter().enumerate() {
        println!(
            "{}. [점수: {:.4} = 시맨틱 {:.4} + 키워드 {:.1}]",
            i + 1,
            chunk.final_score,
            chunk.semantic_score,
            chunk.keyword_score
        );
        if !chunk.title.is_empty() {
            println!("   제목: {}", chunk.title);
        }
        println!("   URL: {}", chunk.url);
        println!("   내용: {}", truncate_text(&chunk.text, 200));
        println!();
    }

    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status() -> Result<()> {
    println!("campus-rag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let config = Config::from_env().context("설정 로드 실패")?;

    println!("[*] 문서 저장소: {}", config.docstore_path.display());
    println!("[*] 벡터 인덱스: {}", config.index_path.display());
    println!("[*] 첨부파일: {}", config.attachment_dir.display());

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    match DocStore::open(&config.docstore_path) {
        Ok(store) => {
            println!("[OK] 저장된 청크: {} 건", store.count());
        }
        Err(e) => {
            println!("[!] 문서 저장소 열기 실패: {}", e);
        }
    }

    match FlatIndex::open(&config.index_path) {
        Ok(index) => {
            println!("[OK] 벡터 인덱스: {} 건", index.count().await?);
        }
        Err(e) => {
            println!("[!] 벡터 인덱스 열기 실패: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace(['\n', '\r'], " ");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

// ============================================================================
// Tests
// ============================================================================
