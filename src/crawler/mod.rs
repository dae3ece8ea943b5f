//! 웹 크롤러 - 범위 제한 BFS + robots.txt + 요청 간격 준수
//!
//! 허용 접두(allowlist) 안의 URL만 따라가며, 페이지 수/깊이 상한을
//! 지킵니다. 실제 요청을 보낸 뒤에만 딜레이를 적용하므로 범위 밖이나
//! 이미 방문한 URL을 거르는 데는 시간이 들지 않습니다.

mod extract;
mod robots;

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

pub use extract::{
    discover_attachments, discover_links, extract_page, normalize_whitespace, AttachmentLink,
    ExtractedPage,
};
pub use robots::{parse_disallow_rules, RobotsCache};

/// 본문이 이 글자 수 미만이면 저장하지 않음 (메뉴/빈 페이지 필터)
pub const MIN_CONTENT_LEN: usize = 400;

const USER_AGENT: &str = "campus-rag/0.1";

// ============================================================================
// Types
// ============================================================================

/// 첨부파일 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Pdf,
    Hwp,
    Docx,
    Image,
}

/// 다운로드된 첨부파일
#[derive(Debug, Clone)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub url: Url,
    pub local_path: PathBuf,
}

/// 크롤링된 페이지 하나
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub title: String,
    pub text: String,
    pub attachments: Vec<Attachment>,
}

/// 크롤링 작업 정의
#[derive(Debug, Clone)]
pub struct CrawlJob {
    pub start_urls: Vec<Url>,
    pub allow_prefixes: Vec<String>,
    pub max_pages: usize,
    pub max_depth: usize,
    pub delay: Duration,
}

/// 크롤링 결과 요약
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub pages: Vec<Page>,
    pub pages_skipped: usize,
}

// ============================================================================
// Crawler
// ============================================================================

/// 범위 제한 BFS 크롤러
pub struct Crawler {
    client: reqwest::Client,
    robots: RobotsCache,
    attachment_dir: PathBuf,
    min_content_len: usize,
}

impl Crawler {
    pub fn new(attachment_dir: PathBuf) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()
            .context("HTTP 클라이언트 생성 실패")?;

        Ok(Self {
            robots: RobotsCache::new(client.clone()),
            client,
            attachment_dir,
            min_content_len: MIN_CONTENT_LEN,
        })
    }

    /// BFS로 크롤링 수행
    ///
    /// 처리 순서: 큐에서 꺼내기 -> seen 체크 -> 범위/robots 체크 ->
    /// 페이지 요청 -> 딜레이 -> 추출/필터 -> 링크 큐잉.
    /// 딜레이는 실제 요청을 보낸 경우에만 적용합니다.
    pub async fn crawl(&self, job: &CrawlJob) -> Result<CrawlOutcome> {
        let mut outcome = CrawlOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(Url, usize)> = VecDeque::new();

        for url in &job.start_urls {
            let mut url = url.clone();
            url.set_fragment(None);
            queue.push_back((url, 0));
        }

        while let Some((url, depth)) = queue.pop_front() {
            // max_pages는 수집된 결과 페이지 기준
            if outcome.pages.len() >= job.max_pages {
                tracing::info!("Page limit reached: {}", job.max_pages);
                break;
            }

            if !seen.insert(url.as_str().to_string()) {
                continue;
            }

            if !in_scope(&url, &job.allow_prefixes) {
                continue;
            }

            if !self.robots.allows(&url).await {
                tracing::debug!("Blocked by robots.txt: {}", url);
                outcome.pages_skipped += 1;
                continue;
            }

            // 실제 요청을 보낸 경우에만 딜레이 적용
            let body = self.fetch_html(&url).await;
            tokio::time::sleep(job.delay).await;

            let Some(html) = body else {
                outcome.pages_skipped += 1;
                continue;
            };

            let extracted = extract_page(&html);

            // 깊이 제한 안이면 다음 링크 큐잉 (본문이 짧아도 링크는 따라감)
            if depth < job.max_depth {
                for link in discover_links(&html, &url) {
                    if in_scope(&link, &job.allow_prefixes)
                        && !seen.contains(link.as_str())
                    {
                        queue.push_back((link, depth + 1));
                    }
                }
            }

            if extracted.text.chars().count() < self.min_content_len {
                tracing::debug!("Content too short, skipping: {}", url);
                outcome.pages_skipped += 1;
                continue;
            }

            let attachments = self.download_attachments(&html, &url).await;

            tracing::info!(
                "Crawled [{}/{}] depth={} {} ({} chars, {} attachments)",
                outcome.pages.len() + 1,
                job.max_pages,
                depth,
                url,
                extracted.text.chars().count(),
                attachments.len()
            );

            outcome.pages.push(Page {
                url,
                title: extracted.title,
                text: extracted.text,
                attachments,
            });
        }

        Ok(outcome)
    }

    /// HTML 페이지 요청 (200 + text/html이 아니면 None)
    async fn fetch_html(&self, url: &Url) -> Option<String> {
        let response = match self.client.get(url.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("Fetch failed: {} ({})", url, e);
                return None;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            tracing::debug!("Non-200 response: {} ({})", url, response.status());
            return None;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.contains("text/html") {
            tracing::debug!("Non-HTML content type: {} ({})", url, content_type);
            return None;
        }

        match response.text().await {
            Ok(body) if !body.trim().is_empty() => Some(body),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Body read failed: {} ({})", url, e);
                None
            }
        }
    }

    /// 페이지의 첨부파일을 찾아 로컬에 다운로드
    ///
    /// 개별 실패는 경고만 남기고 계속 진행합니다.
    async fn download_attachments(&self, html: &str, page_url: &Url) -> Vec<Attachment> {
        let links = discover_attachments(html, page_url);
        let mut attachments = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();

        for link in links {
            if !seen_urls.insert(link.url.as_str().to_string()) {
                continue;
            }

            match self.download_one(&link).await {
                Ok(local_path) => attachments.push(Attachment {
                    kind: link.kind,
                    url: link.url,
                    local_path,
                }),
                Err(e) => {
                    tracing::warn!("Attachment download failed: {} ({})", link.url, e);
                }
            }
        }

        attachments
    }

    async fn download_one(&self, link: &AttachmentLink) -> Result<PathBuf> {
        if !self.attachment_dir.exists() {
            std::fs::create_dir_all(&self.attachment_dir).context("첨부파일 디렉토리 생성 실패")?;
        }

        let response = self
            .client
            .get(link.url.clone())
            .send()
            .await
            .with_context(|| format!("첨부파일 요청 실패: {}", link.url))?;

        if response.status() != reqwest::StatusCode::OK {
            anyhow::bail!("첨부파일 응답 코드 {}: {}", response.status(), link.url);
        }

        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("첨부파일 본문 읽기 실패: {}", link.url))?;

        let filename = attachment_filename(&link.url);
        let local_path = self.attachment_dir.join(filename);
        std::fs::write(&local_path, &bytes)
            .with_context(|| format!("첨부파일 저장 실패: {:?}", local_path))?;

        tracing::debug!("Downloaded attachment: {} -> {:?}", link.url, local_path);
        Ok(local_path)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// URL이 허용 접두 목록 안에 있는지 확인 (빈 목록이면 전부 허용)
pub fn in_scope(url: &Url, allow_prefixes: &[String]) -> bool {
    if allow_prefixes.is_empty() {
        return true;
    }
    let s = url.as_str();
    allow_prefixes.iter().any(|prefix| s.starts_with(prefix.as_str()))
}

/// URL에서 충돌을 피한 로컬 파일명 생성
///
/// URL 해시 접두 + 원래 파일명. 파일명이 없으면 해시만 사용합니다.
fn attachment_filename(url: &Url) -> String {
    use sha2::{Digest, Sha256};

    let digest = Sha256::digest(url.as_str().as_bytes());
    let hash = format!("{:x}", digest);
    let prefix = &hash[..12];

    let name = url
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|s| !s.is_empty())
        .unwrap_or("attachment");

    // 파일명에 안전하지 않은 문자 제거
    let safe: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();

    format!("{}_{}", prefix, safe)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// 고정 응답을 돌려주는 로컬 HTTP 서버를 띄우고 base URL 반환
    ///
    /// 등록되지 않은 경로(robots.txt 포함)는 404로 응답합니다.
    async fn spawn_site(pages: Vec<(&str, String)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let map: Arc<HashMap<String, String>> = Arc::new(
            pages.into_iter().map(|(p, b)| (p.to_string(), b)).collect(),
        );

        tokio::spawn(async move {
            loop {
                let Ok((mut sock, _)) = listener.accept().await else {
                    break;
                };
                let map = map.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = sock.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_string();
                    let path = request
                        .split_whitespace()
                        .nth(1)
                        .unwrap_or("/")
                        .to_string();
                    let response = match map.get(&path) {
                        Some(body) => format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n\
                             Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        ),
                        None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\
                                 Connection: close\r\n\r\n"
                            .to_string(),
                    };
                    let _ = sock.write_all(response.as_bytes()).await;
                });
            }
        });

        format!("http://{}/", addr)
    }

    /// 본문이 MIN_CONTENT_LEN을 넘는 페이지 HTML 생성
    fn fixture_page(links: &[&str]) -> String {
        let filler = "학과 공지사항 본문입니다 충분히 긴 내용의 텍스트. ".repeat(30);
        let anchors: String = links
            .iter()
            .map(|link| format!("<a href=\"{}\">링크</a>", link))
            .collect();
        format!(
            "<html><head><title>공지</title></head>\
             <body><main><p>{}</p>{}</main></body></html>",
            filler, anchors
        )
    }

    fn fixture_job(base: &str, max_pages: usize, max_depth: usize) -> CrawlJob {
        CrawlJob {
            start_urls: vec![Url::parse(base).unwrap()],
            allow_prefixes: vec![base.to_string()],
            max_pages,
            max_depth,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_crawl_visits_each_url_once_within_scope_and_depth() {
        // "/"(깊이 0) -> p1, p2(깊이 1) -> p3(깊이 2) -> p4(깊이 3, 제외)
        // "/"는 p1을 두 번, 다른 오리진 링크를 한 번 담고 있음
        let base = spawn_site(vec![
            ("/", fixture_page(&["/p1", "/p2", "/p1", "http://127.0.0.1:9/out"])),
            ("/p1", fixture_page(&["/p3"])),
            ("/p2", fixture_page(&[])),
            ("/p3", fixture_page(&["/p4"])),
            ("/p4", fixture_page(&[])),
        ])
        .await;

        let dir = TempDir::new().unwrap();
        let crawler = Crawler::new(dir.path().join("attachments")).unwrap();
        let outcome = crawler.crawl(&fixture_job(&base, 10, 2)).await.unwrap();

        let urls: Vec<String> = outcome.pages.iter().map(|p| p.url.to_string()).collect();

        // 허용 접두 밖 URL은 방문하지 않음
        assert!(urls.iter().all(|u| u.starts_with(&base)));
        // 같은 URL을 두 번 방문하지 않음
        let unique: std::collections::HashSet<&String> = urls.iter().collect();
        assert_eq!(unique.len(), urls.len());
        // 깊이 2의 p3까지만 수집, 깊이 3의 p4는 큐잉되지 않음
        assert!(urls.iter().any(|u| u.ends_with("/p3")));
        assert!(!urls.iter().any(|u| u.ends_with("/p4")));
        assert_eq!(urls.len(), 4);
    }

    #[tokio::test]
    async fn test_crawl_output_bounded_by_max_pages() {
        let base = spawn_site(vec![
            ("/", fixture_page(&["/p1", "/p2", "/p3"])),
            ("/p1", fixture_page(&[])),
            ("/p2", fixture_page(&[])),
            ("/p3", fixture_page(&[])),
        ])
        .await;

        let dir = TempDir::new().unwrap();
        let crawler = Crawler::new(dir.path().join("attachments")).unwrap();
        let outcome = crawler.crawl(&fixture_job(&base, 2, 2)).await.unwrap();

        // 큐에 후보가 남아 있어도 결과 페이지는 max_pages에서 멈춤
        assert_eq!(outcome.pages.len(), 2);
    }

    #[test]
    fn test_in_scope_prefix_match() {
        let prefixes = vec!["https://cse.example.ac.kr/".to_string()];
        let inside = Url::parse("https://cse.example.ac.kr/notice/1").unwrap();
        let outside = Url::parse("https://other.example.com/page").unwrap();
        assert!(in_scope(&inside, &prefixes));
        assert!(!in_scope(&outside, &prefixes));
    }

    #[test]
    fn test_in_scope_empty_allowlist_permits_all() {
        let url = Url::parse("https://anywhere.example.com/").unwrap();
        assert!(in_scope(&url, &[]));
    }

    #[test]
    fn test_attachment_filename_stable_and_safe() {
        let url = Url::parse("https://cse.example.ac.kr/files/졸업 요건.pdf").unwrap();
        let a = attachment_filename(&url);
        let b = attachment_filename(&url);
        assert_eq!(a, b);
        assert!(a.ends_with(".pdf"));
        assert!(!a.contains(' '));
    }

    #[test]
    fn test_attachment_filename_no_path_segment() {
        let url = Url::parse("https://cse.example.ac.kr/").unwrap();
        let name = attachment_filename(&url);
        assert!(name.ends_with("_attachment"));
    }
}
