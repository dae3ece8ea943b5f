//! HTML 추출 - 제목/본문 텍스트와 첨부파일 링크 탐지
//!
//! 본문은 main/article 등 콘텐츠 컨테이너의 블록 요소에서 모으고,
//! 너무 짧으면 body 전체 텍스트로 폴백합니다.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::AttachmentKind;

/// 구조적 추출이 이 길이 미만이면 전체 텍스트로 폴백
const STRUCTURED_MIN_LEN: usize = 400;

/// 추출된 페이지 콘텐츠
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub title: String,
    pub text: String,
}

/// 탐지된 첨부파일 링크 (다운로드 전)
#[derive(Debug, Clone)]
pub struct AttachmentLink {
    pub kind: AttachmentKind,
    pub url: Url,
}

// ============================================================================
// Page Extraction
// ============================================================================

/// HTML에서 제목과 본문 텍스트 추출
pub fn extract_page(html: &str) -> ExtractedPage {
    let document = Html::parse_document(html);

    let title = extract_title(&document);

    // 우선순위: main > article > #content > .content > body
    let container_selectors = ["main", "article", "#content", ".content", "body"];
    let mut text = String::new();

    for selector_str in container_selectors {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(container) = document.select(&selector).next() {
                text = collect_block_text(&container);
                if text.chars().count() >= STRUCTURED_MIN_LEN {
                    break;
                }
            }
        }
    }

    // 구조적 추출이 빈약하면 보이는 텍스트 전체로 폴백
    if text.chars().count() < STRUCTURED_MIN_LEN {
        if let Ok(selector) = Selector::parse("body") {
            if let Some(body) = document.select(&selector).next() {
                let full: String = body.text().collect::<Vec<_>>().join(" ");
                if full.chars().count() > text.chars().count() {
                    text = full;
                }
            }
        }
    }

    ExtractedPage {
        title,
        text: normalize_whitespace(&text),
    }
}

fn extract_title(document: &Html) -> String {
    if let Ok(selector) = Selector::parse("title") {
        if let Some(element) = document.select(&selector).next() {
            let title = element.text().collect::<String>().trim().to_string();
            if !title.is_empty() {
                return title;
            }
        }
    }

    if let Ok(selector) = Selector::parse("h1") {
        if let Some(element) = document.select(&selector).next() {
            return element.text().collect::<String>().trim().to_string();
        }
    }

    String::new()
}

/// 블록 요소(h1-h6, p, li, td, th, pre)에서 텍스트 수집
fn collect_block_text(container: &ElementRef) -> String {
    let block_selector =
        match Selector::parse("h1, h2, h3, h4, h5, h6, p, li, td, th, pre") {
            Ok(s) => s,
            Err(_) => return String::new(),
        };

    let mut parts = Vec::new();
    for element in container.select(&block_selector) {
        let text: String = element.text().collect::<Vec<_>>().join(" ");
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
    }

    parts.join("\n\n")
}

/// 연속 공백을 하나로 정리
pub fn normalize_whitespace(text: &str) -> String {
    if let Ok(re) = Regex::new(r"\s+") {
        re.replace_all(text, " ").trim().to_string()
    } else {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

// ============================================================================
// Link Discovery
// ============================================================================

/// 첨부파일 링크 탐지
///
/// - `<img src>`: 이미지 확장자만
/// - `<a href>`: pdf / hwp / doc / docx
pub fn discover_attachments(html: &str, page_url: &Url) -> Vec<AttachmentLink> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("img[src]") {
        for element in document.select(&selector) {
            let Some(src) = element.value().attr("src") else {
                continue;
            };
            let Ok(resolved) = page_url.join(src) else {
                continue;
            };
            let lower = resolved.as_str().to_lowercase();
            if [".jpg", ".jpeg", ".png", ".gif", ".bmp"]
                .iter()
                .any(|ext| lower.ends_with(ext))
            {
                links.push(AttachmentLink {
                    kind: AttachmentKind::Image,
                    url: resolved,
                });
            }
        }
    }

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let Ok(resolved) = page_url.join(href) else {
                continue;
            };
            let lower = resolved.as_str().to_lowercase();

            let kind = if lower.contains(".pdf") {
                Some(AttachmentKind::Pdf)
            } else if lower.contains(".hwp") {
                Some(AttachmentKind::Hwp)
            } else if lower.ends_with(".doc") || lower.contains(".docx") {
                Some(AttachmentKind::Docx)
            } else {
                None
            };

            if let Some(kind) = kind {
                links.push(AttachmentLink {
                    kind,
                    url: resolved,
                });
            }
        }
    }

    links
}

/// 페이지 내 일반 링크 탐지 (mailto/tel 제외, fragment 제거)
pub fn discover_links(html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let mut links = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if href.starts_with("mailto:") || href.starts_with("tel:") || href.starts_with('#') {
                continue;
            }
            if let Ok(mut resolved) = base.join(href) {
                resolved.set_fragment(None);
                links.push(resolved);
            }
        }
    }

    links
}

// ============================================================================
// Tests
// ============================================================================
