//! 키워드 랭커 - 가중 단어빈도 기반 어휘 검색
//!
//! 쿼리와 문서를 토큰화하여 제목 2배 가중 단어빈도로 스코어링합니다.
//! 부스트(숫자 토큰, 우선 키워드, 카테고리 별칭)는 코드가 아닌
//! 설정 데이터이며, 비활성화하면 기본 공식으로 정확히 환원됩니다.

use serde::{Deserialize, Serialize};

use super::store::DocRecord;

/// 키워드 후보 상한
pub const KEYWORD_CANDIDATE_LIMIT: usize = 30;

// ============================================================================
// Tokenizer
// ============================================================================

/// 토큰화: ASCII 영숫자 또는 한글 음절의 최대 연속 구간
///
/// 소문자로 변환하며, 2자 미만 토큰은 버립니다 (조사/단일 문자 노이즈 억제).
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if is_token_char(ch) {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens.retain(|t| t.chars().count() >= 2);
    tokens
}

#[inline]
fn is_token_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ('가'..='힣').contains(&ch)
}

/// 부분 문자열 출현 횟수 (비중첩)
fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

// ============================================================================
// Boost Configuration
// ============================================================================

/// 카테고리 별칭 집합
///
/// 쿼리에서 카테고리를 탐지하고 문서 제목/URL과 대조합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub aliases: Vec<String>,
}

impl Category {
    /// 별칭 중 하나가 텍스트에 포함되는지 확인 (소문자 기준)
    fn matches(&self, text: &str) -> bool {
        self.aliases.iter().any(|a| text.contains(&a.to_lowercase()))
    }
}

/// 키워드 랭킹 부스트 설정
///
/// 특정 배포의 분류 체계에 묶인 값들이므로 설정 파일로 주입합니다.
/// 모든 배율이 1.0이고 카테고리가 비어 있으면 기본 공식과 동일합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostConfig {
    /// 숫자로만 이루어진 토큰의 배율 (학점/연도 등 정확한 수치 질의용)
    #[serde(default = "default_multiplier")]
    pub numeric_boost: f32,
    /// 우선 키워드 집합 (예: 졸업요건 관련 고정 용어)
    #[serde(default)]
    pub priority_keywords: Vec<String>,
    /// 우선 키워드 토큰의 배율
    #[serde(default = "default_multiplier")]
    pub priority_boost: f32,
    /// 카테고리 별칭 테이블
    #[serde(default)]
    pub categories: Vec<Category>,
    /// 탐지된 카테고리와 일치하는 문서의 배율
    #[serde(default = "default_multiplier")]
    pub category_boost: f32,
    /// 다른 카테고리와 일치하는 문서의 배율 (1.0 미만이면 감점)
    #[serde(default = "default_multiplier")]
    pub category_penalty: f32,
}

fn default_multiplier() -> f32 {
    1.0
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self::none()
    }
}

impl BoostConfig {
    /// 부스트 없음 - 기본 단어빈도 공식으로 환원
    pub fn none() -> Self {
        Self {
            numeric_boost: 1.0,
            priority_keywords: Vec::new(),
            priority_boost: 1.0,
            categories: Vec::new(),
            category_boost: 1.0,
            category_penalty: 1.0,
        }
    }

    /// JSON 설정 파일에서 로드
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("부스트 설정 읽기 실패: {:?}", path))?;
        serde_json::from_str(&data).with_context(|| format!("부스트 설정 파싱 실패: {:?}", path))
    }

    /// 토큰별 가중치 배율
    fn token_weight(&self, token: &str) -> f32 {
        let mut weight = 1.0;
        if token.chars().all(|c| c.is_ascii_digit()) {
            weight *= self.numeric_boost;
        }
        if self.priority_keywords.iter().any(|k| k.to_lowercase() == token) {
            weight *= self.priority_boost;
        }
        weight
    }

    /// 쿼리에서 대상 카테고리 탐지 (첫 번째 일치)
    fn detect_category(&self, query_lower: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.matches(query_lower))
    }
}

// ============================================================================
// Ranker
// ============================================================================

/// 키워드 검색 결과 (문서 스냅샷 내 인덱스 + 스코어)
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub index: usize,
    pub score: f32,
}

/// 키워드 랭킹
///
/// 매칭 토큰 `t`마다 `2.0 * count(t, 제목) + 1.0 * count(t, 본문)`을 더하고,
/// 스코어가 0보다 큰 문서만 내림차순으로 정렬하여 `limit`개 반환합니다.
pub fn rank(
    query: &str,
    docs: &[DocRecord],
    limit: usize,
    boosts: &BoostConfig,
) -> Vec<KeywordHit> {
    let q_tokens = tokenize(query);
    if q_tokens.is_empty() {
        return Vec::new();
    }

    let query_lower = query.to_lowercase();
    let target = boosts.detect_category(&query_lower);

    let mut hits = Vec::new();

    for (index, doc) in docs.iter().enumerate() {
        let text = doc.text.to_lowercase();
        let title = doc.title.to_lowercase();
        if text.is_empty() && title.is_empty() {
            continue;
        }

        let mut score = 0.0f32;
        for token in &q_tokens {
            let weight = boosts.token_weight(token);
            score += weight * 2.0 * count_occurrences(&title, token) as f32;
            score += weight * 1.0 * count_occurrences(&text, token) as f32;
        }

        if score <= 0.0 {
            continue;
        }

        // 카테고리 부스트: 대상 카테고리 문서는 가산, 다른 카테고리 문서는 감산
        if let Some(target) = target {
            let url_lower = doc.url.to_lowercase();
            if target.matches(&title) || target.matches(&url_lower) {
                score *= boosts.category_boost;
            } else if boosts
                .categories
                .iter()
                .any(|c| c.name != target.name && (c.matches(&title) || c.matches(&url_lower)))
            {
                score *= boosts.category_penalty;
            }
        }

        hits.push(KeywordHit { index, score });
    }

    // 동점은 문서 순서 유지 (안정 정렬)
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(limit);
    hits
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::store::SourceType;

    fn doc(url: &str, title: &str, text: &str) -> DocRecord {
        DocRecord {
            text: text.to_string(),
            url: url.to_string(),
            title: title.to_string(),
            chunk_id: "test_0".to_string(),
            source_type: SourceType::Html,
            fetched_at: 0,
            attachment_url: None,
            attachment_path: None,
        }
    }

    #[test]
    fn test_tokenize_mixed_korean_english() {
        let tokens = tokenize("졸업요건 Computer Science 2024");
        assert_eq!(tokens, vec!["졸업요건", "computer", "science", "2024"]);
    }

    #[test]
    fn test_tokenize_drops_short_tokens() {
        // 1자 토큰(조사 등)은 제거
        let tokens = tokenize("a 밥 to 먹다");
        assert_eq!(tokens, vec!["to", "먹다"]);
    }

    #[test]
    fn test_tokenize_splits_on_punctuation() {
        let tokens = tokenize("현장실습(인턴십) - 신청");
        assert_eq!(tokens, vec!["현장실습", "인턴십", "신청"]);
    }

    #[test]
    fn test_title_weighted_double() {
        let docs = vec![
            doc("u1", "현장실습 안내", "내용"),
            doc("u2", "안내", "현장실습 내용"),
        ];
        let hits = rank("현장실습", &docs, 10, &BoostConfig::none());
        assert_eq!(hits.len(), 2);
        // 제목 매칭(2.0)이 본문 매칭(1.0)보다 앞섬
        assert_eq!(hits[0].index, 0);
        assert_eq!(hits[0].score, 2.0);
        assert_eq!(hits[1].score, 1.0);
    }

    #[test]
    fn test_zero_score_excluded() {
        let docs = vec![doc("u1", "무관한 문서", "전혀 다른 내용")];
        let hits = rank("현장실습", &docs, 10, &BoostConfig::none());
        assert!(hits.is_empty());
    }

    #[test]
    fn test_empty_query_returns_empty() {
        let docs = vec![doc("u1", "제목", "내용")];
        assert!(rank("", &docs, 10, &BoostConfig::none()).is_empty());
        assert!(rank("! @ #", &docs, 10, &BoostConfig::none()).is_empty());
    }

    #[test]
    fn test_limit_respected() {
        let docs: Vec<DocRecord> = (0..50)
            .map(|i| doc(&format!("u{}", i), "공지", "공지 내용"))
            .collect();
        let hits = rank("공지", &docs, 30, &BoostConfig::none());
        assert_eq!(hits.len(), 30);
    }

    #[test]
    fn test_numeric_boost() {
        let docs = vec![
            doc("u1", "", "졸업 학점 130"),
            doc("u2", "", "졸업 학점 안내"),
        ];
        let boosts = BoostConfig {
            numeric_boost: 3.0,
            ..BoostConfig::none()
        };
        let hits = rank("130 학점", &docs, 10, &boosts);
        assert_eq!(hits[0].index, 0);
        // u1: 학점(1.0) + 130(1.0 * 3.0) = 4.0
        assert_eq!(hits[0].score, 4.0);
    }

    #[test]
    fn test_category_boost_and_penalty() {
        let categories = vec![
            Category {
                name: "dormitory".to_string(),
                aliases: vec!["기숙사".to_string(), "생활관".to_string()],
            },
            Category {
                name: "scholarship".to_string(),
                aliases: vec!["장학".to_string()],
            },
        ];
        let boosts = BoostConfig {
            categories,
            category_boost: 2.0,
            category_penalty: 0.5,
            ..BoostConfig::none()
        };

        let docs = vec![
            doc("u1", "생활관 입사 안내", "입사 신청 방법"),
            doc("u2", "장학 신청 안내", "입사 신청 방법"),
        ];

        let hits = rank("기숙사 입사 신청", &docs, 10, &boosts);
        assert_eq!(hits[0].index, 0);
        // u1은 대상 카테고리(기숙사/생활관) 일치로 부스트,
        // u2는 다른 카테고리(장학) 일치로 감점
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_boost_free_mode_equals_base_formula() {
        let docs = vec![doc("u1", "장학 공지 2024", "장학금 신청 2024")];
        let base = rank("장학 2024", &docs, 10, &BoostConfig::none());
        let with_default = rank("장학 2024", &docs, 10, &BoostConfig::default());
        assert_eq!(base[0].score, with_default[0].score);
    }
}
