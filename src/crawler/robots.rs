//! robots.txt 검사 - 오리진별 캐시 + 단순 Disallow 접두 매칭
//!
//! 완전한 robots 표준 파서가 아니라 줄 단위 접두 매칭만 수행합니다.
//! robots.txt를 가져오지 못하면 (200이 아니거나 네트워크 오류)
//! 허용으로 간주합니다.

use std::collections::HashMap;

use tokio::sync::Mutex;
use url::Url;

/// 오리진별 robots.txt 캐시
///
/// `None`은 robots.txt 없음/실패 (허용), `Some`은 Disallow 접두 목록입니다.
pub struct RobotsCache {
    client: reqwest::Client,
    cache: Mutex<HashMap<String, Option<Vec<String>>>>,
}

impl RobotsCache {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// URL의 경로가 robots.txt에 의해 허용되는지 확인
    pub async fn allows(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();

        let rules = {
            let mut cache = self.cache.lock().await;
            match cache.get(&origin) {
                Some(rules) => rules.clone(),
                None => {
                    let fetched = self.fetch_rules(&origin).await;
                    cache.insert(origin.clone(), fetched.clone());
                    fetched
                }
            }
        };

        match rules {
            None => true,
            Some(disallows) => {
                let path = url.path();
                !disallows
                    .iter()
                    .any(|prefix| !prefix.is_empty() && path.starts_with(prefix.as_str()))
            }
        }
    }

    /// robots.txt 조회 (실패 시 None = 허용)
    async fn fetch_rules(&self, origin: &str) -> Option<Vec<String>> {
        let robots_url = format!("{}/robots.txt", origin);

        let response = match self.client.get(&robots_url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!("robots.txt fetch failed for {}: {}", origin, e);
                return None;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            return None;
        }

        match response.text().await {
            Ok(text) => Some(parse_disallow_rules(&text)),
            Err(e) => {
                tracing::debug!("robots.txt body read failed for {}: {}", origin, e);
                None
            }
        }
    }
}

/// Disallow 줄만 추출하는 단순 파서
///
/// User-agent 구분 없이 모든 Disallow 접두를 수집합니다.
pub fn parse_disallow_rules(text: &str) -> Vec<String> {
    let mut rules = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let lower = line.to_lowercase();
        if lower.starts_with("disallow:") {
            if let Some((_, value)) = line.split_once(':') {
                let value = value.trim();
                if !value.is_empty() {
                    rules.push(value.to_string());
                }
            }
        }
    }

    rules
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_disallow_rules() {
        let text = "User-agent: *\nDisallow: /admin\nDisallow: /private/\nAllow: /public";
        let rules = parse_disallow_rules(text);
        assert_eq!(rules, vec!["/admin".to_string(), "/private/".to_string()]);
    }

    #[test]
    fn test_parse_skips_comments_and_empty_disallow() {
        let text = "# comment\nDisallow:\nDisallow: /secret";
        let rules = parse_disallow_rules(text);
        assert_eq!(rules, vec!["/secret".to_string()]);
    }

    #[test]
    fn test_parse_case_insensitive_key() {
        let rules = parse_disallow_rules("disallow: /a\nDISALLOW: /b");
        assert_eq!(rules.len(), 2);
    }

    #[tokio::test]
    async fn test_cached_rules_prefix_match() {
        let cache = RobotsCache::new(reqwest::Client::new());

        // 캐시에 직접 규칙 주입 (네트워크 없이 매칭 로직 검증)
        {
            let mut guard = cache.cache.lock().await;
            guard.insert(
                "https://example.com".to_string(),
                Some(vec!["/admin".to_string()]),
            );
        }

        let blocked = Url::parse("https://example.com/admin/page").unwrap();
        let allowed = Url::parse("https://example.com/notice/1").unwrap();
        assert!(!cache.allows(&blocked).await);
        assert!(cache.allows(&allowed).await);
    }

    #[tokio::test]
    async fn test_permissive_when_no_rules() {
        let cache = RobotsCache::new(reqwest::Client::new());
        {
            let mut guard = cache.cache.lock().await;
            guard.insert("https://example.com".to_string(), None);
        }

        let url = Url::parse("https://example.com/anything").unwrap();
        assert!(cache.allows(&url).await);
    }
}
