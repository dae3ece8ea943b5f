//! 텍스트 청킹 모듈
//!
//! 정제된 본문을 고정 크기 윈도우로 분할합니다.
//! 윈도우 경계가 단어 중간에 걸리면 공백까지 확장하고,
//! 연속 청크는 지정된 문자 수만큼 겹칩니다.

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 단어 경계 확장 한계 (chunk_size 초과 허용 문자 수)
const WORD_BOUNDARY_SLACK: usize = 40;

/// 청킹 설정
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    /// 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 청크 간 겹침 (문자 수)
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1800,
            overlap: 250,
        }
    }
}

impl ChunkConfig {
    /// 설정대로 텍스트 분할
    pub fn split(&self, text: &str) -> Vec<String> {
        split_text(text, self.chunk_size, self.overlap)
    }
}

// ============================================================================
// Splitter
// ============================================================================

/// 텍스트를 겹치는 청크로 분할
///
/// 문자(char) 단위로 동작하므로 한글 텍스트에서도 안전합니다.
/// `chunk_size == 0`이면 전체 텍스트를 하나의 청크로 반환합니다.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if chunk_size == 0 {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = (start + chunk_size).min(len);

        // 단어 중간에서 끊기면 공백까지 확장 (최대 chunk_size + 40자)
        while end < len
            && !chars[end].is_whitespace()
            && (end - start) < chunk_size + WORD_BOUNDARY_SLACK
        {
            end += 1;
        }

        chunks.push(chars[start..end].iter().collect());

        if end >= len {
            break;
        }

        // 다음 윈도우는 overlap만큼 되돌아가서 시작하되, 항상 전진을 보장
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert!(split_text("", 10, 3).is_empty());
    }

    #[test]
    fn test_zero_chunk_size_returns_whole_text() {
        let chunks = split_text("hello world", 0, 3);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text("abc", 10, 3);
        assert_eq!(chunks, vec!["abc".to_string()]);
    }

    #[test]
    fn test_overlap_between_chunks() {
        // 공백 없는 텍스트: 경계 확장이 +40 한계까지 밀린 뒤 잘림
        let text: String = std::iter::repeat('x').take(100).collect();
        let chunks = split_text(&text, 20, 5);

        // 확장 한계(20+40=60)에서 잘리므로 첫 청크는 60자
        assert_eq!(chunks[0].chars().count(), 60);
        // 연속 청크는 5자씩 겹침
        let first_tail: String = chunks[0].chars().skip(60 - 5).collect();
        let second_head: String = chunks[1].chars().take(5).collect();
        assert_eq!(first_tail, second_head);
    }

    #[test]
    fn test_word_boundary_extension() {
        // 25자 문자열, chunk_size=10: 경계가 단어 중간이면 공백까지 확장
        let text = "word1 word2 word3 word4x";
        let chunks = split_text(text, 10, 3);

        // 확장 여유 내에 공백이 있는 한 청크는 단어 중간에서 끝나지 않음
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.ends_with(char::is_whitespace) || chunk.ends_with(|c: char| !c.is_alphanumeric()) || {
                // 청크 다음 문자가 공백인 경우: 원문에서 확인
                let pos = text.find(chunk.as_str()).unwrap() + chunk.len();
                pos >= text.len() || text[pos..].starts_with(char::is_whitespace)
            });
        }
        assert!(!chunks.is_empty());
    }

    #[test]
    fn test_reconstruction_without_overlap() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = split_text(text, 12, 0);
        let joined: String = chunks.concat();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_overlap_reconstruction() {
        // overlap 제거 후 이어붙이면 원문 복원
        let text = "가나다라 마바사아 자차카타 파하";
        let overlap = 3;
        let chunks = split_text(text, 8, overlap);
        assert!(chunks.len() > 1);

        let mut rebuilt: String = chunks[0].clone();
        for chunk in &chunks[1..] {
            let tail: String = chunk.chars().skip(overlap).collect();
            rebuilt.push_str(&tail);
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn test_terminates_with_large_overlap() {
        // overlap >= chunk_size여도 전진이 보장되어야 함
        let text = "a b c d e f g h i j k l m n o p";
        let chunks = split_text(text, 4, 10);
        assert!(!chunks.is_empty());
        assert!(chunks.len() <= text.len());
    }

    #[test]
    fn test_hangul_char_counting() {
        // 바이트가 아닌 문자 단위로 분할
        let text = "한글 텍스트 분할 테스트 입니다";
        let chunks = split_text(text, 6, 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 6 + 40));
    }
}
