//! 첨부파일 콘텐츠 추출 모듈
//!
//! 다운로드된 첨부파일에서 텍스트를 추출합니다.
//! - PDF: pdf-extract
//! - HWP / DOC / DOCX: 외부 변환 도구 (hwp5txt, pandoc)
//! - 이미지: Tesseract OCR
//!
//! 추출 결과가 너무 짧으면 (표지 이미지, 빈 문서 등) 색인하지 않습니다.

pub mod image;
pub mod office;
pub mod pdf;

use std::path::{Path, PathBuf};

use crate::crawler::AttachmentKind;

/// 추출 텍스트 최소 길이 (이 미만이면 색인 제외)
pub const MIN_EXTRACT_LEN: usize = 50;

// ============================================================================
// Error
// ============================================================================

/// 추출 실패 원인
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("파일 읽기 실패 ({path:?}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("변환 도구 실행 실패: {tool} (설치되어 있나요?)")]
    ToolMissing { tool: String },

    #[error("변환 실패 ({path:?}): {message}")]
    Conversion { path: PathBuf, message: String },
}

pub type ExtractResult<T> = Result<T, ExtractError>;

// ============================================================================
// Attachment Extractor
// ============================================================================

/// 첨부파일 종류별 텍스트 추출 디스패처
pub struct AttachmentExtractor;

impl AttachmentExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 첨부파일에서 텍스트 추출
    ///
    /// 추출은 됐지만 의미 있는 분량이 아니면 `Ok(None)`을 반환합니다.
    pub async fn extract(
        &self,
        path: &Path,
        kind: AttachmentKind,
    ) -> ExtractResult<Option<String>> {
        let text = match kind {
            AttachmentKind::Pdf => {
                // CPU 바운드 작업이므로 블로킹 풀에서 실행
                let owned = path.to_path_buf();
                tokio::task::spawn_blocking(move || pdf::extract_text_from_pdf(&owned))
                    .await
                    .map_err(|e| ExtractError::Conversion {
                        path: path.to_path_buf(),
                        message: format!("추출 작업 중단: {}", e),
                    })??
            }
            AttachmentKind::Hwp => office::extract_text_from_hwp(path).await?,
            AttachmentKind::Docx => office::extract_text_from_docx(path).await?,
            AttachmentKind::Image => image::extract_text_from_image(path).await?,
        };

        let trimmed = text.trim();
        if trimmed.chars().count() < MIN_EXTRACT_LEN {
            tracing::debug!(
                "Extracted text too short ({} chars), skipping: {:?}",
                trimmed.chars().count(),
                path
            );
            return Ok(None);
        }

        Ok(Some(trimmed.to_string()))
    }
}

impl Default for AttachmentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extract_missing_pdf_is_error() {
        let extractor = AttachmentExtractor::new();
        let result = extractor
            .extract(Path::new("/nonexistent/file.pdf"), AttachmentKind::Pdf)
            .await;
        assert!(matches!(result, Err(ExtractError::Io { .. })));
    }

    #[test]
    fn test_error_display_names_tool() {
        let err = ExtractError::ToolMissing {
            tool: "hwp5txt".to_string(),
        };
        assert!(err.to_string().contains("hwp5txt"));
    }
}
