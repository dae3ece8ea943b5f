//! PDF 텍스트 추출 - pdf-extract 크레이트 사용

use std::path::Path;

use super::{ExtractError, ExtractResult};

/// PDF 파일에서 전체 텍스트 추출
///
/// 스캔본 PDF는 텍스트 레이어가 없어 빈 문자열이 나올 수 있습니다.
pub fn extract_text_from_pdf(path: &Path) -> ExtractResult<String> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let text =
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ExtractError::Conversion {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if text.trim().is_empty() {
        tracing::warn!("No text layer in PDF (scanned document?): {:?}", path);
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_io_error() {
        let result = extract_text_from_pdf(Path::new("/nonexistent/file.pdf"));
        assert!(matches!(result, Err(ExtractError::Io { .. })));
    }
}
