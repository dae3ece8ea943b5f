//! 이미지 텍스트 추출 - Tesseract OCR 호출
//!
//! 로컬 `tesseract` 바이너리를 호출합니다. 언어는 OCR_LANG 환경변수로
//! 지정하며 기본값은 한국어+영어입니다.

use std::path::Path;

use tokio::process::Command;

use super::{ExtractError, ExtractResult};

const DEFAULT_OCR_LANG: &str = "kor+eng";

/// 이미지에서 OCR로 텍스트 추출
pub async fn extract_text_from_image(path: &Path) -> ExtractResult<String> {
    let lang = std::env::var("OCR_LANG").unwrap_or_else(|_| DEFAULT_OCR_LANG.to_string());

    // stdout 출력 모드 ("-"가 출력 파일명)
    let output = Command::new("tesseract")
        .arg(path)
        .arg("-")
        .args(["-l", &lang])
        .output()
        .await
        .map_err(|_| ExtractError::ToolMissing {
            tool: "tesseract".to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::Conversion {
            path: path.to_path_buf(),
            message: format!("tesseract: {}", stderr.trim()),
        });
    }

    let text = String::from_utf8_lossy(&output.stdout).to_string();
    if text.trim().is_empty() {
        tracing::debug!("OCR produced no text: {:?}", path);
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lang_constant() {
        assert!(DEFAULT_OCR_LANG.contains("kor"));
    }
}
