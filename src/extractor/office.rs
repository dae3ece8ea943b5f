//! 오피스 문서 텍스트 추출 - 외부 변환 도구 호출
//!
//! - HWP: `hwp5txt` (pyhwp 패키지)
//! - DOC/DOCX: `pandoc`
//!
//! 도구가 설치되지 않은 환경에서는 추출이 실패하고, 호출 측에서
//! 해당 첨부파일을 건너뜁니다.

use std::path::Path;

use tokio::process::Command;

use super::{ExtractError, ExtractResult};

/// HWP 파일에서 텍스트 추출 (hwp5txt 호출)
pub async fn extract_text_from_hwp(path: &Path) -> ExtractResult<String> {
    let path_arg = path.to_string_lossy().to_string();
    run_converter("hwp5txt", &[&path_arg], path).await
}

/// DOC/DOCX 파일에서 텍스트 추출 (pandoc 호출)
pub async fn extract_text_from_docx(path: &Path) -> ExtractResult<String> {
    let path_arg = path.to_string_lossy().to_string();
    run_converter("pandoc", &["-t", "plain", &path_arg], path).await
}

async fn run_converter(program: &str, args: &[&str], source: &Path) -> ExtractResult<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|_| ExtractError::ToolMissing {
            tool: program.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::Conversion {
            path: source.to_path_buf(),
            message: format!("{}: {}", program, stderr.trim()),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_converter_is_error() {
        let result = run_converter(
            "definitely-not-a-real-command",
            &["x"],
            Path::new("x.hwp"),
        )
        .await;
        assert!(matches!(result, Err(ExtractError::ToolMissing { .. })));
    }
}
