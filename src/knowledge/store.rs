//! 문서 저장소 - JSONL 기반 append-only 청크 저장
//!
//! 청크 하나가 한 줄의 JSON 객체로 저장됩니다 (docstore.jsonl).
//! 수집 중에는 추가만 하고, 검색은 메모리에 올린 불변 스냅샷을 사용합니다.
//! 스냅샷 교체는 Arc 스왑이므로 수집과 검색이 겹쳐도 안전합니다.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.campus-rag/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".campus-rag")
}

// ============================================================================
// Types
// ============================================================================

/// 청크 출처 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Html,
    Pdf,
    Docx,
    Hwp,
    Image,
}

/// 저장되는 문서 레코드 (청크 1개)
///
/// `url`과 `text`는 항상 존재해야 하며, 스코어는 질의 시점에만 붙고
/// 절대 영속화되지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocRecord {
    pub text: String,
    pub url: String,
    #[serde(default)]
    pub title: String,
    pub chunk_id: String,
    pub source_type: SourceType,
    /// 수집 시각 (unix 초)
    pub fetched_at: i64,
    /// 첨부파일 원본 URL (첨부 유래 청크만)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    /// 첨부파일 로컬 경로 (첨부 유래 청크만)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment_path: Option<String>,
}

/// 불변 스냅샷 - 질의 한 번이 바라보는 저장소 상태
pub type Snapshot = Arc<Vec<DocRecord>>;

// ============================================================================
// DocStore
// ============================================================================

/// JSONL 문서 저장소
pub struct DocStore {
    path: PathBuf,
    snapshot: RwLock<Snapshot>,
}

impl DocStore {
    /// 저장소 열기 (파일이 없으면 빈 상태로 시작)
    ///
    /// 파싱 불가능한 줄은 해당 줄만 버리고 로드를 계속합니다.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("저장소 디렉토리 생성 실패")?;
            }
        }

        let records = if path.exists() {
            load_jsonl(path)?
        } else {
            Vec::new()
        };

        tracing::debug!("Doc store loaded: {} records from {:?}", records.len(), path);

        Ok(Self {
            path: path.to_path_buf(),
            snapshot: RwLock::new(Arc::new(records)),
        })
    }

    /// 저장소 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 현재 스냅샷 (Arc clone, 복사 없음)
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 레코드 수
    pub fn count(&self) -> usize {
        self.snapshot().len()
    }

    /// 레코드 추가 (파일에 append 후 새 스냅샷으로 교체)
    ///
    /// 기존 스냅샷을 쥔 질의는 이전 상태를 계속 보게 됩니다.
    pub fn append(&self, records: &[DocRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("저장소 파일 열기 실패: {:?}", self.path))?;

        for record in records {
            let line = serde_json::to_string(record).context("레코드 직렬화 실패")?;
            writeln!(file, "{}", line).context("저장소 쓰기 실패")?;
        }

        // copy-on-write: 새 Vec을 만들어 Arc 교체
        let current = self.snapshot();
        let mut next = Vec::with_capacity(current.len() + records.len());
        next.extend_from_slice(&current);
        next.extend_from_slice(records);

        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(next);

        tracing::info!("Appended {} records (total {})", records.len(), guard.len());
        Ok(records.len())
    }
}

/// JSONL 파일 로드 - 손상된 줄은 개별적으로 버림
fn load_jsonl(path: &Path) -> Result<Vec<DocRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("저장소 파일 열기 실패: {:?}", path))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    let mut dropped = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("저장소 파일 읽기 실패")?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<DocRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                dropped += 1;
                tracing::warn!("Dropping corrupt docstore line {}: {}", line_no + 1, e);
            }
        }
    }

    if dropped > 0 {
        tracing::warn!("Dropped {} corrupt lines while loading docstore", dropped);
    }

    Ok(records)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(url: &str, text: &str) -> DocRecord {
        DocRecord {
            text: text.to_string(),
            url: url.to_string(),
            title: "제목".to_string(),
            chunk_id: "abc123_0".to_string(),
            source_type: SourceType::Html,
            fetched_at: 1_700_000_000,
            attachment_url: None,
            attachment_path: None,
        }
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = DocStore::open(&dir.path().join("docstore.jsonl")).unwrap();
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_append_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docstore.jsonl");

        let store = DocStore::open(&path).unwrap();
        store
            .append(&[record("https://example.com/a", "내용 1"), record("https://example.com/b", "내용 2")])
            .unwrap();
        assert_eq!(store.count(), 2);

        // 재오픈 시 동일하게 로드
        let reopened = DocStore::open(&path).unwrap();
        assert_eq!(reopened.count(), 2);
        assert_eq!(reopened.snapshot()[0].url, "https://example.com/a");
    }

    #[test]
    fn test_corrupt_line_dropped_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docstore.jsonl");

        let store = DocStore::open(&path).unwrap();
        store.append(&[record("https://example.com/a", "내용")]).unwrap();

        // 손상된 줄 삽입
        use std::io::Write as _;
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{ not json").unwrap();
        drop(file);

        let store2 = DocStore::open(&path).unwrap();
        store2.append(&[record("https://example.com/b", "내용 2")]).unwrap();

        let reopened = DocStore::open(&path).unwrap();
        assert_eq!(reopened.count(), 2);
    }

    #[test]
    fn test_snapshot_is_immutable_across_append() {
        let dir = TempDir::new().unwrap();
        let store = DocStore::open(&dir.path().join("docstore.jsonl")).unwrap();
        store.append(&[record("https://example.com/a", "내용")]).unwrap();

        let before = store.snapshot();
        store.append(&[record("https://example.com/b", "내용 2")]).unwrap();

        // 이전 스냅샷은 그대로, 새 스냅샷에만 반영
        assert_eq!(before.len(), 1);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_source_type_serialization() {
        let json = serde_json::to_string(&record("u", "t")).unwrap();
        assert!(json.contains("\"source_type\":\"html\""));
        // 스코어 필드는 영속화되지 않음
        assert!(!json.contains("score"));
    }
}
