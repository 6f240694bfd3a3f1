//! TM Error Types
//!
//! 번역 메모리 엔진 전역 에러 타입 정의

use serde::Serialize;
use thiserror::Error;

/// TM 엔진 에러
#[derive(Error, Debug)]
pub enum TmError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Translation memory not found: {0}")]
    TmNotFound(String),

    #[error("Segment not found: {0}")]
    SegmentNotFound(String),

    #[error("Duplicate segment: {0}")]
    DuplicateSegment(String),

    #[error("Import format error: {0}")]
    ImportFormat(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// API 응답용 직렬화 가능한 에러
///
/// 상위 레이어(HTTP/Tauri 커맨드)는 TmError를 그대로 노출하지 않고
/// 안정적인 code 문자열로 변환해 전달합니다.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl From<TmError> for ApiError {
    fn from(error: TmError) -> Self {
        let code = match &error {
            TmError::Database(_) => "DB_ERROR",
            TmError::Io(_) => "IO_ERROR",
            TmError::Serialization(_) => "SERIALIZATION_ERROR",
            TmError::TmNotFound(_) => "TM_NOT_FOUND",
            TmError::SegmentNotFound(_) => "SEGMENT_NOT_FOUND",
            TmError::DuplicateSegment(_) => "DUPLICATE_SEGMENT",
            TmError::ImportFormat(_) => "IMPORT_FORMAT_ERROR",
            TmError::InvalidOperation(_) => "INVALID_OPERATION",
        };

        ApiError {
            code: code.to_string(),
            message: error.to_string(),
            details: None,
        }
    }
}

/// API 결과 타입
pub type ApiResult<T> = Result<T, ApiError>;
