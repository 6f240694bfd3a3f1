//! OddEyes TM - Translation Memory Engine
//!
//! 번역 메모리 저장/조회/매칭을 담당하는 백엔드 라이브러리입니다.
//! HTTP/GUI 표면 레이어는 이 크레이트를 호출하는 외부 협력자이며,
//! 여기에는 세그먼트 저장소, 세그먼터, 매처, 서비스만 포함됩니다.

pub mod db;
pub mod error;
pub mod exchange;
pub mod matcher;
pub mod models;
pub mod segmenter;
pub mod service;
pub mod text;

pub use db::Database;
pub use error::{ApiError, ApiResult, TmError};
pub use matcher::{Matcher, TmMatch};
pub use models::{
    MatchConfig, MatchType, NewSegment, SegmentConfig, SegmentMode, SourceType, TmSegment,
    TranslationMemory,
};
pub use segmenter::Segmenter;
pub use service::{LookupResult, ProcessResult, TmService, TmState};
