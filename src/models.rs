//! TM Data Models
//!
//! 번역 메모리 엔진의 핵심 엔티티와 설정 모델
//!
//! TmSegment의 파생 필드(source_hash/source_normalized/source_length)는
//! 항상 source_text로부터 재계산되며, 외부 입력으로 받지 않습니다.

use serde::{Deserialize, Serialize};

use crate::text;

/// 세그먼트 출처 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Machine,
    Human,
    Verified,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Machine => "machine",
            SourceType::Human => "human",
            SourceType::Verified => "verified",
        }
    }

    /// DB/임포트 문자열 파싱. 알 수 없는 값은 machine으로 취급합니다.
    pub fn parse(raw: &str) -> SourceType {
        match raw.trim().to_lowercase().as_str() {
            "human" => SourceType::Human,
            "verified" => SourceType::Verified,
            _ => SourceType::Machine,
        }
    }
}

impl Default for SourceType {
    fn default() -> Self {
        SourceType::Machine
    }
}

/// 매치 분류 밴드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    NearExact,
    Fuzzy,
    NoMatch,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::NearExact => "near_exact",
            MatchType::Fuzzy => "fuzzy",
            MatchType::NoMatch => "no_match",
        }
    }
}

/// 세그먼테이션 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentMode {
    Sentence,
    Paragraph,
    Smart,
}

/// 중복 세그먼트 처리 정책
///
/// - Strict: DuplicateSegment 에러
/// - Update: 기존 세그먼트의 target/메타데이터 갱신
/// - Skip: 기존 세그먼트 유지(no-op)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    Strict,
    Update,
    Skip,
}

/// 번역 메모리 (언어쌍 단위의 세그먼트 컬렉션)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationMemory {
    pub id: String,
    pub name: String,
    pub source_lang: String,
    pub target_lang: String,
    /// 도메인 태그 (예: "medical", "general")
    pub domain: String,
    /// 캐시된 집계: 세그먼트 수
    pub segment_count: u32,
    /// 캐시된 집계: 전체 단어 수
    pub total_words: u32,
    /// soft-delete 플래그
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TranslationMemory {
    pub fn new(name: &str, source_lang: &str, target_lang: &str, domain: &str) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        TranslationMemory {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            source_lang: source_lang.to_lowercase(),
            target_lang: target_lang.to_lowercase(),
            domain: if domain.trim().is_empty() {
                "general".to_string()
            } else {
                domain.to_string()
            },
            segment_count: 0,
            total_words: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// TM 세그먼트 (source→target 원자 단위)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmSegment {
    pub id: String,
    pub tm_id: String,
    pub source_text: String,
    pub target_text: String,
    /// source_text + 언어쌍의 content address (md5 hex)
    pub source_hash: String,
    /// 소문자화 + 공백 축약된 source_text
    pub source_normalized: String,
    /// source_text의 단어 수
    pub source_length: u32,
    /// 신뢰도 점수 (0.0–1.0)
    pub quality_score: f64,
    pub source_type: SourceType,
    pub usage_count: u32,
    pub last_used_at: Option<i64>,
    pub context_before: Option<String>,
    pub context_after: Option<String>,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TmSegment {
    /// 새 세그먼트 생성. 파생 필드는 여기서만 계산됩니다.
    pub fn new(tm: &TranslationMemory, input: &NewSegment) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let mut segment = TmSegment {
            id: uuid::Uuid::new_v4().to_string(),
            tm_id: tm.id.clone(),
            source_text: String::new(),
            target_text: input.target_text.clone(),
            source_hash: String::new(),
            source_normalized: String::new(),
            source_length: 0,
            quality_score: clamp_quality(input.quality_score.unwrap_or(0.5)),
            source_type: input.source_type.unwrap_or_default(),
            usage_count: 0,
            last_used_at: None,
            context_before: input.context_before.clone(),
            context_after: input.context_after.clone(),
            notes: input.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        segment.set_source_text(&tm.source_lang, &tm.target_lang, &input.source_text);
        segment
    }

    /// source_text 교체. hash/normalized/length를 함께 재계산합니다.
    pub fn set_source_text(&mut self, source_lang: &str, target_lang: &str, source_text: &str) {
        self.source_text = source_text.to_string();
        self.source_normalized = text::normalize(source_text);
        self.source_length = text::word_count(source_text);
        self.source_hash = text::source_hash(source_lang, target_lang, source_text);
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

/// quality_score를 [0,1]로 제한
pub fn clamp_quality(quality: f64) -> f64 {
    quality.clamp(0.0, 1.0)
}

/// 세그먼트 입력 DTO (learn/벌크 임포트 공용)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSegment {
    pub source_text: String,
    pub target_text: String,
    pub quality_score: Option<f64>,
    pub source_type: Option<SourceType>,
    pub context_before: Option<String>,
    pub context_after: Option<String>,
    pub notes: Option<String>,
}

impl NewSegment {
    pub fn new(source_text: &str, target_text: &str) -> Self {
        NewSegment {
            source_text: source_text.to_string(),
            target_text: target_text.to_string(),
            quality_score: None,
            source_type: None,
            context_before: None,
            context_after: None,
            notes: None,
        }
    }

    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality_score = Some(quality);
        self
    }

    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = Some(source_type);
        self
    }
}

/// 벌크 임포트 개별 실패 항목
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkItemError {
    pub index: usize,
    pub error: String,
}

/// 벌크 임포트 결과 리포트
///
/// 실패한 항목이 있어도 배치 전체를 중단하지 않고,
/// 유효한 항목은 커밋한 뒤 errors로 보고합니다.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportReport {
    pub added: u32,
    pub updated: u32,
    pub skipped: u32,
    pub errors: Vec<BulkItemError>,
}

/// 매칭 정책 설정
///
/// 임계값과 cost factor는 비즈니스 정책이므로 하드코딩하지 않고
/// 호출자가 주입합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchConfig {
    /// EXACT 분류 하한
    pub exact_threshold: f64,
    /// NEAR_EXACT 분류 하한
    pub near_exact_threshold: f64,
    /// FUZZY 분류 하한이자 기본 검색 임계값
    pub fuzzy_threshold: f64,
    /// 길이 prefilter: 단어 수 상대 차이가 이 값을 넘으면 비교 생략
    pub length_ratio_limit: f64,
    /// find_fuzzy 기본 최대 결과 수
    pub max_results: usize,
    pub cost_exact: f64,
    pub cost_near_exact: f64,
    pub cost_fuzzy: f64,
    pub cost_no_match: f64,
    /// 정규화 캐시 최대 엔트리 수 (초과 시 전체 비움)
    pub normalize_cache_capacity: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            exact_threshold: 1.0,
            near_exact_threshold: 0.95,
            fuzzy_threshold: 0.75,
            length_ratio_limit: 0.5,
            max_results: 5,
            cost_exact: 0.0,
            cost_near_exact: 0.2,
            cost_fuzzy: 0.5,
            cost_no_match: 1.0,
            normalize_cache_capacity: 2048,
        }
    }
}

/// 세그먼테이션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SegmentConfig {
    /// 이 단어 수 미만의 세그먼트는 이웃에 병합
    pub min_segment_words: u32,
    /// smart 모드: 전체 단어 수가 이 값 미만이면 sentence 모드로 동작
    pub smart_word_threshold: u32,
    /// smart 모드: 이 단어 수를 넘는 문단은 문장으로 재분할
    pub max_paragraph_words: u32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        SegmentConfig {
            min_segment_words: 3,
            smart_word_threshold: 200,
            max_paragraph_words: 100,
        }
    }
}
