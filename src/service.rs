//! TM Service
//!
//! Segmenter + Repository + Matcher를 묶는 오케스트레이션 레이어
//!
//! Repository의 None/false는 이 레이어에서 사람이 읽을 수 있는
//! 도메인 에러(TmNotFound 등)로 승격됩니다. 서비스 인스턴스는
//! 호출자가 명시적으로 생성해 소유합니다 (전역 싱글톤 없음).

use std::collections::HashSet;
use std::io::{BufRead, Read, Write};
use std::sync::Mutex;

use serde::Serialize;
use tracing::debug;

use crate::db::Database;
use crate::error::TmError;
use crate::exchange;
use crate::matcher::{Matcher, TmMatch};
use crate::models::{
    BulkImportReport, DuplicatePolicy, MatchConfig, NewSegment, SegmentConfig, SegmentMode,
    SourceType, TmSegment, TranslationMemory,
};
use crate::segmenter::Segmenter;

/// 문서 처리 결과의 세그먼트 단위 항목
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSegment {
    pub index: usize,
    pub source_text: String,
    /// 매치가 있으면 해당 target, 없으면 None
    pub target_text: Option<String>,
    pub best_match: Option<TmMatch>,
    pub needs_translation: bool,
    pub cost_factor: f64,
}

/// 문서 처리 리포트
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub segments: Vec<ProcessedSegment>,
    pub total_segments: u32,
    pub matched_segments: u32,
    /// (1 − 평균 cost factor) × 100
    pub estimated_savings: f64,
}

/// 단건 lookup 결과
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
    pub matches: Vec<TmMatch>,
    pub best: Option<TmMatch>,
}

/// 공유 상태로 관리되는 TM 서비스
///
/// 엔진 자체는 락을 잡지 않습니다. 외부 워커 풀에서 동시에 호출할 때는
/// 호출자가 이 래퍼로 직렬화합니다.
pub struct TmState(pub Mutex<TmService>);

/// TM 서비스
pub struct TmService {
    db: Database,
    matcher: Matcher,
    segmenter: Segmenter,
}

impl TmService {
    pub fn new(db: Database) -> Self {
        TmService::with_config(db, MatchConfig::default(), SegmentConfig::default())
    }

    /// 임계값/비용 정책을 주입해 생성
    pub fn with_config(db: Database, match_config: MatchConfig, segment_config: SegmentConfig) -> Self {
        TmService {
            db,
            matcher: Matcher::new(match_config),
            segmenter: Segmenter::new(segment_config),
        }
    }

    /// CRUD 표면 레이어용 저장소 접근자
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// 문서 처리: 분할 → 세그먼트별 최적 매치 → 문서 단위 리포트
    ///
    /// 매치된 세그먼트의 usage_count는 호출당 한 번의 배치 증가로 갱신됩니다.
    pub fn process(
        &self,
        text: &str,
        tm_ids: &[String],
        mode: SegmentMode,
        min_similarity: Option<f64>,
    ) -> Result<ProcessResult, TmError> {
        let (scope_tm, candidates) = self.load_scope(tm_ids)?;
        let units = self.segmenter.segment(text, mode);
        let index = self.matcher.build_index(&candidates);

        let mut segments = Vec::with_capacity(units.len());
        let mut matched_ids: Vec<String> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut matched_segments = 0u32;
        let mut cost_total = 0.0f64;

        for unit in &units {
            let best = self.matcher.find_best(
                &unit.text,
                &scope_tm.source_lang,
                &scope_tm.target_lang,
                &index,
                &candidates,
                min_similarity,
            );
            let cost_factor = self.matcher.estimate_cost_factor(best.as_ref());
            cost_total += cost_factor;

            if let Some(found) = &best {
                matched_segments += 1;
                if seen_ids.insert(found.segment_id.clone()) {
                    matched_ids.push(found.segment_id.clone());
                }
            }

            segments.push(ProcessedSegment {
                index: unit.index,
                source_text: unit.text.clone(),
                target_text: best.as_ref().map(|m| m.target_text.clone()),
                needs_translation: best.is_none(),
                cost_factor,
                best_match: best,
            });
        }

        self.db.increment_usage_count(&matched_ids)?;

        let total_segments = units.len() as u32;
        let estimated_savings = if total_segments > 0 {
            (1.0 - cost_total / total_segments as f64) * 100.0
        } else {
            0.0
        };

        debug!(
            total = total_segments,
            matched = matched_segments,
            savings = estimated_savings,
            "document processed"
        );

        Ok(ProcessResult {
            segments,
            total_segments,
            matched_segments,
            estimated_savings,
        })
    }

    /// 분할 없는 단건 lookup (exact 포함 fuzzy 랭킹)
    pub fn lookup(
        &self,
        text: &str,
        tm_ids: &[String],
        min_similarity: Option<f64>,
        max_results: Option<usize>,
    ) -> Result<LookupResult, TmError> {
        let (_, candidates) = self.load_scope(tm_ids)?;

        let matches = self.matcher.find_fuzzy(text, &candidates, min_similarity, max_results);
        let best = matches.first().cloned();

        let mut matched_ids: Vec<String> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        for m in &matches {
            if seen_ids.insert(m.segment_id.clone()) {
                matched_ids.push(m.segment_id.clone());
            }
        }
        self.db.increment_usage_count(&matched_ids)?;

        Ok(LookupResult { matches, best })
    }

    /// 확정 번역 학습 (동일 source 재학습은 target 갱신)
    pub fn learn(
        &self,
        tm_id: &str,
        source: &str,
        target: &str,
        quality: Option<f64>,
        source_type: Option<SourceType>,
    ) -> Result<TmSegment, TmError> {
        let mut input = NewSegment::new(source, target);
        input.quality_score = quality;
        input.source_type = source_type;

        let write = self.db.add_segment(tm_id, &input, DuplicatePolicy::Update)?;
        Ok(write.segment().clone())
    }

    /// 확정 번역 배치 학습
    pub fn learn_batch(
        &self,
        tm_id: &str,
        items: &[NewSegment],
        skip_duplicates: bool,
    ) -> Result<BulkImportReport, TmError> {
        self.db.add_segments_bulk(tm_id, items, skip_duplicates)
    }

    // ── TMX / CSV ───────────────────────────────────────────────

    /// TM 전체를 TMX 1.4b로 내보내기. 내보낸 세그먼트 수를 반환합니다.
    pub fn export_tmx<W: Write>(&self, tm_id: &str, writer: W) -> Result<u32, TmError> {
        let tm = self.require_tm(tm_id)?;
        let segments = self.db.get_all_segments(tm_id)?;
        exchange::tmx::export(&tm, &segments, writer)
    }

    /// TMX 1.4b 임포트 (벌크 경로 경유, 부분 실패 보고)
    pub fn import_tmx<R: BufRead>(
        &self,
        tm_id: &str,
        reader: R,
        skip_duplicates: bool,
    ) -> Result<BulkImportReport, TmError> {
        let tm = self.require_tm(tm_id)?;
        let items = exchange::tmx::parse(reader, &tm.source_lang, &tm.target_lang)?;
        self.db.add_segments_bulk(tm_id, &items, skip_duplicates)
    }

    /// TM 전체를 CSV로 내보내기. 내보낸 세그먼트 수를 반환합니다.
    pub fn export_csv<W: Write>(&self, tm_id: &str, writer: W) -> Result<u32, TmError> {
        self.require_tm(tm_id)?;
        let segments = self.db.get_all_segments(tm_id)?;
        exchange::csv::export(&segments, writer)
    }

    /// CSV 임포트 (벌크 경로 경유, 부분 실패 보고)
    pub fn import_csv<R: Read>(
        &self,
        tm_id: &str,
        reader: R,
        skip_duplicates: bool,
    ) -> Result<BulkImportReport, TmError> {
        self.require_tm(tm_id)?;
        let items = exchange::csv::parse(reader)?;
        self.db.add_segments_bulk(tm_id, &items, skip_duplicates)
    }

    // ── 내부 ────────────────────────────────────────────────────

    fn require_tm(&self, tm_id: &str) -> Result<TranslationMemory, TmError> {
        self.db
            .get_tm(tm_id)?
            .ok_or_else(|| TmError::TmNotFound(tm_id.to_string()))
    }

    /// 요청된 TM들을 검증하고 후보 세그먼트 합집합을 적재
    ///
    /// 모든 TM은 active여야 하고 같은 언어쌍이어야 합니다.
    fn load_scope(&self, tm_ids: &[String]) -> Result<(TranslationMemory, Vec<TmSegment>), TmError> {
        if tm_ids.is_empty() {
            return Err(TmError::InvalidOperation(
                "no translation memories selected".to_string(),
            ));
        }

        let mut first: Option<TranslationMemory> = None;
        for tm_id in tm_ids {
            let tm = self.require_tm(tm_id)?;
            if !tm.is_active {
                return Err(TmError::InvalidOperation(format!(
                    "translation memory is inactive: {}",
                    tm_id
                )));
            }
            match &first {
                None => first = Some(tm),
                Some(head) => {
                    if head.source_lang != tm.source_lang || head.target_lang != tm.target_lang {
                        return Err(TmError::InvalidOperation(format!(
                            "language pair mismatch: {}-{} vs {}-{}",
                            head.source_lang, head.target_lang, tm.source_lang, tm.target_lang
                        )));
                    }
                }
            }
        }

        let candidates = self.db.get_segments_for_tms(tm_ids)?;
        // load_scope는 tm_ids가 비어있지 않을 때만 도달
        let scope_tm = first.ok_or_else(|| {
            TmError::InvalidOperation("no translation memories selected".to_string())
        })?;
        Ok((scope_tm, candidates))
    }
}
