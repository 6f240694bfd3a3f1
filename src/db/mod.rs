//! Database Module
//!
//! SQLite 기반 TM 저장소
//!
//! NotFound는 이 레이어에서 Option/false로 반환하고, 도메인 에러로의
//! 승격은 Service 레이어가 담당합니다. 중복 세그먼트의 최종 판정자는
//! (tm_id, source_hash) UNIQUE 인덱스입니다.

mod schema;

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, ToSql};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::TmError;
use crate::models::{
    clamp_quality, BulkImportReport, BulkItemError, DuplicatePolicy, NewSegment, SourceType,
    TmSegment, TranslationMemory,
};

/// 세그먼트 목록 정렬 기준
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentSort {
    CreatedAt,
    QualityScore,
    UsageCount,
    SourceLength,
}

impl SegmentSort {
    fn column(&self) -> &'static str {
        match self {
            SegmentSort::CreatedAt => "created_at",
            SegmentSort::QualityScore => "quality_score",
            SegmentSort::UsageCount => "usage_count",
            SegmentSort::SourceLength => "source_length",
        }
    }
}

impl Default for SegmentSort {
    fn default() -> Self {
        SegmentSort::CreatedAt
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

/// 페이지네이션된 세그먼트 목록
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentPage {
    pub segments: Vec<TmSegment>,
    pub total: u32,
    pub page: u32,
    pub limit: u32,
}

/// add_segment의 결과 (정책에 따른 실제 수행 내용)
#[derive(Debug)]
pub enum SegmentWrite {
    Inserted(TmSegment),
    Updated(TmSegment),
    Skipped(TmSegment),
}

impl SegmentWrite {
    pub fn segment(&self) -> &TmSegment {
        match self {
            SegmentWrite::Inserted(s) | SegmentWrite::Updated(s) | SegmentWrite::Skipped(s) => s,
        }
    }
}

/// 세그먼트 부분 업데이트 입력
///
/// source_text가 바뀌면 파생 필드(hash/normalized/length)도 함께 재계산됩니다.
#[derive(Debug, Default, Clone)]
pub struct SegmentUpdate {
    pub source_text: Option<String>,
    pub target_text: Option<String>,
    pub quality_score: Option<f64>,
    pub source_type: Option<SourceType>,
    pub context_before: Option<String>,
    pub context_after: Option<String>,
    pub notes: Option<String>,
}

/// 데이터베이스 래퍼
pub struct Database {
    conn: Connection,
}

impl Database {
    /// 새 데이터베이스 연결 생성
    pub fn new(path: &Path) -> Result<Self, TmError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// 인메모리 데이터베이스 (테스트/임시 작업용)
    pub fn in_memory() -> Result<Self, TmError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// 데이터베이스 스키마 초기화
    pub fn initialize(&self) -> Result<(), TmError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(schema::CREATE_SCHEMA)?;
        info!("tm database initialized");
        Ok(())
    }

    // ── TranslationMemory CRUD ──────────────────────────────────

    /// TM 생성
    pub fn create_tm(
        &self,
        name: &str,
        source_lang: &str,
        target_lang: &str,
        domain: &str,
    ) -> Result<TranslationMemory, TmError> {
        if name.trim().is_empty() {
            return Err(TmError::InvalidOperation("TM name is empty".to_string()));
        }
        if source_lang.trim().is_empty() || target_lang.trim().is_empty() {
            return Err(TmError::InvalidOperation(
                "source/target language is empty".to_string(),
            ));
        }

        let tm = TranslationMemory::new(name, source_lang, target_lang, domain);
        self.conn.execute(
            "INSERT INTO translation_memories
             (id, name, source_lang, target_lang, domain, segment_count, total_words, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                tm.id,
                tm.name,
                tm.source_lang,
                tm.target_lang,
                tm.domain,
                tm.segment_count,
                tm.total_words,
                tm.is_active,
                tm.created_at,
                tm.updated_at,
            ],
        )?;
        Ok(tm)
    }

    /// TM 조회 (없으면 None)
    pub fn get_tm(&self, tm_id: &str) -> Result<Option<TranslationMemory>, TmError> {
        let tm = self
            .conn
            .query_row(
                "SELECT id, name, source_lang, target_lang, domain, segment_count, total_words, is_active, created_at, updated_at
                 FROM translation_memories WHERE id = ?1",
                [tm_id],
                map_tm_row,
            )
            .optional()?;
        Ok(tm)
    }

    /// TM 목록 (기본은 active만)
    pub fn list_tms(&self, include_inactive: bool) -> Result<Vec<TranslationMemory>, TmError> {
        let sql = if include_inactive {
            "SELECT id, name, source_lang, target_lang, domain, segment_count, total_words, is_active, created_at, updated_at
             FROM translation_memories ORDER BY updated_at DESC"
        } else {
            "SELECT id, name, source_lang, target_lang, domain, segment_count, total_words, is_active, created_at, updated_at
             FROM translation_memories WHERE is_active = 1 ORDER BY updated_at DESC"
        };

        let mut stmt = self.conn.prepare(sql)?;
        let iter = stmt.query_map([], map_tm_row)?;

        let mut tms = Vec::new();
        for tm in iter {
            tms.push(tm?);
        }
        Ok(tms)
    }

    /// TM 메타데이터 수정 (없으면 None)
    pub fn update_tm(
        &self,
        tm_id: &str,
        name: Option<&str>,
        domain: Option<&str>,
        is_active: Option<bool>,
    ) -> Result<Option<TranslationMemory>, TmError> {
        let Some(mut tm) = self.get_tm(tm_id)? else {
            return Ok(None);
        };

        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(TmError::InvalidOperation("TM name is empty".to_string()));
            }
            tm.name = name.to_string();
        }
        if let Some(domain) = domain {
            tm.domain = domain.to_string();
        }
        if let Some(is_active) = is_active {
            tm.is_active = is_active;
        }
        tm.updated_at = chrono::Utc::now().timestamp_millis();

        self.conn.execute(
            "UPDATE translation_memories SET name = ?1, domain = ?2, is_active = ?3, updated_at = ?4
             WHERE id = ?5",
            params![tm.name, tm.domain, tm.is_active, tm.updated_at, tm.id],
        )?;
        Ok(Some(tm))
    }

    /// TM soft-delete (is_active = 0, 세그먼트와 이력은 보존)
    pub fn delete_tm(&self, tm_id: &str) -> Result<bool, TmError> {
        let affected = self.conn.execute(
            "UPDATE translation_memories SET is_active = 0, updated_at = ?1 WHERE id = ?2",
            params![chrono::Utc::now().timestamp_millis(), tm_id],
        )?;
        Ok(affected > 0)
    }

    /// TM 완전 삭제 (세그먼트 연쇄 삭제 포함)
    pub fn purge_tm(&self, tm_id: &str) -> Result<bool, TmError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM tm_segments WHERE tm_id = ?1", [tm_id])?;
        let affected = tx.execute("DELETE FROM translation_memories WHERE id = ?1", [tm_id])?;
        tx.commit()?;
        Ok(affected > 0)
    }

    // ── TmSegment CRUD ──────────────────────────────────────────

    /// 세그먼트 조회 (없으면 None)
    pub fn get_segment(&self, segment_id: &str) -> Result<Option<TmSegment>, TmError> {
        let segment = self
            .conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_SEGMENT),
                [segment_id],
                map_segment_row,
            )
            .optional()?;
        Ok(segment)
    }

    /// 동일 TM 내 hash 일치 세그먼트 조회
    pub fn find_by_hash(
        &self,
        tm_id: &str,
        source_hash: &str,
    ) -> Result<Option<TmSegment>, TmError> {
        query_segment_by_hash(&self.conn, tm_id, source_hash)
    }

    /// 세그먼트 추가
    ///
    /// 파생 필드는 여기서 재계산되며, 동일 (tm_id, source_hash)가 이미
    /// 있으면 정책에 따라 update/skip/에러로 처리합니다. 동시 쓰기로
    /// UNIQUE 제약에 걸린 경우도 검출된 중복과 동일하게 처리합니다.
    pub fn add_segment(
        &self,
        tm_id: &str,
        input: &NewSegment,
        policy: DuplicatePolicy,
    ) -> Result<SegmentWrite, TmError> {
        validate_segment_input(input)?;

        let tm = self
            .get_tm(tm_id)?
            .ok_or_else(|| TmError::TmNotFound(tm_id.to_string()))?;
        let segment = TmSegment::new(&tm, input);

        let tx = self.conn.unchecked_transaction()?;
        let write = apply_segment_write(&tx, &tm, &segment, input, policy)?;
        if matches!(write, SegmentWrite::Inserted(_)) {
            refresh_tm_stats(&tx, tm_id)?;
        }
        tx.commit()?;
        Ok(write)
    }

    /// 세그먼트 벌크 추가 (단일 트랜잭션)
    ///
    /// 개별 항목 실패는 {index, error}로 수집하고 배치를 중단하지 않습니다.
    /// skip_duplicates=true면 중복은 target 갱신(updated)으로 처리되고,
    /// false면 해당 항목이 에러로 보고됩니다.
    pub fn add_segments_bulk(
        &self,
        tm_id: &str,
        items: &[NewSegment],
        skip_duplicates: bool,
    ) -> Result<BulkImportReport, TmError> {
        let tm = self
            .get_tm(tm_id)?
            .ok_or_else(|| TmError::TmNotFound(tm_id.to_string()))?;

        let policy = if skip_duplicates {
            DuplicatePolicy::Update
        } else {
            DuplicatePolicy::Strict
        };

        let mut report = BulkImportReport::default();
        let tx = self.conn.unchecked_transaction()?;

        for (index, input) in items.iter().enumerate() {
            if let Err(e) = validate_segment_input(input) {
                report.errors.push(BulkItemError {
                    index,
                    error: e.to_string(),
                });
                continue;
            }

            let segment = TmSegment::new(&tm, input);
            match apply_segment_write(&tx, &tm, &segment, input, policy) {
                Ok(SegmentWrite::Inserted(_)) => report.added += 1,
                Ok(SegmentWrite::Updated(_)) => report.updated += 1,
                Ok(SegmentWrite::Skipped(_)) => report.skipped += 1,
                Err(e) => report.errors.push(BulkItemError {
                    index,
                    error: e.to_string(),
                }),
            }
        }

        refresh_tm_stats(&tx, tm_id)?;
        tx.commit()?;

        debug!(
            added = report.added,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.errors.len(),
            "bulk segment import"
        );
        Ok(report)
    }

    /// 세그먼트 목록 (페이지네이션 + 대소문자 무시 부분 검색)
    pub fn list_segments(
        &self,
        tm_id: &str,
        page: u32,
        limit: u32,
        search: Option<&str>,
        sort: SegmentSort,
        order: SortOrder,
    ) -> Result<SegmentPage, TmError> {
        let page = page.max(1);
        let limit = limit.clamp(1, 200);
        let offset = (page - 1) * limit;

        let (total, segments) = if let Some(search) = search.filter(|s| !s.trim().is_empty()) {
            let pattern = format!("%{}%", search.to_lowercase());
            let total: u32 = self.conn.query_row(
                "SELECT COUNT(*) FROM tm_segments
                 WHERE tm_id = ?1 AND (lower(source_text) LIKE ?2 OR lower(target_text) LIKE ?2)",
                params![tm_id, pattern],
                |row| row.get(0),
            )?;

            let sql = format!(
                "{} WHERE tm_id = ?1 AND (lower(source_text) LIKE ?2 OR lower(target_text) LIKE ?2)
                 ORDER BY {} {}, rowid ASC LIMIT ?3 OFFSET ?4",
                SELECT_SEGMENT,
                sort.column(),
                order.keyword()
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let iter = stmt.query_map(params![tm_id, pattern, limit, offset], map_segment_row)?;

            let mut segments = Vec::new();
            for segment in iter {
                segments.push(segment?);
            }
            (total, segments)
        } else {
            let total: u32 = self.conn.query_row(
                "SELECT COUNT(*) FROM tm_segments WHERE tm_id = ?1",
                [tm_id],
                |row| row.get(0),
            )?;

            let sql = format!(
                "{} WHERE tm_id = ?1 ORDER BY {} {}, rowid ASC LIMIT ?2 OFFSET ?3",
                SELECT_SEGMENT,
                sort.column(),
                order.keyword()
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let iter = stmt.query_map(params![tm_id, limit, offset], map_segment_row)?;

            let mut segments = Vec::new();
            for segment in iter {
                segments.push(segment?);
            }
            (total, segments)
        };

        Ok(SegmentPage {
            segments,
            total,
            page,
            limit,
        })
    }

    /// TM의 전체 세그먼트 (quality_score 내림차순)
    ///
    /// Matcher가 이 순서를 그대로 소비하므로, 동률 후보의 tie-break는
    /// 스캔 순서 == 품질 순서가 됩니다.
    pub fn get_all_segments(&self, tm_id: &str) -> Result<Vec<TmSegment>, TmError> {
        let sql = format!(
            "{} WHERE tm_id = ?1 ORDER BY quality_score DESC, rowid ASC",
            SELECT_SEGMENT
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let iter = stmt.query_map([tm_id], map_segment_row)?;

        let mut segments = Vec::new();
        for segment in iter {
            segments.push(segment?);
        }
        Ok(segments)
    }

    /// 여러 TM의 세그먼트 합집합 (quality_score 내림차순)
    pub fn get_segments_for_tms(&self, tm_ids: &[String]) -> Result<Vec<TmSegment>, TmError> {
        if tm_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=tm_ids.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "{} WHERE tm_id IN ({}) ORDER BY quality_score DESC, rowid ASC",
            SELECT_SEGMENT, placeholders
        );

        let param_refs: Vec<&dyn ToSql> = tm_ids.iter().map(|id| id as &dyn ToSql).collect();
        let mut stmt = self.conn.prepare(&sql)?;
        let iter = stmt.query_map(&param_refs[..], map_segment_row)?;

        let mut segments = Vec::new();
        for segment in iter {
            segments.push(segment?);
        }
        Ok(segments)
    }

    /// 세그먼트 부분 업데이트 (없으면 None)
    pub fn update_segment(
        &self,
        segment_id: &str,
        update: &SegmentUpdate,
    ) -> Result<Option<TmSegment>, TmError> {
        let Some(mut segment) = self.get_segment(segment_id)? else {
            return Ok(None);
        };
        let tm = self
            .get_tm(&segment.tm_id)?
            .ok_or_else(|| TmError::TmNotFound(segment.tm_id.clone()))?;

        let source_changed = match &update.source_text {
            Some(text) if text.trim().is_empty() => {
                return Err(TmError::InvalidOperation("source_text is empty".to_string()));
            }
            Some(text) => {
                segment.set_source_text(&tm.source_lang, &tm.target_lang, text);
                true
            }
            None => false,
        };

        // source 변경이 기존 세그먼트와 충돌하면 중복으로 거절
        if source_changed {
            if let Some(existing) =
                query_segment_by_hash(&self.conn, &segment.tm_id, &segment.source_hash)?
            {
                if existing.id != segment.id {
                    return Err(TmError::DuplicateSegment(segment.source_text.clone()));
                }
            }
        }

        if let Some(target) = &update.target_text {
            if target.trim().is_empty() {
                return Err(TmError::InvalidOperation("target_text is empty".to_string()));
            }
            segment.target_text = target.clone();
        }
        if let Some(quality) = update.quality_score {
            segment.quality_score = clamp_quality(quality);
        }
        if let Some(source_type) = update.source_type {
            segment.source_type = source_type;
        }
        if let Some(context_before) = &update.context_before {
            segment.context_before = Some(context_before.clone());
        }
        if let Some(context_after) = &update.context_after {
            segment.context_after = Some(context_after.clone());
        }
        if let Some(notes) = &update.notes {
            segment.notes = Some(notes.clone());
        }
        segment.updated_at = chrono::Utc::now().timestamp_millis();

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE tm_segments SET
                source_text = ?1, target_text = ?2, source_hash = ?3, source_normalized = ?4,
                source_length = ?5, quality_score = ?6, source_type = ?7,
                context_before = ?8, context_after = ?9, notes = ?10, updated_at = ?11
             WHERE id = ?12",
            params![
                segment.source_text,
                segment.target_text,
                segment.source_hash,
                segment.source_normalized,
                segment.source_length,
                segment.quality_score,
                segment.source_type.as_str(),
                segment.context_before,
                segment.context_after,
                segment.notes,
                segment.updated_at,
                segment.id,
            ],
        )?;
        if source_changed {
            refresh_tm_stats(&tx, &segment.tm_id)?;
        }
        tx.commit()?;

        Ok(Some(segment))
    }

    /// 세그먼트 삭제 (없으면 false)
    pub fn delete_segment(&self, segment_id: &str) -> Result<bool, TmError> {
        let Some(segment) = self.get_segment(segment_id)? else {
            return Ok(false);
        };

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM tm_segments WHERE id = ?1", [segment_id])?;
        refresh_tm_stats(&tx, &segment.tm_id)?;
        tx.commit()?;
        Ok(true)
    }

    /// 사용 횟수 배치 증가 + last_used_at 스탬프
    ///
    /// 매칭 성공의 부수효과로 호출됩니다 (삽입 경로에서는 호출하지 않음).
    pub fn increment_usage_count(&self, segment_ids: &[String]) -> Result<u32, TmError> {
        if segment_ids.is_empty() {
            return Ok(0);
        }

        let now = chrono::Utc::now().timestamp_millis();
        let placeholders = (2..=segment_ids.len() + 1)
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE tm_segments SET usage_count = usage_count + 1, last_used_at = ?1 WHERE id IN ({})",
            placeholders
        );

        let mut param_refs: Vec<&dyn ToSql> = vec![&now];
        param_refs.extend(segment_ids.iter().map(|id| id as &dyn ToSql));

        let affected = self.conn.execute(&sql, &param_refs[..])?;
        debug!(count = affected, "usage count incremented");
        Ok(affected as u32)
    }
}

const SELECT_SEGMENT: &str = "SELECT id, tm_id, source_text, target_text, source_hash, source_normalized, source_length, quality_score, source_type, usage_count, last_used_at, context_before, context_after, notes, created_at, updated_at FROM tm_segments";

fn map_tm_row(row: &rusqlite::Row) -> rusqlite::Result<TranslationMemory> {
    Ok(TranslationMemory {
        id: row.get(0)?,
        name: row.get(1)?,
        source_lang: row.get(2)?,
        target_lang: row.get(3)?,
        domain: row.get(4)?,
        segment_count: row.get(5)?,
        total_words: row.get(6)?,
        is_active: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn map_segment_row(row: &rusqlite::Row) -> rusqlite::Result<TmSegment> {
    let source_type: String = row.get(8)?;
    Ok(TmSegment {
        id: row.get(0)?,
        tm_id: row.get(1)?,
        source_text: row.get(2)?,
        target_text: row.get(3)?,
        source_hash: row.get(4)?,
        source_normalized: row.get(5)?,
        source_length: row.get(6)?,
        quality_score: row.get(7)?,
        source_type: SourceType::parse(&source_type),
        usage_count: row.get(9)?,
        last_used_at: row.get(10)?,
        context_before: row.get(11)?,
        context_after: row.get(12)?,
        notes: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn validate_segment_input(input: &NewSegment) -> Result<(), TmError> {
    if input.source_text.trim().is_empty() {
        return Err(TmError::InvalidOperation("source_text is empty".to_string()));
    }
    if input.target_text.trim().is_empty() {
        return Err(TmError::InvalidOperation("target_text is empty".to_string()));
    }
    Ok(())
}

fn query_segment_by_hash(
    conn: &Connection,
    tm_id: &str,
    source_hash: &str,
) -> Result<Option<TmSegment>, TmError> {
    let segment = conn
        .query_row(
            &format!("{} WHERE tm_id = ?1 AND source_hash = ?2", SELECT_SEGMENT),
            params![tm_id, source_hash],
            map_segment_row,
        )
        .optional()?;
    Ok(segment)
}

/// 중복 검사 후 insert/update/skip 수행
///
/// UNIQUE 제약 위반(동시 쓰기 레이스)은 검출된 중복과 동일하게 재처리합니다.
fn apply_segment_write(
    conn: &Connection,
    tm: &TranslationMemory,
    segment: &TmSegment,
    input: &NewSegment,
    policy: DuplicatePolicy,
) -> Result<SegmentWrite, TmError> {
    if let Some(existing) = query_segment_by_hash(conn, &tm.id, &segment.source_hash)? {
        return resolve_duplicate(conn, existing, segment, input, policy);
    }

    let inserted = conn.execute(
        "INSERT INTO tm_segments
         (id, tm_id, source_text, target_text, source_hash, source_normalized, source_length,
          quality_score, source_type, usage_count, last_used_at, context_before, context_after,
          notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
        params![
            segment.id,
            segment.tm_id,
            segment.source_text,
            segment.target_text,
            segment.source_hash,
            segment.source_normalized,
            segment.source_length,
            segment.quality_score,
            segment.source_type.as_str(),
            segment.usage_count,
            segment.last_used_at,
            segment.context_before,
            segment.context_after,
            segment.notes,
            segment.created_at,
            segment.updated_at,
        ],
    );

    match inserted {
        Ok(_) => Ok(SegmentWrite::Inserted(segment.clone())),
        Err(e) if is_constraint_violation(&e) => {
            // check-then-insert 레이스: 제약이 먼저 이긴 쪽을 확정했으므로
            // 진 쪽은 검출된 중복과 같은 경로로 합류
            match query_segment_by_hash(conn, &tm.id, &segment.source_hash)? {
                Some(existing) => resolve_duplicate(conn, existing, segment, input, policy),
                None => Err(TmError::Database(e)),
            }
        }
        Err(e) => Err(TmError::Database(e)),
    }
}

fn resolve_duplicate(
    conn: &Connection,
    existing: TmSegment,
    incoming: &TmSegment,
    input: &NewSegment,
    policy: DuplicatePolicy,
) -> Result<SegmentWrite, TmError> {
    match policy {
        DuplicatePolicy::Strict => Err(TmError::DuplicateSegment(incoming.source_text.clone())),
        DuplicatePolicy::Skip => Ok(SegmentWrite::Skipped(existing)),
        DuplicatePolicy::Update => {
            let mut updated = existing;
            updated.target_text = incoming.target_text.clone();
            updated.quality_score = incoming.quality_score;
            updated.source_type = incoming.source_type;
            if input.context_before.is_some() {
                updated.context_before = input.context_before.clone();
            }
            if input.context_after.is_some() {
                updated.context_after = input.context_after.clone();
            }
            if input.notes.is_some() {
                updated.notes = input.notes.clone();
            }
            updated.usage_count += 1;
            updated.updated_at = chrono::Utc::now().timestamp_millis();

            conn.execute(
                "UPDATE tm_segments SET
                    target_text = ?1, quality_score = ?2, source_type = ?3,
                    context_before = ?4, context_after = ?5, notes = ?6,
                    usage_count = ?7, updated_at = ?8
                 WHERE id = ?9",
                params![
                    updated.target_text,
                    updated.quality_score,
                    updated.source_type.as_str(),
                    updated.context_before,
                    updated.context_after,
                    updated.notes,
                    updated.usage_count,
                    updated.updated_at,
                    updated.id,
                ],
            )?;
            Ok(SegmentWrite::Updated(updated))
        }
    }
}

/// TM의 캐시 집계(segment_count/total_words) 재계산
fn refresh_tm_stats(conn: &Connection, tm_id: &str) -> Result<(), TmError> {
    conn.execute(
        "UPDATE translation_memories SET
            segment_count = (SELECT COUNT(*) FROM tm_segments WHERE tm_id = ?1),
            total_words = (SELECT COALESCE(SUM(source_length), 0) FROM tm_segments WHERE tm_id = ?1),
            updated_at = ?2
         WHERE id = ?1",
        params![tm_id, chrono::Utc::now().timestamp_millis()],
    )?;
    Ok(())
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(ffi, _)
            if ffi.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
