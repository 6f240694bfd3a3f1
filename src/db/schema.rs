//! Database Schema
//!
//! SQLite 테이블 스키마 정의

/// 데이터베이스 스키마 생성 SQL
pub const CREATE_SCHEMA: &str = r#"
-- 번역 메모리 테이블
CREATE TABLE IF NOT EXISTS translation_memories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    source_lang TEXT NOT NULL,
    target_lang TEXT NOT NULL,
    domain TEXT NOT NULL DEFAULT 'general',
    segment_count INTEGER NOT NULL DEFAULT 0,
    total_words INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- TM 세그먼트 테이블
-- source_hash/source_normalized/source_length는 source_text의 파생 필드이며
-- 항상 코드에서 재계산되어 저장됩니다.
CREATE TABLE IF NOT EXISTS tm_segments (
    id TEXT PRIMARY KEY,
    tm_id TEXT NOT NULL,
    source_text TEXT NOT NULL,
    target_text TEXT NOT NULL,
    source_hash TEXT NOT NULL,
    source_normalized TEXT NOT NULL,
    source_length INTEGER NOT NULL,
    quality_score REAL NOT NULL DEFAULT 0.5,
    source_type TEXT NOT NULL DEFAULT 'machine' CHECK (source_type IN ('machine', 'human', 'verified')),
    usage_count INTEGER NOT NULL DEFAULT 0,
    last_used_at INTEGER,
    context_before TEXT,
    context_after TEXT,
    notes TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (tm_id) REFERENCES translation_memories(id) ON DELETE CASCADE
);

-- 동일 TM 내 중복 source 금지 (중복 검출의 최종 판정자)
CREATE UNIQUE INDEX IF NOT EXISTS idx_tm_segments_tm_hash ON tm_segments(tm_id, source_hash);

-- TM 횡단 exact lookup용 보조 인덱스
CREATE INDEX IF NOT EXISTS idx_tm_segments_hash ON tm_segments(source_hash);

-- 품질 내림차순 스캔용 인덱스
CREATE INDEX IF NOT EXISTS idx_tm_segments_quality ON tm_segments(tm_id, quality_score);
"#;
