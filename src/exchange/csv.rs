//! CSV Exchange
//!
//! 플랫 CSV 임포트·익스포트
//!
//! 컬럼: source_text,target_text,quality_score,source_type,notes,created_at
//! 임포트는 선택 컬럼 누락을 허용하고, source/target 컬럼 누락이나
//! 깨진 CSV는 ImportFormat 에러로 해당 호출만 중단합니다.

use std::io::{Read, Write};

use crate::error::TmError;
use crate::models::{NewSegment, SourceType, TmSegment};

const HEADERS: [&str; 6] = [
    "source_text",
    "target_text",
    "quality_score",
    "source_type",
    "notes",
    "created_at",
];

/// 세그먼트들을 CSV로 기록. 기록한 세그먼트 수를 반환합니다.
pub fn export<W: Write>(segments: &[TmSegment], writer: W) -> Result<u32, TmError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(HEADERS).map_err(write_error)?;
    for segment in segments {
        let quality = segment.quality_score.to_string();
        let created_at = segment.created_at.to_string();
        csv_writer
            .write_record([
                segment.source_text.as_str(),
                segment.target_text.as_str(),
                quality.as_str(),
                segment.source_type.as_str(),
                segment.notes.as_deref().unwrap_or(""),
                created_at.as_str(),
            ])
            .map_err(write_error)?;
    }
    csv_writer.flush()?;

    Ok(segments.len() as u32)
}

/// CSV를 NewSegment 리스트로 파싱
pub fn parse<R: Read>(reader: R) -> Result<Vec<NewSegment>, TmError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| TmError::ImportFormat(format!("invalid CSV header: {}", e)))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));

    let source_idx = column("source_text")
        .ok_or_else(|| TmError::ImportFormat("missing source_text column".to_string()))?;
    let target_idx = column("target_text")
        .ok_or_else(|| TmError::ImportFormat("missing target_text column".to_string()))?;
    let quality_idx = column("quality_score");
    let source_type_idx = column("source_type");
    let notes_idx = column("notes");

    let mut items = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|e| TmError::ImportFormat(format!("invalid CSV row: {}", e)))?;
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

        let mut item = NewSegment::new(field(Some(source_idx)), field(Some(target_idx)));
        item.quality_score = field(quality_idx).parse::<f64>().ok();
        let source_type = field(source_type_idx);
        if !source_type.is_empty() {
            item.source_type = Some(SourceType::parse(source_type));
        }
        let notes = field(notes_idx);
        if !notes.is_empty() {
            item.notes = Some(notes.to_string());
        }
        items.push(item);
    }

    Ok(items)
}

fn write_error(e: csv::Error) -> TmError {
    TmError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TranslationMemory;
    use std::io::Cursor;

    #[test]
    fn export_then_parse_roundtrips() {
        let tm = TranslationMemory::new("Medical", "en", "vi", "medical");
        let segments = vec![
            TmSegment::new(&tm, &NewSegment::new("heart", "tim").with_quality(0.9)),
            TmSegment::new(&tm, &NewSegment::new("lung, left", "phổi trái").with_quality(0.6)),
        ];

        let mut out = Vec::new();
        assert_eq!(export(&segments, &mut out).unwrap(), 2);

        let items = parse(Cursor::new(out)).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source_text, "heart");
        assert_eq!(items[0].quality_score, Some(0.9));
        // 쉼표가 포함된 필드도 보존
        assert_eq!(items[1].source_text, "lung, left");
    }

    #[test]
    fn parse_tolerates_missing_optional_columns() {
        let csv_text = "source_text,target_text\nheart,tim\nlung,phổi\n";
        let items = parse(Cursor::new(csv_text.as_bytes())).unwrap();

        assert_eq!(items.len(), 2);
        assert!(items[0].quality_score.is_none());
        assert!(items[0].source_type.is_none());
        assert!(items[0].notes.is_none());
    }

    #[test]
    fn parse_rejects_missing_mandatory_columns() {
        let csv_text = "source,target\nheart,tim\n";
        let err = parse(Cursor::new(csv_text.as_bytes())).unwrap_err();
        assert!(matches!(err, TmError::ImportFormat(_)));
    }
}
