//! Service Integration Tests
//!
//! tempfile 기반 SQLite 파일로 학습→매칭→리포트 루프를 검증합니다.

use std::io::Cursor;
use std::sync::Arc;

use tm_lib::db::Database;
use tm_lib::models::{NewSegment, SegmentMode, SourceType};
use tm_lib::service::{TmService, TmState};

fn file_backed_service(dir: &tempfile::TempDir) -> TmService {
    let db = Database::new(&dir.path().join("tm.db")).unwrap();
    db.initialize().unwrap();
    TmService::new(db)
}

#[test]
fn learn_is_idempotent_and_latest_target_wins() {
    let dir = tempfile::tempdir().unwrap();
    let service = file_backed_service(&dir);
    let tm = service.db().create_tm("Medical", "en", "vi", "medical").unwrap();

    service.learn(&tm.id, "heart", "tim", Some(0.8), None).unwrap();
    let second = service
        .learn(&tm.id, "heart", "tim mới", Some(0.9), Some(SourceType::Human))
        .unwrap();

    assert_eq!(second.target_text, "tim mới");
    assert_eq!(second.source_type, SourceType::Human);

    let stats = service.db().get_tm(&tm.id).unwrap().unwrap();
    assert_eq!(stats.segment_count, 1);
}

#[test]
fn exact_lookup_finds_stored_segment_across_case() {
    let dir = tempfile::tempdir().unwrap();
    let service = file_backed_service(&dir);
    let tm = service.db().create_tm("Medical", "en", "vi", "medical").unwrap();

    service.learn(&tm.id, "heart", "tim", Some(0.9), Some(SourceType::Verified)).unwrap();

    let result = service.lookup("Heart", &[tm.id.clone()], None, None).unwrap();
    let best = result.best.unwrap();
    assert_eq!(best.similarity, 1.0);
    assert_eq!(best.target_text, "tim");
}

#[test]
fn fuzzy_lookup_matches_heart_not_lung() {
    let dir = tempfile::tempdir().unwrap();
    let service = file_backed_service(&dir);
    let tm = service.db().create_tm("Medical", "en", "vi", "medical").unwrap();

    service.learn(&tm.id, "heart", "tim", None, None).unwrap();
    service.learn(&tm.id, "lung", "phổi", None, None).unwrap();

    let result = service.lookup("the heart", &[tm.id.clone()], Some(0.6), None).unwrap();
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.best.as_ref().unwrap().source_text, "heart");

    // 매치 성공은 usage_count 증가의 부수효과를 가짐
    let matched_id = &result.best.unwrap().segment_id;
    let segment = service.db().get_segment(matched_id).unwrap().unwrap();
    assert_eq!(segment.usage_count, 1);
    assert!(segment.last_used_at.is_some());
}

#[test]
fn process_reports_matches_and_savings() {
    let dir = tempfile::tempdir().unwrap();
    let service = file_backed_service(&dir);
    let tm = service.db().create_tm("Medical", "en", "vi", "medical").unwrap();

    service
        .learn(
            &tm.id,
            "The patient has a strong heart.",
            "Bệnh nhân có trái tim khỏe mạnh.",
            Some(0.9),
            Some(SourceType::Human),
        )
        .unwrap();

    let text = "The patient has a strong heart. The lungs show minor scarring. Further tests are required tomorrow.";
    let result = service
        .process(text, &[tm.id.clone()], SegmentMode::Sentence, None)
        .unwrap();

    assert_eq!(result.total_segments, 3);
    assert_eq!(result.matched_segments, 1);
    assert!(result.estimated_savings > 0.0);
    assert!(result.estimated_savings < 100.0);

    let matched: Vec<_> = result.segments.iter().filter(|s| !s.needs_translation).collect();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].source_text, "The patient has a strong heart.");
    assert_eq!(matched[0].cost_factor, 0.0);
    assert_eq!(
        matched[0].target_text.as_deref(),
        Some("Bệnh nhân có trái tim khỏe mạnh.")
    );

    // 매치 없는 세그먼트는 전체 비용
    let unmatched: Vec<_> = result.segments.iter().filter(|s| s.needs_translation).collect();
    assert!(unmatched.iter().all(|s| s.cost_factor == 1.0));
}

#[test]
fn process_across_multiple_tms_unions_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let service = file_backed_service(&dir);
    let medical = service.db().create_tm("Medical", "en", "vi", "medical").unwrap();
    let general = service.db().create_tm("General", "en", "vi", "general").unwrap();

    service
        .learn(&medical.id, "The heart looks healthy.", "Tim trông khỏe mạnh.", None, None)
        .unwrap();
    service
        .learn(&general.id, "Thank you very much.", "Cảm ơn rất nhiều.", None, None)
        .unwrap();

    let text = "The heart looks healthy. Thank you very much.";
    let result = service
        .process(text, &[medical.id.clone(), general.id.clone()], SegmentMode::Sentence, None)
        .unwrap();

    assert_eq!(result.total_segments, 2);
    assert_eq!(result.matched_segments, 2);
}

#[test]
fn learn_batch_reports_bad_rows_without_aborting() {
    let dir = tempfile::tempdir().unwrap();
    let service = file_backed_service(&dir);
    let tm = service.db().create_tm("Medical", "en", "vi", "medical").unwrap();

    let items = vec![
        NewSegment::new("heart", "tim"),
        NewSegment::new("lung", ""),
        NewSegment::new("kidney", "thận"),
    ];
    let report = service.learn_batch(&tm.id, &items, true).unwrap();

    assert_eq!(report.added, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].index, 1);

    let stats = service.db().get_tm(&tm.id).unwrap().unwrap();
    assert_eq!(stats.segment_count, 2);
}

#[test]
fn tmx_export_import_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let service = file_backed_service(&dir);
    let source = service.db().create_tm("Source", "en", "vi", "medical").unwrap();
    let dest = service.db().create_tm("Dest", "en", "vi", "medical").unwrap();

    service.learn(&source.id, "heart", "tim", Some(0.9), Some(SourceType::Verified)).unwrap();
    service.learn(&source.id, "lung", "phổi", Some(0.6), None).unwrap();

    let mut tmx = Vec::new();
    assert_eq!(service.export_tmx(&source.id, &mut tmx).unwrap(), 2);

    let report = service.import_tmx(&dest.id, Cursor::new(tmx), true).unwrap();
    assert_eq!(report.added, 2);
    assert!(report.errors.is_empty());

    // 임포트된 세그먼트는 exact 매치로 재사용 가능해야 함
    let result = service.lookup("Heart", &[dest.id.clone()], None, None).unwrap();
    let best = result.best.unwrap();
    assert_eq!(best.similarity, 1.0);
    assert_eq!(best.target_text, "tim");
    assert_eq!(best.quality_score, 0.9);
    assert_eq!(best.source_type, SourceType::Verified);
}

#[test]
fn csv_export_import_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let service = file_backed_service(&dir);
    let source = service.db().create_tm("Source", "en", "vi", "medical").unwrap();
    let dest = service.db().create_tm("Dest", "en", "vi", "medical").unwrap();

    service.learn(&source.id, "heart, left side", "tim trái", Some(0.7), None).unwrap();

    let mut csv_out = Vec::new();
    assert_eq!(service.export_csv(&source.id, &mut csv_out).unwrap(), 1);

    let report = service.import_csv(&dest.id, Cursor::new(csv_out), true).unwrap();
    assert_eq!(report.added, 1);

    let segments = service.db().get_all_segments(&dest.id).unwrap();
    assert_eq!(segments[0].source_text, "heart, left side");
    assert_eq!(segments[0].quality_score, 0.7);
}

#[test]
fn concurrent_learn_of_same_pair_keeps_one_segment() {
    let dir = tempfile::tempdir().unwrap();
    let service = file_backed_service(&dir);
    let tm = service.db().create_tm("Medical", "en", "vi", "medical").unwrap();
    let tm_id = tm.id.clone();

    let state = Arc::new(TmState(std::sync::Mutex::new(service)));
    let mut handles = Vec::new();
    for i in 0..4 {
        let state = Arc::clone(&state);
        let tm_id = tm_id.clone();
        handles.push(std::thread::spawn(move || {
            let service = state.0.lock().unwrap();
            service
                .learn(&tm_id, "heart", &format!("tim {}", i), None, None)
                .unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let service = state.0.lock().unwrap();
    let stats = service.db().get_tm(&tm_id).unwrap().unwrap();
    assert_eq!(stats.segment_count, 1);
}
