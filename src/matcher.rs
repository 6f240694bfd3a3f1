//! Matcher
//!
//! exact hash lookup + fuzzy 유사도 랭킹 + cost factor 추정
//!
//! exact 경로는 배치당 한 번 구축하는 hash 인덱스로 O(1) 조회하며,
//! fuzzy 경로는 길이 prefilter를 통과한 후보만 문자열 비교합니다.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tracing::trace;

use crate::models::{MatchConfig, MatchType, SourceType, TmSegment};
use crate::text::{self, NormalizeCache};

/// 매칭 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TmMatch {
    pub segment_id: String,
    pub tm_id: String,
    pub source_text: String,
    pub target_text: String,
    pub similarity: f64,
    pub match_type: MatchType,
    pub quality_score: f64,
    pub source_type: SourceType,
}

/// 배치 단위로 구축하는 exact 매치 인덱스 (source_hash → 세그먼트)
///
/// 후보 리스트는 품질 내림차순이므로, 같은 hash가 여러 TM에 있으면
/// 품질이 가장 높은 세그먼트가 남습니다.
pub struct ExactIndex<'a> {
    by_hash: HashMap<&'a str, &'a TmSegment>,
}

impl<'a> ExactIndex<'a> {
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

/// TM 매처
pub struct Matcher {
    config: MatchConfig,
    cache: Mutex<NormalizeCache>,
}

impl Default for Matcher {
    fn default() -> Self {
        Matcher::new(MatchConfig::default())
    }
}

impl Matcher {
    pub fn new(config: MatchConfig) -> Self {
        let cache = Mutex::new(NormalizeCache::new(config.normalize_cache_capacity));
        Matcher { config, cache }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// 후보 리스트에서 exact 인덱스 구축 (배치당 1회)
    pub fn build_index<'a>(&self, candidates: &'a [TmSegment]) -> ExactIndex<'a> {
        let mut by_hash: HashMap<&str, &TmSegment> = HashMap::with_capacity(candidates.len());
        for segment in candidates {
            by_hash.entry(segment.source_hash.as_str()).or_insert(segment);
        }
        ExactIndex { by_hash }
    }

    /// exact 매치 (정규화 hash 일치)
    pub fn find_exact(
        &self,
        source: &str,
        source_lang: &str,
        target_lang: &str,
        index: &ExactIndex,
    ) -> Option<TmMatch> {
        let hash = text::source_hash(source_lang, target_lang, source);
        index
            .by_hash
            .get(hash.as_str())
            .map(|segment| to_match(segment, 1.0, MatchType::Exact))
    }

    /// fuzzy 매치: 길이 prefilter → 유사도 계산 → 임계값 필터 → 랭킹
    ///
    /// 결과는 (similarity desc, quality_score desc) 순서입니다.
    /// 동률이면 품질이 높은(신뢰도 높은) 세그먼트가 앞에 옵니다.
    pub fn find_fuzzy(
        &self,
        source: &str,
        candidates: &[TmSegment],
        min_similarity: Option<f64>,
        max_results: Option<usize>,
    ) -> Vec<TmMatch> {
        let threshold = min_similarity.unwrap_or(self.config.fuzzy_threshold);
        let limit = max_results.unwrap_or(self.config.max_results);

        let query_norm = self.normalized(source);
        if query_norm.is_empty() {
            return Vec::new();
        }
        let query_words = text::word_count(&query_norm);

        let mut matches: Vec<TmMatch> = Vec::new();
        let mut skipped = 0usize;
        for candidate in candidates {
            // 단어 수 상대 차이가 한도를 넘는 후보는 문자열 비교 전에 제외
            let diff = candidate.source_length.abs_diff(query_words) as f64;
            if diff / query_words.max(1) as f64 > self.config.length_ratio_limit {
                skipped += 1;
                continue;
            }

            let similarity = text::similarity_ratio(&query_norm, &candidate.source_normalized);
            if similarity >= threshold {
                let match_type = self.classify(similarity, threshold);
                matches.push(to_match(candidate, similarity, match_type));
            }
        }
        trace!(
            candidates = candidates.len(),
            prefiltered = skipped,
            kept = matches.len(),
            "fuzzy scan"
        );

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.quality_score
                        .partial_cmp(&a.quality_score)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });
        matches.truncate(limit);
        matches
    }

    /// exact 우선, 없으면 최고 fuzzy
    pub fn find_best(
        &self,
        source: &str,
        source_lang: &str,
        target_lang: &str,
        index: &ExactIndex,
        candidates: &[TmSegment],
        min_similarity: Option<f64>,
    ) -> Option<TmMatch> {
        if let Some(exact) = self.find_exact(source, source_lang, target_lang, index) {
            return Some(exact);
        }
        self.find_fuzzy(source, candidates, min_similarity, Some(1))
            .into_iter()
            .next()
    }

    /// 유사도 분류 밴드 (높은 쪽부터 평가)
    ///
    /// fuzzy_floor는 호출자가 낮춘 검색 임계값을 따라갑니다.
    /// 기본값에서는 config.fuzzy_threshold와 같습니다.
    pub fn classify(&self, similarity: f64, fuzzy_floor: f64) -> MatchType {
        if similarity >= self.config.exact_threshold {
            MatchType::Exact
        } else if similarity >= self.config.near_exact_threshold {
            MatchType::NearExact
        } else if similarity >= fuzzy_floor.min(self.config.fuzzy_threshold) {
            MatchType::Fuzzy
        } else {
            MatchType::NoMatch
        }
    }

    /// 매치의 비용 계수 (과금/리포팅용, 랭킹에는 사용하지 않음)
    pub fn estimate_cost_factor(&self, matched: Option<&TmMatch>) -> f64 {
        match matched {
            Some(m) => match m.match_type {
                MatchType::Exact => self.config.cost_exact,
                MatchType::NearExact => self.config.cost_near_exact,
                MatchType::Fuzzy => self.config.cost_fuzzy,
                MatchType::NoMatch => self.config.cost_no_match,
            },
            None => self.config.cost_no_match,
        }
    }

    /// 정규화 캐시 경유 조회. 캐시 실패 시 그냥 직접 계산합니다.
    fn normalized(&self, raw: &str) -> String {
        match self.cache.lock() {
            Ok(mut cache) => cache.get_or_insert(raw),
            Err(_) => text::normalize(raw),
        }
    }
}

fn to_match(segment: &TmSegment, similarity: f64, match_type: MatchType) -> TmMatch {
    TmMatch {
        segment_id: segment.id.clone(),
        tm_id: segment.tm_id.clone(),
        source_text: segment.source_text.clone(),
        target_text: segment.target_text.clone(),
        similarity,
        match_type,
        quality_score: segment.quality_score,
        source_type: segment.source_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewSegment, TranslationMemory};

    fn tm() -> TranslationMemory {
        TranslationMemory::new("Medical", "en", "vi", "medical")
    }

    fn segment(tm: &TranslationMemory, source: &str, target: &str, quality: f64) -> TmSegment {
        TmSegment::new(tm, &NewSegment::new(source, target).with_quality(quality))
    }

    #[test]
    fn exact_match_ignores_case_and_whitespace() {
        let matcher = Matcher::default();
        let tm = tm();
        let candidates = vec![segment(&tm, " heart ", "tim", 0.9)];
        let index = matcher.build_index(&candidates);

        let found = matcher.find_exact("Heart", "en", "vi", &index).unwrap();
        assert_eq!(found.similarity, 1.0);
        assert_eq!(found.match_type, MatchType::Exact);
        assert_eq!(found.target_text, "tim");

        assert!(matcher.find_exact("liver", "en", "vi", &index).is_none());
    }

    #[test]
    fn fuzzy_match_returns_heart_not_lung() {
        let matcher = Matcher::default();
        let tm = tm();
        let candidates = vec![
            segment(&tm, "heart", "tim", 0.9),
            segment(&tm, "lung", "phổi", 0.9),
        ];

        let matches = matcher.find_fuzzy("the heart", &candidates, Some(0.6), None);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].source_text, "heart");
        assert_eq!(matches[0].match_type, MatchType::Fuzzy);
    }

    #[test]
    fn fuzzy_results_are_bounded_by_threshold() {
        let matcher = Matcher::default();
        let tm = tm();
        let candidates = vec![segment(&tm, "completely different words", "x", 0.9)];

        let matches = matcher.find_fuzzy("the heart is strong", &candidates, None, None);
        assert!(matches.is_empty());
    }

    #[test]
    fn length_prefilter_skips_disproportionate_candidates() {
        let matcher = Matcher::default();
        let tm = tm();
        // 후보 단어 수가 쿼리의 50%를 넘게 차이나면 비교 자체를 생략
        let candidates = vec![segment(&tm, "heart heart heart heart", "x", 0.9)];

        let matches = matcher.find_fuzzy("heart", &candidates, Some(0.1), None);
        assert!(matches.is_empty());
    }

    #[test]
    fn ties_are_broken_by_quality_score() {
        let matcher = Matcher::default();
        let tm_a = tm();
        let tm_b = TranslationMemory::new("General", "en", "vi", "general");
        let candidates = vec![
            segment(&tm_a, "the heart is strong", "machine target", 0.4),
            segment(&tm_b, "the heart is strong", "verified target", 0.95),
        ];

        let matches = matcher.find_fuzzy("the heart is strong", &candidates, None, None);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].similarity, matches[1].similarity);
        // 같은 유사도면 품질 높은 세그먼트가 먼저
        assert_eq!(matches[0].target_text, "verified target");
    }

    #[test]
    fn find_best_prefers_exact_over_fuzzy() {
        let matcher = Matcher::default();
        let tm = tm();
        let candidates = vec![
            segment(&tm, "the heart is strong", "exact target", 0.1),
            segment(&tm, "the heart is very strong", "fuzzy target", 0.99),
        ];
        let index = matcher.build_index(&candidates);

        let best = matcher
            .find_best("The heart is strong", "en", "vi", &index, &candidates, None)
            .unwrap();
        assert_eq!(best.match_type, MatchType::Exact);
        assert_eq!(best.target_text, "exact target");
    }

    #[test]
    fn classification_bands_are_evaluated_highest_first() {
        let matcher = Matcher::default();
        let floor = matcher.config().fuzzy_threshold;

        assert_eq!(matcher.classify(1.0, floor), MatchType::Exact);
        assert_eq!(matcher.classify(0.96, floor), MatchType::NearExact);
        assert_eq!(matcher.classify(0.8, floor), MatchType::Fuzzy);
        assert_eq!(matcher.classify(0.5, floor), MatchType::NoMatch);
    }

    #[test]
    fn cost_factors_increase_monotonically() {
        let matcher = Matcher::default();
        let tm = tm();
        let base = segment(&tm, "heart", "tim", 0.9);

        let cost_of = |match_type: MatchType| {
            let m = to_match(&base, 1.0, match_type);
            matcher.estimate_cost_factor(Some(&m))
        };

        // 상수 자체가 아니라 순서가 계약: EXACT < NEAR_EXACT < FUZZY < NO_MATCH
        let exact = cost_of(MatchType::Exact);
        let near_exact = cost_of(MatchType::NearExact);
        let fuzzy = cost_of(MatchType::Fuzzy);
        let no_match = matcher.estimate_cost_factor(None);

        assert!(exact < near_exact);
        assert!(near_exact < fuzzy);
        assert!(fuzzy < no_match);
    }

    #[test]
    fn normalize_cache_stays_bounded() {
        let config = MatchConfig {
            normalize_cache_capacity: 4,
            ..MatchConfig::default()
        };
        let matcher = Matcher::new(config);
        let tm = tm();
        let candidates = vec![segment(&tm, "heart", "tim", 0.9)];

        for i in 0..50 {
            let query = format!("query number {}", i);
            matcher.find_fuzzy(&query, &candidates, None, None);
        }

        let cache = matcher.cache.lock().unwrap();
        assert!(cache.len() <= 4);
    }
}
