//! Text Utilities
//!
//! 정규화, content hash, 단어 수, 유사도 계산
//!
//! source_hash는 언어쌍 + 정규화 텍스트에 대한 md5이므로,
//! 대소문자/공백만 다른 문자열은 같은 주소를 가집니다.

use std::collections::HashMap;

/// 소문자화 + 공백 축약 정규화
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// 공백 기준 단어 수
pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// 언어쌍 범위의 content hash (md5 hex)
pub fn source_hash(source_lang: &str, target_lang: &str, text: &str) -> String {
    let key = format!(
        "{}|{}|{}",
        source_lang.to_lowercase(),
        target_lang.to_lowercase(),
        normalize(text)
    );
    format!("{:x}", md5::compute(key.as_bytes()))
}

/// Ratcliff/Obershelp 유사도 비율 [0,1]
///
/// 가장 긴 공통 블록을 찾고 양쪽 나머지에 재귀 적용한 뒤
/// 2M / (|a| + |b|) 로 계산합니다. 대칭이며 similarity(a,a) == 1.0.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let matched = matching_total(&a_chars, &b_chars);

    (2.0 * matched as f64) / ((a_chars.len() + b_chars.len()) as f64)
}

fn matching_total(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (ai, bi, size) = longest_common_block(a, b);
    if size == 0 {
        return 0;
    }

    size + matching_total(&a[..ai], &b[..bi]) + matching_total(&a[ai + size..], &b[bi + size..])
}

/// 가장 긴 공통 블록 (시작 인덱스 a, 시작 인덱스 b, 길이)
///
/// O(|a|·|b|) DP, 직전 행만 유지. 동률이면 먼저 나온 블록.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0usize, 0usize, 0usize);
    let mut prev = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        let mut row = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                row[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = row;
    }

    best
}

/// 정규화 문자열 캐시 (반복 fuzzy 비교 최적화용)
///
/// 용량을 넘으면 전체를 비웁니다. 엔트리별 eviction 순서는 보장하지 않으며,
/// 순수 advisory 캐시이므로 비워져도 동작에는 영향이 없습니다.
pub struct NormalizeCache {
    capacity: usize,
    entries: HashMap<String, String>,
}

impl NormalizeCache {
    pub fn new(capacity: usize) -> Self {
        NormalizeCache {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    pub fn get_or_insert(&mut self, raw: &str) -> String {
        if let Some(cached) = self.entries.get(raw) {
            return cached.clone();
        }

        let normalized = normalize(raw);
        if self.entries.len() >= self.capacity {
            self.entries.clear();
        }
        self.entries.insert(raw.to_string(), normalized.clone());
        normalized
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
