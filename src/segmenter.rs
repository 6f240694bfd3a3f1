//! Segmenter
//!
//! 원문 텍스트를 번역 단위(문장/문단/smart)로 분할
//!
//! 분할 결과는 원문 순서를 유지하는 0-based 인덱스를 가지며,
//! 짧은 세그먼트는 버리지 않고 이웃 세그먼트에 병합합니다.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::models::{SegmentConfig, SegmentMode};
use crate::text;

/// 문장 경계로 취급하지 않는 약어 (마지막 마침표 포함)
static ABBREVIATIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "mr.", "mrs.", "ms.", "dr.", "prof.", "st.", "etc.", "e.g.", "i.e.", "vs.", "fig.",
        "no.",
    ]
    .into_iter()
    .collect()
});

/// 분할된 번역 단위
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentUnit {
    /// 0-based 원문 순서 인덱스
    pub index: usize,
    pub text: String,
    pub word_count: u32,
}

/// 텍스트 세그먼터
pub struct Segmenter {
    config: SegmentConfig,
}

impl Default for Segmenter {
    fn default() -> Self {
        Segmenter::new(SegmentConfig::default())
    }
}

impl Segmenter {
    pub fn new(config: SegmentConfig) -> Self {
        Segmenter { config }
    }

    /// 텍스트를 번역 단위 리스트로 분할
    pub fn segment(&self, input: &str, mode: SegmentMode) -> Vec<SegmentUnit> {
        if input.trim().is_empty() {
            return Vec::new();
        }

        let pieces = match mode {
            SegmentMode::Sentence => self.merge_short(split_sentences(input), " "),
            SegmentMode::Paragraph => self.merge_short(split_paragraphs(input), "\n\n"),
            SegmentMode::Smart => self.split_smart(input),
        };

        pieces
            .into_iter()
            .enumerate()
            .map(|(index, piece)| SegmentUnit {
                index,
                word_count: text::word_count(&piece),
                text: piece,
            })
            .collect()
    }

    /// smart 모드: 짧은 문서는 문장 단위, 긴 문서는 문단 단위 + 과대 문단 재분할
    fn split_smart(&self, input: &str) -> Vec<String> {
        if text::word_count(input) < self.config.smart_word_threshold {
            return self.merge_short(split_sentences(input), " ");
        }

        let paragraphs = self.merge_short(split_paragraphs(input), "\n\n");
        let mut pieces = Vec::new();
        for paragraph in paragraphs {
            if text::word_count(&paragraph) > self.config.max_paragraph_words {
                pieces.extend(self.merge_short(split_sentences(&paragraph), " "));
            } else {
                pieces.push(paragraph);
            }
        }
        pieces
    }

    /// min_segment_words 미만의 세그먼트를 직전 세그먼트에 병합
    ///
    /// 선두 세그먼트는 선행자가 없으므로 예외적으로 다음 세그먼트에 병합합니다.
    /// 병합은 항상 인접 이웃과만 일어나며 순서를 바꾸지 않습니다.
    fn merge_short(&self, pieces: Vec<String>, joiner: &str) -> Vec<String> {
        let min_words = self.config.min_segment_words;
        let mut merged: Vec<String> = Vec::new();

        for piece in pieces {
            if text::word_count(&piece) < min_words {
                if let Some(last) = merged.last_mut() {
                    last.push_str(joiner);
                    last.push_str(&piece);
                    continue;
                }
            }
            merged.push(piece);
        }

        if merged.len() >= 2 && text::word_count(&merged[0]) < min_words {
            let head = merged.remove(0);
            let combined = format!("{}{}{}", head, joiner, merged[0]);
            merged[0] = combined;
        }

        merged
    }
}

/// 문장 분할
///
/// ASCII 종결부호는 "공백 + 문장 시작 문자"가 뒤따를 때만 경계로 보고,
/// CJK 전각 종결부호(。！？．)는 공백 없이도 경계로 취급합니다.
fn split_sentences(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if is_cjk_terminator(c) {
            let mut end = i + 1;
            while end < chars.len() && is_closing_mark(chars[end]) {
                end += 1;
            }
            push_trimmed(&mut sentences, &chars[start..end]);
            while end < chars.len() && chars[end].is_whitespace() {
                end += 1;
            }
            start = end;
            i = end;
            continue;
        }

        if is_ascii_terminator(c) {
            let mut end = i + 1;
            while end < chars.len() && is_closing_mark(chars[end]) {
                end += 1;
            }

            let followed_by_space = end < chars.len() && chars[end].is_whitespace();
            if followed_by_space {
                let mut next = end;
                while next < chars.len() && chars[next].is_whitespace() {
                    next += 1;
                }
                let boundary = next < chars.len()
                    && starts_sentence(chars[next])
                    && !(c == '.' && ends_with_abbreviation(&chars[start..=i]));
                if boundary {
                    push_trimmed(&mut sentences, &chars[start..end]);
                    start = next;
                    i = next;
                    continue;
                }
            }
        }

        i += 1;
    }

    if start < chars.len() {
        push_trimmed(&mut sentences, &chars[start..]);
    }

    sentences
}

/// 빈 줄 경계 기준 문단 분할
fn split_paragraphs(input: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in input.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }

    paragraphs
}

fn push_trimmed(sentences: &mut Vec<String>, chars: &[char]) {
    let piece: String = chars.iter().collect::<String>().trim().to_string();
    if !piece.is_empty() {
        sentences.push(piece);
    }
}

fn is_ascii_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

fn is_cjk_terminator(c: char) -> bool {
    matches!(c, '。' | '！' | '？' | '．')
}

fn is_closing_mark(c: char) -> bool {
    matches!(c, '"' | '\'' | '”' | '’' | ')' | ']' | '」' | '』')
}

/// 문장 시작으로 볼 수 있는 문자 (대문자 또는 CJK 계열)
fn starts_sentence(c: char) -> bool {
    c.is_uppercase() || is_cjk_char(c)
}

fn is_cjk_char(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'   // 한자
        | '\u{3040}'..='\u{30FF}' // 히라가나/가타카나
        | '\u{AC00}'..='\u{D7AF}' // 한글
    )
}

/// 경계 후보 '.' 직전 토큰이 약어인지 확인
fn ends_with_abbreviation(chars: &[char]) -> bool {
    let mut j = chars.len();
    while j > 0 {
        let c = chars[j - 1];
        if c.is_alphanumeric() || c == '.' {
            j -= 1;
        } else {
            break;
        }
    }

    let token: String = chars[j..].iter().collect::<String>().to_lowercase();
    ABBREVIATIONS.contains(token.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_texts(units: &[SegmentUnit]) -> Vec<&str> {
        units.iter().map(|u| u.text.as_str()).collect()
    }

    #[test]
    fn sentence_mode_splits_on_terminator_and_capital() {
        let segmenter = Segmenter::default();
        let units = segmenter.segment(
            "The heart is strong. The lungs are clear. Everything looks fine today.",
            SegmentMode::Sentence,
        );

        assert_eq!(
            unit_texts(&units),
            vec![
                "The heart is strong.",
                "The lungs are clear.",
                "Everything looks fine today.",
            ]
        );
        // 인덱스는 0-based 원문 순서
        assert_eq!(units.iter().map(|u| u.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(units[0].word_count, 4);
    }

    #[test]
    fn sentence_mode_respects_abbreviations() {
        let segmenter = Segmenter::default();
        let units = segmenter.segment(
            "Dr. Kim examined the patient. The result was normal.",
            SegmentMode::Sentence,
        );

        assert_eq!(
            unit_texts(&units),
            vec!["Dr. Kim examined the patient.", "The result was normal."]
        );
    }

    #[test]
    fn sentence_mode_handles_cjk_terminators() {
        let config = SegmentConfig {
            min_segment_words: 1,
            ..SegmentConfig::default()
        };
        let segmenter = Segmenter::new(config);
        let units = segmenter.segment("今日は晴れです。明日は雨です。", SegmentMode::Sentence);

        assert_eq!(unit_texts(&units), vec!["今日は晴れです。", "明日は雨です。"]);
    }

    #[test]
    fn short_segment_merges_into_preceding() {
        let segmenter = Segmenter::default();
        let units = segmenter.segment(
            "This is a long first sentence. Ok. Another long sentence follows here.",
            SegmentMode::Sentence,
        );

        assert_eq!(
            unit_texts(&units),
            vec![
                "This is a long first sentence. Ok.",
                "Another long sentence follows here.",
            ]
        );
    }

    #[test]
    fn short_leading_segment_merges_forward() {
        let segmenter = Segmenter::default();
        let units = segmenter.segment("Hello. This is a longer sentence here.", SegmentMode::Sentence);

        assert_eq!(unit_texts(&units), vec!["Hello. This is a longer sentence here."]);
    }

    #[test]
    fn sentence_mode_reconstructs_input_with_separators() {
        let segmenter = Segmenter::default();
        let input = "The heart is strong. The lungs are clear. Everything looks fine today.";
        let units = segmenter.segment(input, SegmentMode::Sentence);

        assert_eq!(unit_texts(&units).join(" "), input);
    }

    #[test]
    fn paragraph_mode_splits_on_blank_lines_and_reconstructs() {
        let segmenter = Segmenter::default();
        let input = "First paragraph with several words here.\n\nSecond paragraph also has many words.";
        let units = segmenter.segment(input, SegmentMode::Paragraph);

        assert_eq!(units.len(), 2);
        assert_eq!(unit_texts(&units).join("\n\n"), input);
    }

    #[test]
    fn smart_mode_uses_sentences_below_threshold() {
        let segmenter = Segmenter::default();
        let input = "The heart is strong. The lungs are clear today.";
        let smart = segmenter.segment(input, SegmentMode::Smart);
        let sentence = segmenter.segment(input, SegmentMode::Sentence);

        assert_eq!(unit_texts(&smart), unit_texts(&sentence));
    }

    #[test]
    fn smart_mode_resplits_oversized_paragraphs() {
        let config = SegmentConfig {
            min_segment_words: 3,
            smart_word_threshold: 5,
            max_paragraph_words: 8,
        };
        let segmenter = Segmenter::new(config);

        let input = "One short paragraph stays whole here.\n\nThis very long paragraph runs on. It must be split into sentences. Each piece stands alone now.";
        let units = segmenter.segment(input, SegmentMode::Smart);

        assert_eq!(
            unit_texts(&units),
            vec![
                "One short paragraph stays whole here.",
                "This very long paragraph runs on.",
                "It must be split into sentences.",
                "Each piece stands alone now.",
            ]
        );
    }

    #[test]
    fn empty_input_produces_no_segments() {
        let segmenter = Segmenter::default();
        assert!(segmenter.segment("   \n ", SegmentMode::Sentence).is_empty());
    }
}
