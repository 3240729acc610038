//! Tag extraction from page text and keyword-derived variant tags.
//!
//! Two sources feed tag suggestions:
//!
//! 1. **Extracted**: candidate words pulled out of scraped page text with a
//!    script-aware word pattern (2 to 10 letters or digits), filtered by a
//!    stoplist, counted across every page and ranked by frequency. The ranked
//!    list is split into tertiles labeled `primary`, `general` and `other`.
//! 2. **Variants**: always available, generated from the keyword alone:
//!    a category lookup table, suffix/prefix augmentation and a concept
//!    association table.
//!
//! [`merge_tags`] concatenates both, extracted first.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::source_tags;

/// Default maximum number of tag suggestions kept per keyword.
pub const MAX_TAGS: usize = 15;
/// Maximum number of keyword-derived variant tags.
pub const MAX_VARIANT_TAGS: usize = 10;

pub const VARIANT_CATEGORY: &str = "variant";

const STOPWORDS: &[&str] = &[
    "그리고", "하지만", "그런데", "그래서", "이것", "저것", "여기", "거기", "이제", "지금", "오늘",
    "내일", "어제", "the", "and", "for", "with", "that", "this", "from", "are", "was", "you",
    "your", "our", "not", "but", "have", "has", "will", "can", "all", "more", "about",
];

/// Keyword fragment → topical category.
const CATEGORY_KEYS: &[(&str, &[&str])] = &[
    ("음식", &["맛집", "요리", "레시피", "음식", "먹거리", "카페", "디저트"]),
    ("여행", &["여행", "관광", "숙박", "호텔", "펜션", "명소"]),
    ("패션", &["패션", "옷", "스타일", "코디", "브랜드", "쇼핑"]),
    ("뷰티", &["화장품", "스킨케어", "메이크업", "뷰티", "미용"]),
    ("건강", &["건강", "운동", "다이어트", "헬스", "요가", "피트니스"]),
    ("육아", &["육아", "아이", "아기", "유아", "교육", "장난감"]),
    ("인테리어", &["인테리어", "가구", "홈데코", "집꾸미기", "리모델링"]),
    ("취미", &["취미", "독서", "영화", "음악", "게임", "스포츠"]),
];

const CATEGORY_TAGS: &[(&str, &[&str])] = &[
    ("음식", &["맛집추천", "요리법", "레시피", "홈쿡", "외식", "디저트"]),
    ("여행", &["여행지추천", "국내여행", "해외여행", "여행팁", "관광명소"]),
    ("패션", &["데일리룩", "패션코디", "스타일링", "트렌드", "쇼핑"]),
    ("뷰티", &["뷰티팁", "화장법", "스킨케어", "제품리뷰", "미용"]),
    ("건강", &["건강관리", "운동법", "다이어트", "헬스케어", "웰빙"]),
    ("육아", &["육아팁", "아이용품", "교육", "놀이", "성장발달"]),
    ("인테리어", &["홈스타일링", "인테리어팁", "가구", "홈데코", "셀프인테리어"]),
    ("취미", &["취미생활", "여가활동", "문화생활", "자기계발", "힐링"]),
];

const SUFFIXES: &[&str] = &["추천", "후기", "리뷰", "정보", "방법", "팁", "가이드"];
const PREFIXES: &[&str] = &["베스트", "인기", "추천", "최고의"];
const MAX_AFFIX_VARIANTS: usize = 5;

const CONCEPTS: &[(&str, &[&str])] = &[
    ("탈모", &["모발관리", "헤어케어", "샴푸", "두피", "발모", "모발"]),
    ("다이어트", &["살빼기", "체중감량", "운동", "식단", "헬스", "피트니스"]),
    ("요리", &["레시피", "쿠킹", "홈쿡", "음식", "맛집", "먹거리"]),
    ("여행", &["관광", "휴가", "여행지", "숙박", "맛집", "명소"]),
];

fn word_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[\p{L}\p{N}]{2,10}\b").expect("static regex"))
}

/// A tag ready to be stored, with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagCandidate {
    pub tag: String,
    pub frequency: i64,
    pub category: Option<String>,
    pub source: String,
}

fn is_candidate(word: &str, keyword: &str) -> bool {
    if word == keyword || STOPWORDS.contains(&word) {
        return false;
    }
    !word.chars().all(|c| c.is_numeric())
}

/// Extract candidate words from one text, lowercased, in order of appearance.
pub fn extract_terms(text: &str, keyword: &str) -> Vec<String> {
    let keyword = keyword.to_lowercase();
    word_pattern()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| is_candidate(w, &keyword))
        .collect()
}

/// Frequency counter over many page texts.
#[derive(Debug, Default)]
pub struct FrequencyTally {
    counts: HashMap<String, i64>,
}

impl FrequencyTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_text(&mut self, text: &str, keyword: &str) {
        for term in extract_terms(text, keyword) {
            *self.counts.entry(term).or_insert(0) += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Top `limit` terms by descending frequency (ties alphabetical), each
    /// labeled with its rank tertile.
    pub fn ranked(&self, limit: usize) -> Vec<TagCandidate> {
        let mut entries: Vec<(&String, &i64)> = self.counts.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        entries.truncate(limit);

        let n = entries.len();
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (tag, freq))| TagCandidate {
                tag: tag.clone(),
                frequency: *freq,
                category: Some(tertile_label(i, n).to_string()),
                source: source_tags::BLOG_CRAWLING.to_string(),
            })
            .collect()
    }
}

/// `primary` for the top third of ranks, `general` for the middle, `other` after.
pub fn tertile_label(index: usize, total: usize) -> &'static str {
    if index * 3 < total {
        "primary"
    } else if index * 3 < total * 2 {
        "general"
    } else {
        "other"
    }
}

/// Topical category of a keyword, if any fragment matches.
pub fn keyword_category(keyword: &str) -> Option<&'static str> {
    CATEGORY_KEYS
        .iter()
        .find(|(_, keys)| keys.iter().any(|k| keyword.contains(k)))
        .map(|(category, _)| *category)
}

/// Tags generated from the keyword alone, deduplicated, at most
/// [`MAX_VARIANT_TAGS`].
pub fn variant_tags(keyword: &str) -> Vec<String> {
    let compact: String = keyword.split_whitespace().collect();
    if compact.is_empty() {
        return Vec::new();
    }

    let mut tags: Vec<String> = Vec::new();
    if let Some(category) = keyword_category(keyword) {
        if let Some((_, extra)) = CATEGORY_TAGS.iter().find(|(c, _)| *c == category) {
            tags.extend(extra.iter().map(|s| s.to_string()));
        }
    }

    let affixed = SUFFIXES
        .iter()
        .map(|s| format!("{compact}{s}"))
        .chain(PREFIXES.iter().map(|p| format!("{p}{compact}")))
        .take(MAX_AFFIX_VARIANTS);
    tags.extend(affixed);

    if let Some((_, concepts)) = CONCEPTS.iter().find(|(key, _)| keyword.contains(key)) {
        tags.extend(concepts.iter().map(|s| s.to_string()));
    }

    let mut seen = std::collections::HashSet::new();
    tags.retain(|t| seen.insert(t.clone()));
    tags.truncate(MAX_VARIANT_TAGS);
    tags
}

/// Extracted tags first, then variants not already present, capped at `limit`.
pub fn merge_tags(extracted: Vec<TagCandidate>, variants: &[String], limit: usize) -> Vec<TagCandidate> {
    let mut merged = extracted;
    for variant in variants {
        if merged.iter().any(|t| &t.tag == variant) {
            continue;
        }
        merged.push(TagCandidate {
            tag: variant.clone(),
            frequency: 1,
            category: Some(VARIANT_CATEGORY.to_string()),
            source: source_tags::KEYWORD_ANALYSIS.to_string(),
        });
    }
    merged.retain(|t| t.tag.chars().count() < 20);
    merged.truncate(limit);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_terms_filters() {
        let terms = extract_terms("탈모 샴푸 그리고 2024 탈모에 좋은 Shampoo a", "탈모");
        assert_eq!(terms, vec!["샴푸", "탈모에", "좋은", "shampoo"]);
    }

    #[test]
    fn test_extract_terms_length_bounds() {
        let terms = extract_terms("x ab abcdefghij abcdefghijk", "none");
        assert_eq!(terms, vec!["ab", "abcdefghij"]);
    }

    #[test]
    fn test_tally_ranks_by_frequency() {
        let mut tally = FrequencyTally::new();
        tally.add_text("샴푸 두피 샴푸", "탈모");
        tally.add_text("두피 샴푸 모발", "탈모");
        let ranked = tally.ranked(10);
        let tags: Vec<_> = ranked.iter().map(|t| t.tag.as_str()).collect();
        assert_eq!(tags, vec!["샴푸", "두피", "모발"]);
        assert_eq!(ranked[0].frequency, 3);
        assert_eq!(ranked[0].category.as_deref(), Some("primary"));
        assert_eq!(ranked[1].category.as_deref(), Some("general"));
        assert_eq!(ranked[2].category.as_deref(), Some("other"));
        assert!(ranked.iter().all(|t| t.source == source_tags::BLOG_CRAWLING));
    }

    #[test]
    fn test_tertiles() {
        let labels: Vec<_> = (0..6).map(|i| tertile_label(i, 6)).collect();
        assert_eq!(
            labels,
            vec!["primary", "primary", "general", "general", "other", "other"]
        );
        assert_eq!(tertile_label(0, 1), "primary");
    }

    #[test]
    fn test_variant_tags_for_known_concept() {
        let tags = variant_tags("탈모");
        assert_eq!(tags.len(), MAX_VARIANT_TAGS);
        assert_eq!(&tags[..5], &["탈모추천", "탈모후기", "탈모리뷰", "탈모정보", "탈모방법"]);
        assert!(tags.contains(&"모발관리".to_string()));
    }

    #[test]
    fn test_variant_tags_category_first() {
        let tags = variant_tags("제주 여행");
        assert_eq!(tags[0], "여행지추천");
        assert!(tags.contains(&"제주여행추천".to_string()));
    }

    #[test]
    fn test_variant_tags_plain_keyword() {
        let tags = variant_tags("rust");
        assert_eq!(tags.len(), 5);
        assert!(variant_tags("   ").is_empty());
    }

    #[test]
    fn test_merge_dedupes_and_caps() {
        let mut tally = FrequencyTally::new();
        tally.add_text("탈모추천 샴푸", "탈모");
        let merged = merge_tags(tally.ranked(10), &variant_tags("탈모"), MAX_TAGS);
        assert!(merged.len() <= MAX_TAGS);
        let count = merged.iter().filter(|t| t.tag == "탈모추천").count();
        assert_eq!(count, 1);
        let variant = merged.iter().find(|t| t.tag == "탈모후기").unwrap();
        assert_eq!(variant.category.as_deref(), Some(VARIANT_CATEGORY));
        assert_eq!(variant.source, source_tags::KEYWORD_ANALYSIS);
    }
}
