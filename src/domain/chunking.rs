//! Chunk Formatter (C2): turns one parsed article or case section, plus its
//! hierarchical ancestors, into one or more embedding-ready chunk texts.
//!
//! The header this module prepends is the single design decision that
//! lifts retrieval accuracy on Arabic legal corpora: a short or generic
//! article body still ranks correctly when the query names the parent
//! law's topic, because the law's identity is embedded alongside the
//! body, not just stored as sidecar metadata.

use crate::domain::types::SectionType;
use unicode_segmentation::UnicodeSegmentation;

/// Default maximum segment size, in characters.
pub const SEG_CHARS: usize = 1200;
/// Default overlap between consecutive segments, in characters.
pub const OVERLAP: usize = 150;

/// Sentence-ish terminators recognized when choosing a segment boundary.
/// Arabic full stop (۔) and comma (،) are included per the segmentation
/// rule, alongside the Latin/Arabic question mark and exclamation point.
const TERMINATORS: [char; 5] = ['.', '۔', '؟', '!', '،'];

/// How many words to look back from a hard cut point for a terminator
/// before giving up and falling back to a plain word boundary.
const LOOKBACK_WORDS: usize = 10;

/// Format a law article into one or more chunk texts.
///
/// The first line is a bracketed context header joining, with `" - "`, the
/// non-empty fields `📜 {law_name}`, `الباب: {branch_name}`,
/// `الفصل: {chapter_name}`; a blank line follows. Then
/// `المادة {article_number} - {article_title}` (the `" - title"` suffix is
/// omitted when `article_title` is empty), another blank line, then the
/// article body — possibly split into overlapping segments, each carrying
/// its own copy of the header so every chunk is independently
/// contextualized.
///
/// Returns an empty list when `article_content` is empty or
/// whitespace-only. When `law_name` is empty, only the article prefix is
/// emitted (no bracketed context header).
pub fn format_article(
    law_name: &str,
    branch_name: Option<&str>,
    chapter_name: Option<&str>,
    article_number: &str,
    article_title: Option<&str>,
    article_content: &str,
) -> Vec<String> {
    let body = article_content.trim();
    if body.is_empty() {
        return Vec::new();
    }

    let mut header_lines = Vec::new();
    if !law_name.trim().is_empty() {
        let mut parts = vec![format!("📜 {}", law_name.trim())];
        if let Some(b) = branch_name.map(str::trim).filter(|s| !s.is_empty()) {
            parts.push(format!("الباب: {b}"));
        }
        if let Some(c) = chapter_name.map(str::trim).filter(|s| !s.is_empty()) {
            parts.push(format!("الفصل: {c}"));
        }
        header_lines.push(parts.join(" - "));
        header_lines.push(String::new());
    }

    header_lines.push(match article_title.map(str::trim).filter(|s| !s.is_empty()) {
        Some(title) => format!("المادة {article_number} - {title}"),
        None => format!("المادة {article_number}"),
    });
    header_lines.push(String::new());

    build_segments(&header_lines.join("\n"), body)
}

/// Format a judicial case section into one or more chunk texts. Header
/// policy mirrors [`format_article`]: a context line naming the case, then
/// the section-type label, then the section body.
///
/// Returns an empty list when `section_content` is empty or
/// whitespace-only. When `case_title` is empty, only the section-type
/// prefix is emitted.
pub fn format_case_section(
    case_title: &str,
    section_type: SectionType,
    section_content: &str,
) -> Vec<String> {
    let body = section_content.trim();
    if body.is_empty() {
        return Vec::new();
    }

    let mut header_lines = Vec::new();
    if !case_title.trim().is_empty() {
        header_lines.push(format!("⚖️ {}", case_title.trim()));
        header_lines.push(String::new());
    }
    header_lines.push(section_type.label_ar().to_string());
    header_lines.push(String::new());

    build_segments(&header_lines.join("\n"), body)
}

fn build_segments(header: &str, body: &str) -> Vec<String> {
    segment_body(body, SEG_CHARS, OVERLAP)
        .into_iter()
        .map(|segment| format!("{header}\n{segment}"))
        .collect()
}

/// Split `body` into segments of at most `seg_chars` grapheme clusters,
/// with `overlap` clusters of shared text between consecutive segments.
/// Boundaries prefer the nearest prior sentence terminator within a
/// lookback window of about 10 words; absent a terminator, they fall back
/// to the nearest word boundary.
///
/// Cutting on grapheme clusters rather than `char`s matters specifically
/// for Arabic: a combining diacritic (when present; `article_content` is
/// stored pre-normalization) must never be separated from the base letter
/// it modifies by a segment boundary landing between the two.
fn segment_body(body: &str, seg_chars: usize, overlap: usize) -> Vec<String> {
    let graphemes: Vec<&str> = body.graphemes(true).collect();
    let len = graphemes.len();
    if len <= seg_chars {
        return vec![body.to_string()];
    }

    let mut segments = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = (start + seg_chars).min(len);
        let end = if hard_end >= len {
            len
        } else {
            choose_boundary(&graphemes, start, hard_end)
        };

        let segment = graphemes[start..end].concat();
        let segment = segment.trim();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }

        if end >= len {
            break;
        }

        let next_start = end.saturating_sub(overlap);
        // Guarantee forward progress even if overlap >= segment length.
        start = if next_start > start { next_start } else { end };
    }
    segments
}

/// Choose where to cut `graphemes[start..hard_end]`: prefer the rightmost
/// terminator within the last `LOOKBACK_WORDS` words before `hard_end`,
/// else the nearest word boundary at or before `hard_end`.
fn choose_boundary(graphemes: &[&str], start: usize, hard_end: usize) -> usize {
    let window_start = words_back(graphemes, hard_end, start, LOOKBACK_WORDS);

    for i in (window_start..hard_end).rev() {
        if is_terminator(graphemes[i]) {
            let cut = i + 1;
            if cut > start {
                return cut;
            }
        }
    }

    word_boundary_at_or_before(graphemes, hard_end, start)
}

fn is_terminator(grapheme: &str) -> bool {
    grapheme.chars().count() == 1 && TERMINATORS.contains(&grapheme.chars().next().unwrap())
}

fn is_whitespace_grapheme(grapheme: &str) -> bool {
    grapheme.chars().all(char::is_whitespace)
}

/// Walk back `word_count` whitespace-delimited words from `from`, not
/// going past `floor`.
fn words_back(graphemes: &[&str], from: usize, floor: usize, word_count: usize) -> usize {
    let mut i = from;
    let mut words_seen = 0;
    let mut in_word = false;

    while i > floor {
        i -= 1;
        if is_whitespace_grapheme(graphemes[i]) {
            if in_word {
                words_seen += 1;
                in_word = false;
                if words_seen >= word_count {
                    return i + 1;
                }
            }
        } else {
            in_word = true;
        }
    }
    floor
}

/// Nearest whitespace boundary at or before `hard_end`, not going past
/// `floor`. Falls back to a hard cut at `hard_end` if no whitespace is
/// found (e.g. one very long unbroken token).
fn word_boundary_at_or_before(graphemes: &[&str], hard_end: usize, floor: usize) -> usize {
    let mut i = hard_end;
    while i > floor {
        if is_whitespace_grapheme(graphemes[i - 1]) {
            return i;
        }
        i -= 1;
    }
    hard_end.max(floor + 1).min(graphemes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_produces_zero_segments() {
        assert!(format_article("نظام", None, None, "1", None, "").is_empty());
        assert!(format_article("نظام", None, None, "1", None, "   ").is_empty());
    }

    #[test]
    fn header_includes_law_branch_chapter_and_article() {
        let segments = format_article(
            "نظام العمل السعودي",
            Some("التعريفات / الأحكام العامة"),
            Some("التعريفات"),
            "الأولى",
            Some("اسم النظام"),
            "يسمى هذا النظام نظام العمل.",
        );
        assert_eq!(segments.len(), 1);
        let text = &segments[0];
        assert!(text.starts_with("📜 نظام العمل السعودي - الباب: التعريفات / الأحكام العامة - الفصل: التعريفات"));
        assert!(text.contains("المادة الأولى - اسم النظام"));
        assert!(text.ends_with("يسمى هذا النظام نظام العمل."));
    }

    #[test]
    fn omits_title_suffix_when_title_empty() {
        let segments = format_article("نظام", None, None, "5", None, "نص المادة");
        assert!(segments[0].contains("المادة 5"));
        assert!(!segments[0].contains("المادة 5 - "));
    }

    #[test]
    fn omits_bracketed_header_when_law_name_empty() {
        let segments = format_article("", None, None, "5", None, "نص المادة");
        assert!(!segments[0].contains("📜"));
        assert!(segments[0].starts_with("المادة 5"));
    }

    #[test]
    fn case_section_header_uses_title_and_type_label() {
        let segments =
            format_case_section("قضية رقم 1", SectionType::Ruling, "حكمت المحكمة بكذا.");
        assert!(segments[0].starts_with("⚖️ قضية رقم 1"));
        assert!(segments[0].contains(SectionType::Ruling.label_ar()));
    }

    #[test]
    fn long_body_is_split_with_overlap_and_every_segment_at_most_seg_chars() {
        let sentence = "هذا نص طويل يوضح آلية تقسيم المحتوى إلى مقاطع متعددة. ";
        let body: String = sentence.repeat(40); // ~2640 chars
        let segments = format_article("نظام", None, None, "1", None, &body);
        assert!(segments.len() >= 2);
        for seg in &segments {
            let body_only = seg.split("\n\n").last().unwrap();
            assert!(body_only.chars().count() <= SEG_CHARS + 1);
        }
    }

    #[test]
    fn deterministic_across_runs() {
        let body = "نص. ".repeat(500);
        let a = format_article("قانون", Some("باب"), None, "2", Some("عنوان"), &body);
        let b = format_article("قانون", Some("باب"), None, "2", Some("عنوان"), &body);
        assert_eq!(a, b);
    }

    proptest::proptest! {
        /// `format_article` must be deterministic for arbitrary bodies, not
        /// just the fixed samples above (§8: "format_article(...) output is
        /// stable across runs given identical inputs").
        #[test]
        fn deterministic_over_arbitrary_bodies(body in ".{0,4000}") {
            let a = format_article("قانون", Some("باب"), None, "1", None, &body);
            let b = format_article("قانون", Some("باب"), None, "1", None, &body);
            proptest::prop_assert_eq!(a, b);
        }

        /// No segment's body exceeds `SEG_CHARS` (+1 for the trailing
        /// boundary rounding already exercised by the fixed-input test
        /// above), regardless of body content.
        #[test]
        fn segments_never_exceed_seg_chars(body in ".{0,4000}") {
            let segments = format_article("قانون", None, None, "1", None, &body);
            for seg in &segments {
                let body_only = seg.split("\n\n").last().unwrap();
                proptest::prop_assert!(body_only.chars().count() <= SEG_CHARS + 1);
            }
        }
    }

    #[test]
    fn consecutive_segments_share_the_overlap_window() {
        // window much smaller than OVERLAP so containment is guaranteed
        // regardless of where sentence-boundary snapping lands the cut.
        let window = 64;
        assert!(window < OVERLAP);

        let sentence = "جملة قصيرة هنا لإثبات التغطية الكاملة للنص الأصلي. ";
        let body: String = sentence.repeat(80);
        let full_with_header = format_article("قانون", None, None, "9", None, &body);
        assert!(full_with_header.len() >= 2);

        let body_chars: Vec<char> = body.trim().chars().collect();
        let mut p = 0;
        while p + window <= body_chars.len() {
            let probe: String = body_chars[p..p + window].iter().collect();
            let found = full_with_header
                .iter()
                .any(|segment| segment.contains(&probe));
            assert!(found, "window at {p} missing from every segment");
            p += window / 2;
        }
    }
}
