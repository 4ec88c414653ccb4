//! Deterministic Arabic text normalization (C1).
//!
//! [`normalize`] is total and idempotent: it never fails, and
//! `normalize(normalize(t)) == normalize(t)` for all `t`. Correctness here
//! determines retrieval quality, since every chunk is embedded after
//! normalization and every query is normalized the same way before
//! encoding.

/// Combining diacritics (tashkeel) plus the superscript Alif, removed in
/// step 1.
const DIACRITICS: [char; 9] = [
    '\u{064B}', '\u{064C}', '\u{064D}', '\u{064E}', '\u{064F}', '\u{0650}', '\u{0651}', '\u{0652}',
    '\u{0670}',
];

/// Tatweel (kashida), removed in step 2.
const TATWEEL: char = '\u{0640}';

/// Alif variants folded to bare Alif (U+0627) in step 3.
const ALIF_VARIANTS: [char; 3] = ['\u{0623}', '\u{0625}', '\u{0622}'];
const ALIF: char = '\u{0627}';

/// Alif Maqsura (ى), folded to Ya (ي) in step 4.
const ALIF_MAQSURA: char = '\u{0649}';
const YA: char = '\u{064A}';

/// Normalize Arabic text for embedding.
///
/// Transformations are applied in this exact order:
/// 1. strip diacritics and the superscript Alif
/// 2. strip tatweel
/// 3. fold Alif variants (أ إ آ) to bare Alif (ا)
/// 4. fold Alif Maqsura (ى) to Ya (ي)
/// 5. Ta Marbuta (ة) is *not* touched — folding it to Ha (ه) would harm
///    precision on Arabic legal terms
/// 6. collapse runs of Unicode whitespace to a single ASCII space
/// 7. trim leading/trailing whitespace
///
/// Non-Arabic characters pass through unchanged. Empty or whitespace-only
/// input yields an empty string.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;

    for ch in text.chars() {
        if DIACRITICS.contains(&ch) || ch == TATWEEL {
            continue;
        }
        let mapped = if ALIF_VARIANTS.contains(&ch) {
            ALIF
        } else if ch == ALIF_MAQSURA {
            YA
        } else {
            ch
        };

        if mapped.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(mapped);
            last_was_space = false;
        }
    }

    if out.ends_with(' ') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_ta_marbuta_and_strips_diacritics() {
        // scenario 1 of the spec's end-to-end suite
        let input = "أَلْكَلِمَةُ الْعَرَبِيَّةُ";
        let output = normalize(input);
        assert_eq!(output, "الكلمة العربية");
        assert!(output.contains('ة'));
    }

    #[test]
    fn idempotent() {
        let samples = [
            "أَلسَّلامُ عَلَيْكُم",
            "مَرْحَباً   بِكُم\u{0640}\u{0640}",
            "",
            "plain ascii text",
            "مزيج Mixed 123 نص",
        ];
        for s in samples {
            let once = normalize(s);
            let twice = normalize(&once);
            assert_eq!(once, twice, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn empty_and_whitespace_only_input_yields_empty_string() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t\n  "), "");
    }

    #[test]
    fn collapses_whitespace_runs_and_trims() {
        assert_eq!(normalize("  a   b\tc\n\nd  "), "a b c d");
    }

    #[test]
    fn folds_alif_variants_and_alif_maqsura() {
        assert_eq!(normalize("أإآ"), "ااا");
        assert_eq!(normalize("إلى"), "الي");
    }

    #[test]
    fn non_arabic_passes_through_unchanged() {
        assert_eq!(normalize("hello world"), "hello world");
        assert_eq!(normalize("Article 74: terms."), "Article 74: terms.");
    }

    #[test]
    fn never_splits_or_merges_unrelated_clusters() {
        let input = "مادة ١٢٣ نظام العمل";
        let output = normalize(input);
        assert!(output.contains("١٢٣"));
    }

    proptest::proptest! {
        /// `normalize` must be idempotent for any Unicode input, not just
        /// the handful of Arabic samples above (§8: "for all text t:
        /// normalize(normalize(t)) == normalize(t)").
        #[test]
        fn idempotent_over_arbitrary_unicode(s in ".*") {
            let once = normalize(&s);
            let twice = normalize(&once);
            proptest::prop_assert_eq!(once, twice);
        }

        /// Never panics, regardless of input.
        #[test]
        fn total_over_arbitrary_unicode(s in ".*") {
            let _ = normalize(&s);
        }
    }
}
