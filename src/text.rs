// =============================================================================
// text.rs - TURNING CLERK-TYPED HTML INTO CLEAN STRINGS
// =============================================================================
//
// Court pages are hand-maintained. Names are in ALL CAPS, whitespace is
// whatever the clerk's editor produced, and "is this paragraph a case?" is
// answered by looking for "v." somewhere inside it.
//
// This module holds the small text tools every court module leans on:
// whitespace collapsing, element text, title-casing, the case-marker
// automaton, and the judge-column padding heuristic.
// =============================================================================

use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use scraper::ElementRef;
use tracing::debug;

/// Markers that make a paragraph or link look like a case caption.
/// Matched case-sensitively, the way the Louisiana releases print them.
const CASE_MARKERS: &[&str] = &["v.", "IN RE", "IN THE", "vs."];

static CASE_MARKER_AUTOMATON: LazyLock<AhoCorasick> = LazyLock::new(|| {
    AhoCorasick::new(CASE_MARKERS).expect("Failed to build case marker automaton")
});

/// Words kept lowercase by [`titlecase`] unless they open or close the name.
const SMALL_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "en", "for", "if", "in", "of", "on", "or", "the",
    "to", "v", "v.", "via", "vs", "vs.",
];

/// Collapse every whitespace run into one space and trim both ends.
pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All descendant text of an element, whitespace collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    collapse_ws(&el.text().collect::<Vec<_>>().join(" "))
}

/// Only the text nodes that are direct children of `el`, in order.
pub fn direct_text(el: ElementRef<'_>) -> Vec<&str> {
    el.children()
        .filter_map(|child| child.value().as_text().map(|t| &**t))
        .collect()
}

/// Whether `text` carries one of the case caption markers.
pub fn contains_case_marker(text: &str) -> bool {
    CASE_MARKER_AUTOMATON.is_match(text)
}

/// Title-case a case name.
///
/// Shouted words (no lowercase letters) are lowered first. Small words stay
/// lowercase except at either end, dotted abbreviations such as `U.S.A.`
/// keep their capitals, and hyphenated parts are cased separately.
pub fn titlecase(s: &str) -> String {
    let collapsed = collapse_ws(s);
    let words: Vec<&str> = collapsed.split(' ').filter(|w| !w.is_empty()).collect();
    let last = words.len().saturating_sub(1);

    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let lowered = word.to_lowercase();
            // A colon or semicolon opens a new phrase, e.g. "In Re: The Estate".
            let starts_phrase = i == 0 || words[i - 1].ends_with([':', ';']);
            if !starts_phrase && i != last && SMALL_WORDS.contains(&lowered.as_str()) {
                return lowered;
            }
            if is_dotted_abbreviation(word) {
                return word.to_uppercase();
            }
            let shouting = !word.chars().any(char::is_lowercase);
            let base = if shouting { lowered } else { word.to_string() };
            base.split('-').map(capitalize_first).collect::<Vec<_>>().join("-")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `U.S.`, `N.A.`, `L.L.C.`: letters separated by dots.
fn is_dotted_abbreviation(word: &str) -> bool {
    let trimmed = word.trim_end_matches([',', ';', ':']);
    let letters = trimmed.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 2
        && trimmed
            .split('.')
            .filter(|part| !part.is_empty())
            .all(|part| part.chars().count() == 1 && part.chars().all(char::is_alphabetic))
}

fn capitalize_first(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    let mut done = false;
    for ch in part.chars() {
        if !done && ch.is_alphabetic() {
            out.extend(ch.to_uppercase());
            done = true;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Fit a judge column to `links` entries.
///
/// When fewer judges than links were found, empty strings go in at the
/// front; the tail is assumed to line up. This is a heuristic: nothing
/// proves which link a missing judge belonged to. Surplus judges are dropped
/// from the front for the same reason.
pub fn align_front(mut judges: Vec<String>, links: usize) -> Vec<String> {
    if judges.len() < links {
        let deficit = links - judges.len();
        debug!(deficit, links, "Padding judge column with empty entries");
        let mut padded = vec![String::new(); deficit];
        padded.append(&mut judges);
        padded
    } else {
        let surplus = judges.len() - links;
        if surplus > 0 {
            debug!(surplus, links, "Dropping surplus judge entries");
        }
        judges.split_off(surplus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn test_collapse_ws() {
        assert_eq!(collapse_ws("  2014-KK-0123 \n\t STATE  v. SMITH "), "2014-KK-0123 STATE v. SMITH");
        assert_eq!(collapse_ws(" \n "), "");
    }

    #[test]
    fn test_element_and_direct_text() {
        let html = Html::parse_fragment("<p>Hello <b>big</b>\n world</p>");
        let p = html.select(&Selector::parse("p").unwrap()).next().unwrap();
        assert_eq!(element_text(p), "Hello big world");
        assert_eq!(direct_text(p), vec!["Hello ", "\n world"]);
    }

    #[test]
    fn test_case_markers_are_case_sensitive() {
        assert!(contains_case_marker("STATE v. SMITH"));
        assert!(contains_case_marker("IN RE: JONES"));
        assert!(contains_case_marker("DOE vs. ROE"));
        assert!(!contains_case_marker("in re jones"));
        assert!(!contains_case_marker("NEWS RELEASE #35"));
    }

    #[test]
    fn test_titlecase_shouted_caption() {
        assert_eq!(titlecase("STATE OF LOUISIANA v. JOHN SMITH"), "State of Louisiana v. John Smith");
        assert_eq!(titlecase("IN RE: THE ESTATE OF DOE"), "In Re: The Estate of Doe");
    }

    #[test]
    fn test_small_word_after_colon_is_capitalized() {
        assert_eq!(
            titlecase("IN THE MATTER OF: A MINOR CHILD; IN RE: AN APPEAL"),
            "In the Matter Of: A Minor Child; In Re: An Appeal"
        );
        assert_eq!(titlecase("SMITH v. THE STATE"), "Smith v. the State");
    }

    #[test]
    fn test_titlecase_keeps_abbreviations_and_hyphens() {
        assert_eq!(titlecase("SMITH v. U.S.A."), "Smith v. U.S.A.");
        assert_eq!(titlecase("MARY SMITH-JONES v. ACME"), "Mary Smith-Jones v. Acme");
        assert_eq!(titlecase("the state"), "The State");
    }

    #[test]
    fn test_align_front_pads_deficit_at_front() {
        let judges = vec!["KNOLL, J.".to_string(), "PER CURIAM".to_string()];
        let aligned = align_front(judges, 4);
        assert_eq!(aligned, vec!["", "", "KNOLL, J.", "PER CURIAM"]);
    }

    #[test]
    fn test_align_front_trims_surplus_from_front() {
        let judges = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        assert_eq!(align_front(judges, 2), vec!["B", "C"]);
        assert!(align_front(Vec::new(), 0).is_empty());
    }
}
