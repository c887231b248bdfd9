//! Segmentation: split story text into slide-sized chunks.
//!
//! A sentence is the maximal run of characters ending in one or more of
//! `.`, `!`, `?`. Sentences are packed greedily into slides of at most
//! `max_chars_per_slide` characters and are never split, so a sentence longer
//! than the budget becomes a slide of its own.
//!
//! Lengths are counted in `char`s so that a Cyrillic or accented story gets
//! the same visual budget as an ASCII one.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?]*[.!?]+").unwrap());

/// Split `text` into ordered sentences.
///
/// Trailing text without a terminator is returned as a final sentence when it
/// is non-blank, but only if at least one terminated sentence exists. Text
/// with no terminator at all yields no sentences.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut end = 0;
    for m in RE_SENTENCE.find_iter(text) {
        sentences.push(m.as_str());
        end = m.end();
    }
    if sentences.is_empty() {
        return sentences;
    }
    let tail = &text[end..];
    if !tail.trim().is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Split story text into slides of at most `max_chars_per_slide` characters.
///
/// Slides are trimmed; empty slides are never produced. Returns an empty
/// `Vec` when the text has no terminated sentence.
pub fn split_into_slides(text: &str, max_chars_per_slide: usize) -> Vec<String> {
    let mut slides = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(text) {
        let len = sentence.chars().count();
        if current_len + len <= max_chars_per_slide {
            current.push_str(sentence);
            current_len += len;
        } else {
            push_trimmed(&mut slides, &current);
            current = sentence.to_string();
            current_len = len;
        }
    }
    push_trimmed(&mut slides, &current);

    slides
}

fn push_trimmed(slides: &mut Vec<String>, slide: &str) {
    let trimmed = slide.trim();
    if !trimmed.is_empty() {
        slides.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squash(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn sentences_keep_their_terminators() {
        assert_eq!(
            split_sentences("He yelled. She ran! Did she escape?"),
            vec!["He yelled.", " She ran!", " Did she escape?"]
        );
    }

    #[test]
    fn repeated_terminators_stay_with_their_sentence() {
        assert_eq!(
            split_sentences("What?! No way... Fine."),
            vec!["What?!", " No way...", " Fine."]
        );
    }

    #[test]
    fn trailing_fragment_is_a_sentence() {
        assert_eq!(
            split_sentences("It ended. And then nothing"),
            vec!["It ended.", " And then nothing"]
        );
        assert_eq!(split_sentences("It ended.   "), vec!["It ended."]);
    }

    #[test]
    fn one_sentence_per_slide_when_pairs_overflow() {
        let slides = split_into_slides("He yelled. She ran! Did she escape?", 18);
        assert_eq!(slides, vec!["He yelled.", "She ran!", "Did she escape?"]);
    }

    #[test]
    fn pair_that_fits_shares_a_slide() {
        // 10 + 9 = 19 characters fit a 20-character budget; the third does not.
        let slides = split_into_slides("He yelled. She ran! Did she escape?", 20);
        assert_eq!(slides, vec!["He yelled. She ran!", "Did she escape?"]);
    }

    #[test]
    fn boundary_is_inclusive() {
        // "Ab. " + "Cd." is exactly 7 characters.
        assert_eq!(split_into_slides("Ab. Cd.", 7), vec!["Ab. Cd."]);
        assert_eq!(split_into_slides("Ab. Cd.", 6), vec!["Ab.", "Cd."]);
    }

    #[test]
    fn oversized_sentence_becomes_its_own_slide() {
        let long = "This sentence is far longer than the tiny budget allows.";
        let text = format!("Hi. {long} Bye.");
        let slides = split_into_slides(&text, 10);
        assert_eq!(slides, vec!["Hi.", long, "Bye."]);
    }

    #[test]
    fn oversized_first_sentence_emits_no_empty_slide() {
        let slides = split_into_slides("An extremely long opening sentence. Ok.", 5);
        assert_eq!(slides, vec!["An extremely long opening sentence.", "Ok."]);
    }

    #[test]
    fn empty_and_unterminated_text_yield_nothing() {
        assert!(split_into_slides("", 100).is_empty());
        assert!(split_into_slides("   \n\t", 100).is_empty());
        assert!(split_into_slides("no terminator anywhere", 100).is_empty());
    }

    #[test]
    fn budget_counts_chars_not_bytes() {
        // 15 chars, 28 bytes.
        let slides = split_into_slides("Привіт. Привіт.", 15);
        assert_eq!(slides, vec!["Привіт. Привіт."]);
    }

    #[test]
    fn slides_respect_budget_or_are_single_sentences() {
        let text = "I moved in last spring. The neighbour parked in my spot every single day \
                    for three months, even after I asked nicely! So I bought a very loud car \
                    alarm. Did it work? You bet it did. He moved his car the next morning.";
        for budget in [1, 15, 40, 80, 200] {
            let sentences: Vec<String> = split_sentences(text)
                .into_iter()
                .map(|s| s.trim().to_string())
                .collect();
            for slide in split_into_slides(text, budget) {
                assert!(
                    slide.chars().count() <= budget || sentences.contains(&slide),
                    "budget {budget}: slide {slide:?} is oversized and not a single sentence"
                );
            }
        }
    }

    #[test]
    fn slides_reproduce_every_sentence_in_order() {
        let text = "First. Second one!  Third, with a comma?\nFourth... and a tail";
        for budget in [1, 10, 25, 1000] {
            let joined = split_into_slides(text, budget).join(" ");
            assert_eq!(squash(&joined), squash(text), "budget {budget}");
        }
    }

    #[test]
    fn deterministic() {
        let text = "One. Two. Three. Four. Five.";
        assert_eq!(split_into_slides(text, 9), split_into_slides(text, 9));
    }
}
