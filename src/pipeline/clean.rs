//! Text cleanup: deterministic normalisation of story and translated text.
//!
//! Reddit self-text arrives as HTML-escaped Markdown (`&amp;`, `&#x200B;`,
//! `**bold**`, `[link](url)`), and slides are rendered into a single `<p>`,
//! so line structure is meaningless on a slide. LLM translators sometimes wrap
//! their answer in code fences or quotes despite being told not to.
//!
//! Each rule is a pure `&str → String` pass; order matters only in that
//! entities are decoded before Markdown is stripped and whitespace is
//! collapsed last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean raw story text before segmentation.
///
/// Rules (applied in order):
/// 1. Decode HTML entities (`&amp;`, `&lt;`, `&#39;`, `&#x200B;`, …)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Replace Markdown links with their text
/// 4. Drop emphasis, strikethrough, quote and heading markers
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Collapse all whitespace runs to one space and trim
pub fn clean_story_text(input: &str) -> String {
    let s = decode_entities(input);
    let s = normalise_line_endings(&s);
    let s = strip_links(&s);
    let s = strip_markers(&s);
    let s = remove_invisible_chars(&s);
    collapse_whitespace(&s)
}

/// Clean translator output.
///
/// Strips an outer code fence and one pair of wrapping quotes, then removes
/// invisible characters and collapses whitespace.
pub fn clean_translation(input: &str) -> String {
    let s = strip_code_fences(input);
    let s = strip_wrapping_quotes(&s);
    let s = remove_invisible_chars(&s);
    collapse_whitespace(&s)
}

// ── Rule: decode HTML entities ──────────────────────────────────────────────

static RE_NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:[xX]([0-9a-fA-F]{1,6})|([0-9]{1,7}));").unwrap());

fn decode_entities(input: &str) -> String {
    let s = RE_NUMERIC_ENTITY.replace_all(input, |caps: &regex::Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    // `&amp;` last so `&amp;lt;` decodes to the literal `&lt;`.
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

// ── Rule: normalise line endings ────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule: Markdown links ────────────────────────────────────────────────────

static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]*)\)").unwrap());

fn strip_links(input: &str) -> String {
    RE_LINK.replace_all(input, "$1").to_string()
}

// ── Rule: Markdown markers ──────────────────────────────────────────────────

static RE_LINE_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:>+[ \t]*|#{1,6}[ \t]+)").unwrap());

fn strip_markers(input: &str) -> String {
    let s = RE_LINE_MARKERS.replace_all(input, "");
    s.replace("**", "").replace("~~", "")
}

// ── Rule: invisible characters ──────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule: whitespace ────────────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input.trim(), " ").to_string()
}

// ── Rule: fences and quotes (translator output) ─────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n(.*)\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

fn strip_wrapping_quotes(input: &str) -> String {
    let t = input.trim();
    for (open, close) in [('"', '"'), ('“', '”'), ('«', '»')] {
        if let Some(inner) = t.strip_prefix(open).and_then(|r| r.strip_suffix(close)) {
            // Only a single pair: a quote inside means the quotes belong to the text.
            if !inner.contains(open) && !inner.contains(close) {
                return inner.to_string();
            }
        }
    }
    t.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_named_entities() {
        assert_eq!(
            decode_entities("Tom &amp; Jerry &lt;3 &quot;hi&quot;"),
            "Tom & Jerry <3 \"hi\""
        );
    }

    #[test]
    fn test_decode_double_escaped_once() {
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_decode_numeric_entities() {
        assert_eq!(decode_entities("it&#39;s&#x200B;"), "it's\u{200B}");
        assert_eq!(decode_entities("bad &#xFFFFFF; stays"), "bad &#xFFFFFF; stays");
    }

    #[test]
    fn test_strip_links() {
        assert_eq!(
            strip_links("see [my post](https://reddit.com/x) here"),
            "see my post here"
        );
    }

    #[test]
    fn test_strip_markers() {
        assert_eq!(strip_markers("> quoted\n## Title\n**bold** ~~gone~~"), "quoted\nTitle\nbold gone");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\n b\t c  "), "a b c");
    }

    #[test]
    fn test_clean_story_text_full_pipeline() {
        let raw = "So my neighbour &amp; I had a **feud**.\r\n\r\n&gt; He said no.\n\n&#x200B;\n\nEDIT: [update](https://x.y)!";
        assert_eq!(
            clean_story_text(raw),
            "So my neighbour & I had a feud. He said no. EDIT: update!"
        );
    }

    #[test]
    fn test_gt_entity_in_sentence_is_kept() {
        // Only line-leading quote markers are dropped.
        assert_eq!(clean_story_text("5 &gt; 3."), "5 > 3.");
    }

    #[test]
    fn test_clean_translation_strips_fences_and_quotes() {
        assert_eq!(clean_translation("```text\nBonjour.\n```"), "Bonjour.");
        assert_eq!(clean_translation("\"Bonjour tout le monde.\""), "Bonjour tout le monde.");
        assert_eq!(clean_translation("«Привіт.»"), "Привіт.");
    }

    #[test]
    fn test_clean_translation_keeps_inner_quotes() {
        let s = "\"Non\", dit-il. \"Jamais.\"";
        assert_eq!(clean_translation(s), s);
    }
}
