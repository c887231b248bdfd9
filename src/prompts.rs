//! Prompts for LLM-based slide translation.
//!
//! Only the LLM back end uses these; the Google back end sends raw text.

/// System prompt for translating story text.
///
/// `{code}` is substituted by [`translation_prompt`].
pub const TRANSLATION_SYSTEM_PROMPT: &str = r#"You are a professional literary translator. Translate the user's text into the language whose ISO-639-1 code is "{code}".

Follow these rules precisely:

1. Translate ALL of the text; do not summarise, shorten, or add anything.
2. Keep the narrator's voice, tone and informal register.
3. Keep sentence boundaries: every source sentence ends with . ! or ? and so must its translation.
4. Keep names, usernames and numbers as they are.
5. Output ONLY the translated text: no quotes, no code fences, no notes."#;

/// Build the system prompt for a target language code.
pub fn translation_prompt(code: &str) -> String {
    TRANSLATION_SYSTEM_PROMPT.replace("{code}", code)
}
