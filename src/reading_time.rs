use crate::error::{BlogError, Result};
use crate::models::ContentBlock;

pub const DEFAULT_WORDS_PER_MINUTE: u32 = 200;

fn count_tokens(text: Option<&str>) -> usize {
    text.map_or(0, |t| t.split_whitespace().count())
}

/// Word count over headings and the raw text of every body block.
pub fn count_words(content: &[ContentBlock]) -> usize {
    content
        .iter()
        .map(|block| {
            let body: usize = block
                .body
                .iter()
                .map(|paragraph| count_tokens(paragraph.text.as_deref()))
                .sum();
            count_tokens(block.heading.as_deref()) + body
        })
        .sum()
}

/// Estimated reading time in whole minutes, rounded up.
pub fn estimate_reading_minutes(content: &[ContentBlock], words_per_minute: u32) -> Result<u32> {
    if words_per_minute == 0 {
        return Err(BlogError::InvalidConfiguration(
            "words_per_minute must be positive".to_string(),
        ));
    }

    let words = count_words(content) as u64;
    let minutes = words.div_ceil(u64::from(words_per_minute));
    Ok(u32::try_from(minutes).unwrap_or(u32::MAX))
}
