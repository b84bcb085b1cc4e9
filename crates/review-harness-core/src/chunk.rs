//! Overlapping fixed-size text windows.
//!
//! Source files are split into windows of `window` characters where each
//! window starts `window - overlap` characters after the previous one.
//! Sizes are measured in Unicode scalar values, so a window never splits
//! a multi-byte character.
//!
//! # Example
//!
//! ```rust
//! use review_harness_core::chunk::split_windows;
//!
//! let windows = split_windows("abcdefghij", 4, 1);
//! assert_eq!(windows, vec!["abcd", "defg", "ghij"]);
//! ```

/// Split `text` into overlapping windows.
///
/// # Guarantees
///
/// - Empty text yields no windows.
/// - Every character of `text` appears in at least one window.
/// - The final window ends exactly at the end of `text`; no window is
///   produced that lies entirely inside the previous one.
/// - The stride is at least one character, so the loop always terminates
///   even if `overlap >= window` slips past config validation.
pub fn split_windows(text: &str, window: usize, overlap: usize) -> Vec<String> {
    let window = window.max(1);
    let stride = window.saturating_sub(overlap).max(1);

    // Byte offset of every char boundary, plus the end of the string.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = bounds.len() - 1;

    let mut windows = Vec::new();
    if char_count == 0 {
        return windows;
    }

    let mut start = 0;
    loop {
        let end = (start + window).min(char_count);
        windows.push(text[bounds[start]..bounds[end]].to_string());
        if end == char_count {
            break;
        }
        start += stride;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_no_windows() {
        assert!(split_windows("", 512, 50).is_empty());
    }

    #[test]
    fn short_text_is_one_window() {
        let w = split_windows("package main\n", 512, 50);
        assert_eq!(w, vec!["package main\n"]);
    }

    #[test]
    fn exact_window_is_one_window() {
        let text = "x".repeat(512);
        assert_eq!(split_windows(&text, 512, 50).len(), 1);
    }

    #[test]
    fn windows_overlap_by_configured_amount() {
        let text: String = ('a'..='z').cycle().take(1000).collect();
        let w = split_windows(&text, 512, 50);
        assert_eq!(w.len(), 3);
        assert_eq!(w[0].chars().count(), 512);
        let tail_of_first: String = w[0].chars().skip(462).collect();
        let head_of_second: String = w[1].chars().take(50).collect();
        assert_eq!(tail_of_first, head_of_second);
        assert!(text.ends_with(w[2].as_str()));
    }

    #[test]
    fn multibyte_characters_are_not_split() {
        let text = "héllo wörld ✓✓✓";
        let w = split_windows(text, 4, 1);
        for piece in &w {
            assert!(piece.chars().count() <= 4);
        }
        assert!(text.starts_with(w[0].as_str()));
        assert!(text.ends_with(w.last().unwrap().as_str()));
    }

    #[test]
    fn degenerate_overlap_still_terminates() {
        let w = split_windows("abcdef", 2, 5);
        assert_eq!(w.len(), 5);
        assert_eq!(w[0], "ab");
        assert_eq!(w[4], "ef");
    }
}
