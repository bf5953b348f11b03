//! Deterministic text splitting for the typing animation.

/// Characters after which a cut never needs to be pulled back.
fn is_break_char(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | ',' | '!' | '?')
}

/// Split `text` into display chunks of roughly `max_chars` characters.
///
/// A cut that would land in the middle of a word is pulled back to just after
/// the last space inside the chunk, so the word moves whole into the next
/// chunk. A single whitespace character sitting exactly on the boundary is
/// kept with the chunk it ends, so a chunk is at most `max_chars + 1`
/// characters long, and only reaches that length when its last character is
/// whitespace. Concatenating the result always reproduces `text`; text no
/// longer than `max_chars` (including `""`) is one chunk.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::with_capacity(chars.len() / max_chars + 1);
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + max_chars).min(chars.len());
        if end < chars.len() {
            let next = chars[end];
            if next.is_whitespace() {
                end += 1;
            } else if !is_break_char(next)
                && let Some(space) = chars[start..end].iter().rposition(|c| *c == ' ')
                && space > 0
            {
                end = start + space + 1;
            }
        }
        chunks.push(chars[start..end].iter().collect());
        start = end;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_sentence() {
        assert_eq!(
            chunk_text("The quick brown fox jumps", 9),
            vec!["The quick ", "brown fox ", "jumps"]
        );
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(chunk_text("hello", 9), vec!["hello"]);
        assert_eq!(chunk_text("exactly9!", 9), vec!["exactly9!"]);
        assert_eq!(chunk_text("", 9), vec![""]);
    }

    #[test]
    fn test_mid_word_cut_pulled_back() {
        let chunks = chunk_text("hello world again", 9);
        assert_eq!(chunks[0], "hello ");
        assert_eq!(chunks.concat(), "hello world again");
    }

    #[test]
    fn test_no_space_hard_cut() {
        assert_eq!(
            chunk_text("abcdefghijklmnopqrst", 9),
            vec!["abcdefghi", "jklmnopqr", "st"]
        );
    }

    #[test]
    fn test_leading_space_is_not_a_pull_back_point() {
        // The only space is at position 0, so the cut stays hard.
        let chunks = chunk_text(" abcdefghijk", 9);
        assert_eq!(chunks[0], " abcdefgh");
    }

    #[test]
    fn test_punctuation_boundary_keeps_cut() {
        let chunks = chunk_text("abcd efgh.ijkl", 9);
        assert_eq!(chunks[0], "abcd efgh");
        assert_eq!(chunks[1], ".ijkl");
    }

    #[test]
    fn test_multibyte_characters() {
        let text = "héllo wörld ünïcode tëxt";
        let chunks = chunk_text(text, 9);
        assert_eq!(chunks.concat(), text);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 10);
        }
    }

    #[test]
    fn test_round_trip_and_bounds() {
        let samples = [
            "Lorem ipsum dolor sit amet, consectetur adipiscing elit.",
            "a b c d e f g h i j k l m n o p",
            "supercalifragilisticexpialidocious is long",
            "line one\nline two\nline three",
            "   spaced    out    text   ",
            "Hi! How are you? Fine, thanks.",
        ];
        for sample in samples {
            let chunks = chunk_text(sample, 9);
            assert_eq!(chunks.concat(), sample, "round trip failed for {sample:?}");
            let (last, rest) = chunks.split_last().unwrap();
            assert!(!last.is_empty());
            for chunk in rest {
                let len = chunk.chars().count();
                assert!(len > 0);
                // Only a boundary whitespace may push a chunk one past the cap.
                assert!(
                    len <= 9 || (len == 10 && chunk.ends_with(char::is_whitespace)),
                    "chunk {chunk:?} too long in {sample:?}"
                );
            }
        }
    }

    #[test]
    fn test_zero_max_is_treated_as_one() {
        assert_eq!(chunk_text("abc", 0), vec!["a", "b", "c"]);
    }
}
