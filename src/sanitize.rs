/// Tokens some models emit to mark the end of their turn.
pub const END_OF_TURN_MARKERS: &[&str] = &[
    "<|im_end|>",
    "<|eot_id|>",
    "<|endoftext|>",
    "<|end|>",
    "</s>",
];

/// Cut `text` at the first end-of-turn marker.
///
/// Unless `last` is set, a trailing fragment that could still grow into a
/// marker (`"<|im"`) is held back too, so half a marker never reaches the
/// screen mid-stream.
pub fn strip_end_of_turn(text: &str, last: bool) -> &str {
    let end = END_OF_TURN_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
        .unwrap_or(text.len());
    let text = &text[..end];
    if last {
        return text;
    }

    let partial = END_OF_TURN_MARKERS
        .iter()
        .filter_map(|marker| {
            (1..marker.len())
                .rev()
                .find(|len| text.ends_with(&marker[..*len]))
        })
        .max()
        .unwrap_or(0);
    &text[..text.len() - partial]
}

#[cfg(test)]
mod test {
    use super::strip_end_of_turn;

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(strip_end_of_turn("# Hi\n\nthere", false), "# Hi\n\nthere");
    }

    #[test]
    fn cuts_at_first_marker() {
        assert_eq!(strip_end_of_turn("done<|im_end|>\njunk</s>", true), "done");
        assert_eq!(strip_end_of_turn("a</s>b<|eot_id|>", false), "a");
    }

    #[test]
    fn holds_back_partial_marker() {
        assert_eq!(strip_end_of_turn("done<|eo", false), "done");
        assert_eq!(strip_end_of_turn("x <", false), "x ");
        assert_eq!(strip_end_of_turn("a < b", false), "a < b");
    }

    #[test]
    fn keeps_trailing_fragment_at_the_end() {
        assert_eq!(strip_end_of_turn("x <", true), "x <");
    }
}
