//! Expression tokenizer
//!
//! Splits an expression string into operand and operator tokens by
//! injecting whitespace around every operator/paren character and then
//! splitting on whitespace. Unary-sign handling happens in the parser.

/// Characters that are their own token regardless of surrounding text.
pub(crate) const OPERATOR_CHARS: [char; 9] = ['(', ')', '&', '|', '+', '-', '*', '/', '!'];

/// Tokenize an expression string.
///
/// `"#video.start+10"` becomes `["#video.start", "+", "10"]`.
pub(crate) fn tokenize(expr: &str) -> Vec<String> {
    let mut spaced = String::with_capacity(expr.len() + 8);
    for ch in expr.chars() {
        if OPERATOR_CHARS.contains(&ch) {
            spaced.push(' ');
            spaced.push(ch);
            spaced.push(' ');
        } else {
            spaced.push(ch);
        }
    }
    spaced.split_whitespace().map(str::to_string).collect()
}
