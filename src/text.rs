/// Splits text on `\n` only, dropping the empty piece after a final newline.
///
/// `\r` stays part of the line so that patches and sources compare byte-for-byte.
pub fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    let mut lines: Vec<&str> = text.split('\n').collect();
    if text.ends_with('\n') {
        lines.pop();
    }
    lines
}
