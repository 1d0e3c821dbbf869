/// Bounded, single-line excerpt of an error body for logs and error values.
///
/// Whitespace runs collapse to one space; the result is cut at a character
/// boundary no later than `max_bytes` and marked with `...` when cut.
pub fn error_excerpt(body: &str, max_bytes: usize) -> String {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.len() <= max_bytes {
        return flat;
    }
    let cut = (0..=max_bytes)
        .rev()
        .find(|&i| flat.is_char_boundary(i))
        .unwrap_or(0);
    format!("{}...", &flat[..cut])
}
