//! Alternative names for unique entry creation: `a.txt`, `a (1).txt`, ...

/// Split `name` into stem and extension (dot included).
///
/// A leading dot belongs to the stem, so `.profile` has no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Strip a trailing ` (n)` counter from a stem.
fn split_counter(stem: &str) -> Option<(&str, u64)> {
    let inner = stem.strip_suffix(')')?;
    let open = inner.rfind(" (")?;
    let digits = &inner[open + 2..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((&inner[..open], digits.parse().ok()?))
}

/// The `n`-th alternative of `name`, keeping its extension.
///
/// ```
/// use oxvault_core::fs::alternative::alternative_name;
///
/// assert_eq!(alternative_name("a.txt", 1), "a (1).txt");
/// assert_eq!(alternative_name("README", 3), "README (3)");
/// ```
pub fn alternative_name(name: &str, n: u64) -> String {
    let (stem, ext) = split_extension(name);
    let base = split_counter(stem).map_or(stem, |(base, _)| base);
    format!("{base} ({n}){ext}")
}

/// `name` itself, followed by its alternatives.
///
/// A name that already carries a counter continues from it, so `a (1).txt`
/// is followed by `a (2).txt`.
pub fn candidate_names(name: &str) -> impl Iterator<Item = String> + '_ {
    let (stem, _) = split_extension(name);
    let start = split_counter(stem).map_or(1, |(_, n)| n.saturating_add(1));
    std::iter::once(name.to_owned()).chain((start..).map(move |n| alternative_name(name, n)))
}
