/// Derive a URL slug from a title.
///
/// Lower-cases the text, drops everything that is not an ASCII word
/// character or a space, then turns each run of spaces into one hyphen.
/// Leading and trailing spaces become hyphens too; an all-punctuation
/// title yields an empty slug.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut in_spaces = false;

    for c in title.to_lowercase().chars() {
        if c == ' ' {
            if !in_spaces {
                slug.push('-');
                in_spaces = true;
            }
        } else if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c);
            in_spaces = false;
        }
        // Stripped characters do not break a run of spaces.
    }

    slug
}
