//! Collision-free storage names.

use attic_uuid::UploadToken;

/// Picks the storage name for an upload whose sanitised name is `sanitized_name`.
///
/// The first upload of a name keeps it. Later uploads of the same name are stored as
/// `<token>_<name>`; with a 128-bit random token a clash with an existing name is treated as
/// impossible, so the generated name is not re-checked here. [`crate::FileStore::save`] still
/// persists with a no-clobber rename, so even that case cannot overwrite anything.
///
/// Deterministic for a given `token`, which keeps it testable.
pub fn allocate_name<F>(sanitized_name: &str, exists: F, token: &UploadToken) -> String
where
    F: Fn(&str) -> bool,
{
    if !exists(sanitized_name) {
        return sanitized_name.to_string();
    }

    token.prefix(sanitized_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn token() -> UploadToken {
        UploadToken::parse("00112233445566778899aabbccddeeff").unwrap()
    }

    #[test]
    fn test_free_name_is_kept() {
        let name = allocate_name("notes.txt", |_| false, &token());
        assert_eq!(name, "notes.txt");
    }

    #[test]
    fn test_taken_name_gets_token_prefix() {
        let name = allocate_name("notes.txt", |n| n == "notes.txt", &token());
        assert_eq!(name, "00112233445566778899aabbccddeeff_notes.txt");
    }

    #[test]
    fn test_same_token_gives_same_name() {
        let taken: HashSet<&str> = ["a.png"].into_iter().collect();
        let first = allocate_name("a.png", |n| taken.contains(n), &token());
        let second = allocate_name("a.png", |n| taken.contains(n), &token());

        assert_eq!(first, second);
    }

    #[test]
    fn test_fresh_tokens_give_distinct_names() {
        let first = allocate_name("a.png", |_| true, &UploadToken::new());
        let second = allocate_name("a.png", |_| true, &UploadToken::new());

        assert_ne!(first, second);
        assert!(first.ends_with("_a.png"));
        assert!(second.ends_with("_a.png"));
    }
}
