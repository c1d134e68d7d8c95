/// Length of an MD5 digest in lowercase hex characters.
pub const MD5_HEX_LEN: usize = 32;

/// Lowercase hex MD5 digest of `input`.
pub fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Whether `candidate` hashes to `target`. The target must already be
/// normalized to lowercase.
pub fn matches(candidate: &str, target: &str) -> bool {
    md5_hex(candidate) == target
}

/// Validate a client-supplied digest and normalize it to lowercase.
///
/// Accepts exactly [`MD5_HEX_LEN`] hex characters, case-insensitive.
pub fn normalize(target_hash: &str) -> Option<String> {
    if target_hash.len() != MD5_HEX_LEN {
        return None;
    }
    if !target_hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(target_hash.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests() {
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(md5_hex("a"), "0cc175b9c0f1b6a831c399e269772661");
    }

    #[test]
    fn match_requires_lowercase_target() {
        assert!(matches("abc", "900150983cd24fb0d6963f7d28e17f72"));
        assert!(!matches("abd", "900150983cd24fb0d6963f7d28e17f72"));
    }

    #[test]
    fn normalize_accepts_mixed_case() {
        assert_eq!(
            normalize("900150983CD24FB0D6963F7D28E17F72").as_deref(),
            Some("900150983cd24fb0d6963f7d28e17f72")
        );
    }

    #[test]
    fn normalize_rejects_bad_input() {
        assert!(normalize("xyz").is_none());
        assert!(normalize("900150983cd24fb0d6963f7d28e17f7").is_none());
        assert!(normalize("900150983cd24fb0d6963f7d28e17f72a").is_none());
        assert!(normalize("g00150983cd24fb0d6963f7d28e17f72").is_none());
    }
}
