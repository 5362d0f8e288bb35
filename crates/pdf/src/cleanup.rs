use unicode_normalization::UnicodeNormalization;

/// Latin ligatures some fonts emit as single code points.
fn ligature(c: char) -> Option<&'static str> {
    match c {
        '\u{FB00}' => Some("ff"),
        '\u{FB01}' => Some("fi"),
        '\u{FB02}' => Some("fl"),
        '\u{FB03}' => Some("ffi"),
        '\u{FB04}' => Some("ffl"),
        _ => None,
    }
}

/// Clean the text of one extracted word: NFC, ligatures expanded, round and
/// square bullets folded into `•`, replacement characters and NULs dropped.
pub fn cleanup_word(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());

    for c in text.nfc() {
        match c {
            '\u{FFFD}' | '\0' => {}
            '\u{25CF}' | '\u{25CB}' | '\u{25A0}' => cleaned.push('\u{2022}'),
            c => match ligature(c) {
                Some(expanded) => cleaned.push_str(expanded),
                None => cleaned.push(c),
            },
        }
    }

    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        assert_eq!(cleanup_word("Total:"), "Total:");
    }

    #[test]
    fn test_ligature_fix() {
        assert_eq!(cleanup_word("\u{FB01}nal"), "final");
        assert_eq!(cleanup_word("a\u{FB04}e"), "affle");
    }

    #[test]
    fn test_bullet_standardization() {
        assert_eq!(cleanup_word("\u{25CF}"), "\u{2022}");
    }

    #[test]
    fn test_replacement_and_nul_removed() {
        assert_eq!(cleanup_word("CP\u{FFFD}F\0"), "CPF");
        assert_eq!(cleanup_word("\u{FFFD}"), "");
    }

    #[test]
    fn test_nfc_normalization() {
        // c + combining cedilla, a + combining tilde.
        assert_eq!(cleanup_word("Inscric\u{0327}a\u{0303}o"), "Inscrição");
    }
}
