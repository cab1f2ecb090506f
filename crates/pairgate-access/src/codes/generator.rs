//! Code string generation and normalization.

use rand::RngExt;

/// Symbols a code may contain. Excludes `I`, `O`, `0` and `1`.
pub const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Characters in each half of a code.
pub const GROUP_LEN: usize = 3;

const SEPARATOR: char = '-';

/// Generate a fresh code of the form `AAA-BBB`.
pub fn generate_code() -> String {
    let mut rng = rand::rng();
    let mut code = String::with_capacity(GROUP_LEN * 2 + 1);
    for i in 0..GROUP_LEN * 2 {
        if i == GROUP_LEN {
            code.push(SEPARATOR);
        }
        let idx = rng.random_range(0..ALPHABET.len());
        code.push(char::from(ALPHABET[idx]));
    }
    code
}

/// Trim and uppercase user input before lookup.
pub fn normalize_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

/// Whether `code` has the exact `AAA-BBB` shape over [`ALPHABET`].
pub fn is_well_formed(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == GROUP_LEN * 2 + 1
        && bytes.iter().enumerate().all(|(i, b)| {
            if i == GROUP_LEN {
                *b == SEPARATOR as u8
            } else {
                ALPHABET.contains(b)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_well_formed() {
        for _ in 0..200 {
            let code = generate_code();
            assert!(is_well_formed(&code), "bad code {code}");
        }
    }

    #[test]
    fn alphabet_has_32_unambiguous_symbols() {
        assert_eq!(ALPHABET.len(), 32);
        for ambiguous in [b'I', b'O', b'0', b'1'] {
            assert!(!ALPHABET.contains(&ambiguous));
        }
    }

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize_code("  k7q-2mx\n"), "K7Q-2MX");
    }

    #[test]
    fn malformed_codes_are_rejected() {
        assert!(is_well_formed("K7Q-2MX"));
        assert!(!is_well_formed("K7Q2MX"));
        assert!(!is_well_formed("K7Q-2M0"));
        assert!(!is_well_formed("k7q-2mx"));
        assert!(!is_well_formed("K7Q-2MXX"));
    }
}
