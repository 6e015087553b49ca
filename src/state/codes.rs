//! Room code generation.

use rand::Rng;

/// Alphabet for room codes: uppercase letters and digits with the easily
/// confused characters (I, O, 0, 1) excluded.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a room code.
pub const CODE_LEN: usize = 6;

/// Generate a fresh room code.
///
/// Codes are generated client-side with no uniqueness check against
/// existing rooms; at party scale the 32^6 space makes collisions
/// acceptable.
pub fn generate() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_characters_from_the_alphabet() {
        for _ in 0..100 {
            let code = generate();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn alphabet_excludes_confusable_characters() {
        for confusable in [b'I', b'O', b'0', b'1'] {
            assert!(!CODE_ALPHABET.contains(&confusable));
        }
    }
}
