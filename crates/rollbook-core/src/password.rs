//! Password Generation
//!
//! New and reset account passwords are generated, never chosen: six
//! letters alternating between vowels and consonants (pronounceable over
//! the phone) plus two digits, tacked on the front or the back. Upper
//! case and lookalike characters (`l`, `0`, `1`) are excluded, as are
//! letters that are awkward to spell out (`q`, `x`).

use rand::Rng;

const VOWELS: &[u8] = b"aeiou";
const CONSONANTS: &[u8] = b"bcdfghjkmnprstvwyz";
const DIGITS: &[u8] = b"23456789";

/// Generate a fresh 8-character plaintext password.
#[must_use]
pub fn generate_password() -> String {
    generate_password_with(&mut rand::thread_rng())
}

/// Generate a password from the given RNG.
pub fn generate_password_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let classes: [&[u8]; 2] = [VOWELS, CONSONANTS];
    let offset = rng.gen_range(0..2usize);

    let mut letters = String::with_capacity(8);
    for i in 0..6 {
        let class = classes[(i + offset) % 2];
        letters.push(class[rng.gen_range(0..class.len())] as char);
    }

    let d1 = DIGITS[rng.gen_range(0..DIGITS.len())] as char;
    let d2 = DIGITS[rng.gen_range(0..DIGITS.len())] as char;

    if rng.gen_range(0..2) == 1 {
        format!("{d1}{d2}{letters}")
    } else {
        format!("{letters}{d1}{d2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_length_and_composition() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let pw = generate_password_with(&mut rng);
            assert_eq!(pw.len(), 8);
            let digits: Vec<char> = pw.chars().filter(char::is_ascii_digit).collect();
            assert_eq!(digits.len(), 2);
            // Digits are contiguous at one end.
            assert!(
                pw.chars().take(2).all(|c| c.is_ascii_digit())
                    || pw.chars().skip(6).all(|c| c.is_ascii_digit()),
                "digits split in {pw}"
            );
        }
    }

    #[test]
    fn test_no_ambiguous_characters() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let pw = generate_password_with(&mut rng);
            for banned in ['l', 'q', 'x', '0', '1'] {
                assert!(!pw.contains(banned), "{pw} contains {banned}");
            }
            assert!(pw.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_letters_alternate() {
        let is_vowel = |c: char| VOWELS.contains(&(c as u8));
        let mut rng = StdRng::seed_from_u64(13);
        for _ in 0..200 {
            let pw = generate_password_with(&mut rng);
            let letters: Vec<char> = pw.chars().filter(char::is_ascii_alphabetic).collect();
            assert_eq!(letters.len(), 6);
            for pair in letters.windows(2) {
                assert_ne!(is_vowel(pair[0]), is_vowel(pair[1]), "no alternation in {pw}");
            }
        }
    }
}
