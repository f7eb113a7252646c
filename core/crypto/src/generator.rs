//! Random password and passphrase generation.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use twinkey_common::{Error, Result};

const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";

/// Symbols drawn from when special characters are enabled.
pub const SPECIAL: &str = "!@#$%^&*()-_=+[]{}|;:,.<>?/~";

/// Characters that are easy to confuse visually.
pub const SIMILAR: &str = "il1Lo0O";

/// Characters that are awkward to type or quote.
pub const AMBIGUOUS: &str = "`'\"\\";

/// Shortest password the generator produces.
pub const MIN_LENGTH: usize = 4;

/// Longest password the generator produces.
pub const MAX_LENGTH: usize = 5000;

const WORDS: &[&str] = &[
    "amber", "anchor", "apple", "arrow", "basil", "beacon", "birch", "blade", "cabin", "canyon",
    "cedar", "chalk", "cider", "clover", "comet", "coral", "delta", "drift", "ember", "falcon",
    "fable", "fern", "flint", "forest", "frost", "garnet", "glade", "harbor", "hazel", "heron",
    "island", "ivory", "jasper", "juniper", "kettle", "lagoon", "lantern", "maple", "meadow",
    "mesa", "nectar", "north", "oasis", "orbit", "pebble", "pepper", "pine", "quartz", "raven",
    "ridge", "river", "saddle", "sage", "spruce", "summit", "thistle", "timber", "tulip",
    "velvet", "willow",
];

/// Qualitative rating of an entropy estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StrengthRating {
    VeryWeak,
    Weak,
    Reasonable,
    Strong,
    VeryStrong,
}

impl StrengthRating {
    /// Rate an entropy estimate given in bits.
    pub fn from_entropy(bits: f64) -> Self {
        if bits < 28.0 {
            Self::VeryWeak
        } else if bits < 36.0 {
            Self::Weak
        } else if bits < 60.0 {
            Self::Reasonable
        } else if bits < 128.0 {
            Self::Strong
        } else {
            Self::VeryStrong
        }
    }
}

impl fmt::Display for StrengthRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::VeryWeak => "very weak",
            Self::Weak => "weak",
            Self::Reasonable => "reasonable",
            Self::Strong => "strong",
            Self::VeryStrong => "very strong",
        };
        f.write_str(label)
    }
}

/// Configurable password generator.
///
/// Every enabled character class is guaranteed to appear at least once in
/// the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordGenerator {
    pub use_lowercase: bool,
    pub use_uppercase: bool,
    pub use_digits: bool,
    pub use_special: bool,
    pub exclude_similar: bool,
    pub exclude_ambiguous: bool,
    length: usize,
}

impl Default for PasswordGenerator {
    fn default() -> Self {
        Self {
            use_lowercase: true,
            use_uppercase: true,
            use_digits: true,
            use_special: true,
            exclude_similar: false,
            exclude_ambiguous: false,
            length: 16,
        }
    }
}

impl PasswordGenerator {
    /// Create a generator with every class enabled and length 16.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output length, clamped to `MIN_LENGTH..=MAX_LENGTH`.
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length.clamp(MIN_LENGTH, MAX_LENGTH);
        self
    }

    /// The configured output length.
    pub fn length(&self) -> usize {
        self.length
    }

    fn filtered(&self, class: &str) -> Vec<char> {
        class
            .chars()
            .filter(|c| !(self.exclude_similar && SIMILAR.contains(*c)))
            .filter(|c| !(self.exclude_ambiguous && AMBIGUOUS.contains(*c)))
            .collect()
    }

    fn classes(&self) -> Vec<Vec<char>> {
        [
            (self.use_lowercase, LOWERCASE),
            (self.use_uppercase, UPPERCASE),
            (self.use_digits, DIGITS),
            (self.use_special, SPECIAL),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, class)| self.filtered(class))
        .filter(|class| !class.is_empty())
        .collect()
    }

    /// Size of the character pool under the current configuration.
    pub fn pool_size(&self) -> usize {
        self.classes().iter().map(Vec::len).sum()
    }

    /// Generate a password.
    ///
    /// # Errors
    /// - Returns error if the configuration leaves no characters to draw from
    pub fn generate(&self) -> Result<String> {
        let classes = self.classes();
        let pool: Vec<char> = classes.iter().flatten().copied().collect();
        if pool.is_empty() {
            return Err(Error::InvalidInput(
                "No characters available to generate a password".to_string(),
            ));
        }

        let mut rng = rand::thread_rng();
        let mut chars: Vec<char> = Vec::with_capacity(self.length);

        for class in &classes {
            if let Some(c) = class.choose(&mut rng) {
                chars.push(*c);
            }
        }
        while chars.len() < self.length {
            if let Some(c) = pool.choose(&mut rng) {
                chars.push(*c);
            }
        }

        chars.shuffle(&mut rng);
        Ok(chars.into_iter().collect())
    }

    /// Generate a memorable passphrase.
    ///
    /// Concatenates `num_words` capitalized words, a number below 1000 and
    /// one special character.
    pub fn generate_memorable(num_words: usize) -> String {
        let mut rng = rand::thread_rng();
        let mut out = String::new();

        for _ in 0..num_words {
            if let Some(word) = WORDS.choose(&mut rng) {
                let mut letters = word.chars();
                if let Some(first) = letters.next() {
                    out.extend(first.to_uppercase());
                    out.push_str(letters.as_str());
                }
            }
        }

        out.push_str(&rng.gen_range(0..1000).to_string());
        let special: Vec<char> = SPECIAL.chars().collect();
        if let Some(c) = special.choose(&mut rng) {
            out.push(*c);
        }
        out
    }

    /// Entropy in bits of a password produced by this configuration.
    pub fn entropy(&self) -> f64 {
        let pool = self.pool_size();
        if pool <= 1 {
            return 0.0;
        }
        self.length as f64 * (pool as f64).log2()
    }

    /// Estimate the entropy of an existing password from the classes it uses.
    pub fn password_entropy(password: &str) -> f64 {
        let mut pool = 0usize;
        if password.chars().any(|c| c.is_ascii_lowercase()) {
            pool += LOWERCASE.len();
        }
        if password.chars().any(|c| c.is_ascii_uppercase()) {
            pool += UPPERCASE.len();
        }
        if password.chars().any(|c| c.is_ascii_digit()) {
            pool += DIGITS.len();
        }
        if password.chars().any(|c| SPECIAL.contains(c)) {
            pool += SPECIAL.len();
        }

        if pool <= 1 {
            return 0.0;
        }
        password.chars().count() as f64 * (pool as f64).log2()
    }

    /// Rating of [`Self::entropy`].
    pub fn strength(&self) -> StrengthRating {
        StrengthRating::from_entropy(self.entropy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_generates_every_class() {
        let generator = PasswordGenerator::new();
        for _ in 0..50 {
            let password = generator.generate().unwrap();
            assert_eq!(password.chars().count(), 16);
            assert!(password.chars().any(|c| c.is_ascii_lowercase()));
            assert!(password.chars().any(|c| c.is_ascii_uppercase()));
            assert!(password.chars().any(|c| c.is_ascii_digit()));
            assert!(password.chars().any(|c| SPECIAL.contains(c)));
        }
    }

    #[test]
    fn test_length_is_clamped() {
        assert_eq!(PasswordGenerator::new().with_length(1).length(), MIN_LENGTH);
        assert_eq!(PasswordGenerator::new().with_length(10_000).length(), MAX_LENGTH);

        let long = PasswordGenerator::new().with_length(MAX_LENGTH).generate().unwrap();
        assert_eq!(long.len(), MAX_LENGTH);
    }

    #[test]
    fn test_exclude_similar() {
        let generator = PasswordGenerator {
            exclude_similar: true,
            ..PasswordGenerator::default()
        }
        .with_length(500);

        let password = generator.generate().unwrap();
        assert!(!password.chars().any(|c| SIMILAR.contains(c)));
    }

    #[test]
    fn test_digits_only() {
        let generator = PasswordGenerator {
            use_lowercase: false,
            use_uppercase: false,
            use_special: false,
            ..PasswordGenerator::default()
        };

        let password = generator.generate().unwrap();
        assert!(password.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(generator.pool_size(), 10);
    }

    #[test]
    fn test_empty_pool_fails() {
        let generator = PasswordGenerator {
            use_lowercase: false,
            use_uppercase: false,
            use_digits: false,
            use_special: false,
            ..PasswordGenerator::default()
        };

        assert!(generator.generate().is_err());
        assert_eq!(generator.entropy(), 0.0);
    }

    #[test]
    fn test_memorable_shape() {
        let passphrase = PasswordGenerator::generate_memorable(4);

        assert!(passphrase.chars().next().unwrap().is_ascii_uppercase());
        assert!(SPECIAL.contains(passphrase.chars().last().unwrap()));
        assert!(passphrase.chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_entropy_and_rating() {
        // 16 chars over 26 + 26 + 10 + 28 = 90 symbols
        let generator = PasswordGenerator::new();
        let expected = 16.0 * 90f64.log2();
        assert!((generator.entropy() - expected).abs() < 1e-9);
        assert_eq!(generator.strength(), StrengthRating::Strong);

        assert_eq!(PasswordGenerator::password_entropy("aaaa"), 4.0 * 26f64.log2());
        assert_eq!(StrengthRating::from_entropy(18.8), StrengthRating::VeryWeak);
        assert_eq!(StrengthRating::from_entropy(200.0), StrengthRating::VeryStrong);
    }
}
