//! Advisory password strength scoring.
//!
//! Scores are informational only; nothing in the vault rejects a weak
//! password.

use std::collections::HashSet;
use std::fmt;

/// Length below which a password is flagged as too short.
pub const MIN_RECOMMENDED_LENGTH: usize = 8;

/// Coarse strength bucket derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StrengthLevel {
    VeryWeak,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl StrengthLevel {
    fn from_score(score: u8) -> Self {
        match score {
            0..=29 => Self::VeryWeak,
            30..=49 => Self::Weak,
            50..=69 => Self::Moderate,
            70..=89 => Self::Strong,
            _ => Self::VeryStrong,
        }
    }
}

impl fmt::Display for StrengthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::VeryWeak => "very weak",
            Self::Weak => "weak",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
            Self::VeryStrong => "very strong",
        };
        f.write_str(label)
    }
}

/// Suggestion attached to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrengthHint {
    Empty,
    TooShort,
    MissingLowercase,
    MissingUppercase,
    MissingDigit,
    MissingSymbol,
}

impl fmt::Display for StrengthHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Empty => "password is empty",
            Self::TooShort => "too short",
            Self::MissingLowercase => "add lowercase letters",
            Self::MissingUppercase => "add uppercase letters",
            Self::MissingDigit => "add digits",
            Self::MissingSymbol => "add symbols",
        };
        f.write_str(text)
    }
}

/// Result of [`evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordStrength {
    /// 0 to 100.
    pub score: u8,
    pub level: StrengthLevel,
    pub feedback: Vec<StrengthHint>,
}

/// Score a password.
///
/// Up to five points for length (thresholds at 8, 10, 12, 14 and 16
/// characters), one point per character class present (lowercase,
/// uppercase, digit, symbol) and one point when more than half of the
/// characters are distinct. The sum is scaled by ten and capped at 100.
pub fn evaluate(password: &str) -> PasswordStrength {
    if password.is_empty() {
        return PasswordStrength {
            score: 0,
            level: StrengthLevel::VeryWeak,
            feedback: vec![StrengthHint::Empty],
        };
    }

    let mut points: u8 = 0;
    let mut feedback = Vec::new();

    let length = password.chars().count();
    points += match length {
        0..=7 => {
            feedback.push(StrengthHint::TooShort);
            0
        }
        8..=9 => 1,
        10..=11 => 2,
        12..=13 => 3,
        14..=15 => 4,
        _ => 5,
    };

    let classes = [
        (
            password.chars().any(|c| c.is_ascii_lowercase()),
            StrengthHint::MissingLowercase,
        ),
        (
            password.chars().any(|c| c.is_ascii_uppercase()),
            StrengthHint::MissingUppercase,
        ),
        (
            password.chars().any(|c| c.is_ascii_digit()),
            StrengthHint::MissingDigit,
        ),
        (
            password.chars().any(|c| !c.is_ascii_alphanumeric()),
            StrengthHint::MissingSymbol,
        ),
    ];
    for (present, hint) in classes {
        if present {
            points += 1;
        } else {
            feedback.push(hint);
        }
    }

    let unique = password.chars().collect::<HashSet<_>>().len();
    if unique * 2 > length {
        points += 1;
    }

    let score = (points * 10).min(100);
    PasswordStrength {
        score,
        level: StrengthLevel::from_score(score),
        feedback,
    }
}
