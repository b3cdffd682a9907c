//! Random password generation and a simple strength estimate

use rand::rngs::OsRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const DIGITS: &str = "0123456789";
pub const SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Character classes to draw from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub length: usize,
    pub upper: bool,
    pub lower: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            length: 16,
            upper: true,
            lower: true,
            digits: true,
            symbols: true,
        }
    }
}

impl PasswordPolicy {
    fn pool(&self) -> Vec<char> {
        let mut pool = String::new();
        if self.lower {
            pool.push_str(LOWERCASE);
        }
        if self.upper {
            pool.push_str(UPPERCASE);
        }
        if self.digits {
            pool.push_str(DIGITS);
        }
        if self.symbols {
            pool.push_str(SYMBOLS);
        }
        if pool.is_empty() {
            pool.push_str(LOWERCASE);
            pool.push_str(UPPERCASE);
            pool.push_str(DIGITS);
        }
        pool.chars().collect()
    }
}

/// Draws every character independently and uniformly from the selected pool
/// using the OS CSPRNG. Repeats are allowed. With no class selected, letters
/// and digits are used.
pub fn generate_password(policy: &PasswordPolicy) -> String {
    let pool = policy.pool();
    let mut rng = OsRng;
    (0..policy.length)
        .map(|_| pool[rng.gen_range(0..pool.len())])
        .collect()
}

/// Strength estimate: `score` in 0..=4 plus hints for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrengthReport {
    pub score: u8,
    pub feedback: Vec<String>,
}

impl StrengthReport {
    pub fn label(&self) -> &'static str {
        match self.score {
            0 => "very weak",
            1 => "weak",
            2 => "fair",
            3 => "strong",
            _ => "very strong",
        }
    }
}

const COMMON_PASSWORDS: [&str; 5] = ["password", "123456", "qwerty", "letmein", "welcome"];

pub fn estimate_strength(password: &str) -> StrengthReport {
    let mut score: u8 = 0;
    let mut feedback = Vec::new();
    let length = password.chars().count();

    if length >= 8 {
        score += 1;
    } else {
        feedback.push("Password should be at least 8 characters".to_string());
    }

    let has_lower = password.chars().any(char::is_lowercase);
    let has_upper = password.chars().any(char::is_uppercase);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    let classes = [has_lower, has_upper, has_digit, has_special]
        .iter()
        .filter(|&&b| b)
        .count();
    score += match classes {
        4 => 3,
        3 => 2,
        2 => 1,
        _ => 0,
    };

    for (present, hint) in [
        (has_lower, "Add lowercase letters"),
        (has_upper, "Add uppercase letters"),
        (has_digit, "Add numbers"),
        (has_special, "Add special characters"),
    ] {
        if !present {
            feedback.push(hint.to_string());
        }
    }

    let charset: usize = [(has_lower, 26), (has_upper, 26), (has_digit, 10), (has_special, 32)]
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, size)| size)
        .sum();
    let entropy = length as f64 * (charset as f64).sqrt() / 10.0;
    if entropy > 15.0 {
        score += 1;
    }
    score = score.min(4);

    if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
        score = 0;
        feedback.push("Avoid common passwords".to_string());
    }

    let chars: Vec<char> = password.chars().collect();
    if chars
        .windows(3)
        .any(|w| LOWERCASE.contains(&w.iter().collect::<String>()))
    {
        score = score.saturating_sub(1);
        feedback.push("Avoid sequential characters".to_string());
    }

    StrengthReport { score, feedback }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_and_digits_only() {
        let policy = PasswordPolicy {
            length: 16,
            upper: true,
            lower: true,
            digits: true,
            symbols: false,
        };
        for _ in 0..1000 {
            let p = generate_password(&policy);
            assert_eq!(p.chars().count(), 16);
            assert!(p.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_single_class() {
        let policy = PasswordPolicy {
            length: 64,
            upper: false,
            lower: false,
            digits: true,
            symbols: false,
        };
        assert!(generate_password(&policy).chars().all(|c| c.is_ascii_digit()));

        let policy = PasswordPolicy {
            length: 64,
            upper: false,
            lower: false,
            digits: false,
            symbols: true,
        };
        assert!(generate_password(&policy).chars().all(|c| SYMBOLS.contains(c)));
    }

    #[test]
    fn test_all_disabled_falls_back() {
        let policy = PasswordPolicy {
            length: 200,
            upper: false,
            lower: false,
            digits: false,
            symbols: false,
        };
        let p = generate_password(&policy);
        assert_eq!(p.len(), 200);
        assert!(p.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_zero_length() {
        let policy = PasswordPolicy {
            length: 0,
            ..Default::default()
        };
        assert_eq!(generate_password(&policy), "");
    }

    #[test]
    fn test_strength_common_password() {
        let report = estimate_strength("password");
        assert_eq!(report.score, 0);
        assert!(report.feedback.iter().any(|f| f.contains("common")));
    }

    #[test]
    fn test_strength_short() {
        let report = estimate_strength("aB1!");
        assert!(report.feedback.iter().any(|f| f.contains("at least 8")));
    }

    #[test]
    fn test_strength_strong() {
        let report = estimate_strength("Xq7!mZ2@pL9#wR4$");
        assert_eq!(report.score, 4);
        assert_eq!(report.label(), "very strong");
        assert!(report.feedback.is_empty());
    }

    #[test]
    fn test_strength_sequential_penalty() {
        let with_run = estimate_strength("Zabc1!Q9");
        let without = estimate_strength("Zaxc1!Q9");
        assert_eq!(with_run.score + 1, without.score);
        assert!(with_run.feedback.iter().any(|f| f.contains("sequential")));
    }
}
