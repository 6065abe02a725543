use std::fmt::Display;

use rand::seq::SliceRandom;
use rand::Rng;

const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()_+=-";
/// Symbols the backend's password policy counts
const POLICY_SYMBOLS: &[u8] = b"@$!%*?&";

const GENERATED_LENGTH: usize = 12;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 32;

/// A way in which a password falls short of the account policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordIssue {
    TooShort,
    TooLong,
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSymbol,
}

impl Display for PasswordIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordIssue::TooShort => write!(
                f,
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            ),
            PasswordIssue::TooLong => write!(
                f,
                "Password cannot be longer than {} characters",
                MAX_PASSWORD_LENGTH
            ),
            PasswordIssue::MissingUppercase => {
                write!(f, "Password must include at least one uppercase letter")
            }
            PasswordIssue::MissingLowercase => {
                write!(f, "Password must include at least one lowercase letter")
            }
            PasswordIssue::MissingDigit => write!(f, "Password must include at least one number"),
            PasswordIssue::MissingSymbol => write!(
                f,
                "Password must include at least one special character (@, $, !, %, *, ?, &)"
            ),
        }
    }
}

/// Check a password against the account policy, reporting every issue found
pub fn validate_password(password: &str) -> Result<(), Vec<PasswordIssue>> {
    let mut issues = Vec::new();
    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        issues.push(PasswordIssue::TooShort);
    }
    if length > MAX_PASSWORD_LENGTH {
        issues.push(PasswordIssue::TooLong);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        issues.push(PasswordIssue::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        issues.push(PasswordIssue::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        issues.push(PasswordIssue::MissingDigit);
    }
    if !password.bytes().any(|b| POLICY_SYMBOLS.contains(&b)) {
        issues.push(PasswordIssue::MissingSymbol);
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Generate a 12 character password that satisfies the account policy
pub fn generate_strong_password() -> String {
    generate_with(&mut rand::thread_rng())
}

fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut chars = vec![
        pick(rng, UPPERCASE),
        pick(rng, LOWERCASE),
        pick(rng, DIGITS),
        pick(rng, POLICY_SYMBOLS),
    ];

    let all = [UPPERCASE, LOWERCASE, DIGITS, SYMBOLS].concat();
    while chars.len() < GENERATED_LENGTH {
        chars.push(pick(rng, &all));
    }

    chars.shuffle(rng);
    chars.into_iter().map(char::from).collect()
}

fn pick<R: Rng + ?Sized>(rng: &mut R, set: &[u8]) -> u8 {
    set[rng.gen_range(0..set.len())]
}
