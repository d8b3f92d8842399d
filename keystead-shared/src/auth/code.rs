//! Single-use numeric codes sent by email
//!
//! A code is a uniformly random six-digit number valid for ten minutes. A user
//! holds at most one pending code; issuing a new one replaces the old. Codes are
//! cleared as soon as they are consumed or found expired.

use crate::models::User;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Lifetime of a one-time code in seconds
pub const CODE_TTL_SECS: i64 = 600;

pub const CODE_MIN: i32 = 100_000;
pub const CODE_MAX: i32 = 999_999;

/// Outcome of checking a submitted code against a user's pending code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Valid,

    /// No pending code, or a different one
    Mismatch,

    /// The code matched but its expiry has passed
    Expired,
}

/// Draws a code uniformly from `CODE_MIN..=CODE_MAX`
pub fn generate_code() -> i32 {
    rand::thread_rng().gen_range(CODE_MIN..=CODE_MAX)
}

/// Generates a fresh code, stores it on `user` with its expiry and returns it
pub fn assign_code(user: &mut User, now: DateTime<Utc>) -> i32 {
    let code = generate_code();
    user.code = Some(code);
    user.code_expires_at = Some(now + Duration::seconds(CODE_TTL_SECS));
    code
}

/// Compares `submitted` with the user's pending code
///
/// The match is checked first, so a wrong guess never reveals whether a code
/// has lapsed.
pub fn check_code(user: &User, submitted: i32, now: DateTime<Utc>) -> CodeCheck {
    if user.code != Some(submitted) {
        return CodeCheck::Mismatch;
    }

    match user.code_expires_at {
        Some(expires_at) if expires_at < now => CodeCheck::Expired,
        _ => CodeCheck::Valid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..1_000 {
            let code = generate_code();
            assert!((CODE_MIN..=CODE_MAX).contains(&code), "code {} out of range", code);
        }
    }

    #[test]
    fn test_assign_code_sets_expiry() {
        let now = Utc::now();
        let mut user = User::provisional("c@example.com");

        let code = assign_code(&mut user, now);
        assert_eq!(user.code, Some(code));
        assert_eq!(user.code_expires_at, Some(now + Duration::seconds(600)));
    }

    #[test]
    fn test_check_code_outcomes() {
        let now = Utc::now();
        let mut user = User::provisional("c@example.com");
        assert_eq!(check_code(&user, 123_456, now), CodeCheck::Mismatch);

        let code = assign_code(&mut user, now);
        assert_eq!(check_code(&user, code, now), CodeCheck::Valid);
        assert_eq!(
            check_code(&user, if code == CODE_MAX { CODE_MIN } else { code + 1 }, now),
            CodeCheck::Mismatch
        );
        assert_eq!(
            check_code(&user, code, now + Duration::seconds(601)),
            CodeCheck::Expired
        );

        user.clear_code();
        assert_eq!(check_code(&user, code, now), CodeCheck::Mismatch);
    }
}
