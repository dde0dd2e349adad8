//! Password strength policy with a binary verdict.

use crate::models::Settings;

pub struct PasswordStrengthChecker;

impl PasswordStrengthChecker {
    /// Minimum length comes from the instance settings; everything else is
    /// deliberately permissive (length is the only signal that scales).
    #[must_use]
    pub fn check(password: &str, settings: &Settings) -> bool {
        password.chars().count() >= settings.required_password_length as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthenticationMethod;

    fn settings(min: u32) -> Settings {
        Settings {
            authentication_method: AuthenticationMethod::Internal,
            required_password_length: min,
        }
    }

    #[test]
    fn length_threshold() {
        assert!(!PasswordStrengthChecker::check("short", &settings(12)));
        assert!(PasswordStrengthChecker::check("long-enough-passphrase", &settings(12)));
        assert!(PasswordStrengthChecker::check("exactly12chr", &settings(12)));
    }

    #[test]
    fn multibyte_counts_characters_not_bytes() {
        assert!(PasswordStrengthChecker::check("päswährt8", &settings(8)));
    }
}
