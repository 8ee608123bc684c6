//! Input validation for PINs and mnemonic phrases

use crate::{
    constants::{MIN_MNEMONIC_WORDS, MIN_PIN_LENGTH},
    error::{Error, Result},
};

/// Check PIN strength
///
/// A PIN needs at least [`MIN_PIN_LENGTH`] characters (inclusive) and at
/// least one digit, one lowercase and one uppercase ASCII letter. All failed
/// rules are reported at once.
pub fn validate_pin(pin: &str) -> Result<()> {
    let mut errors = Vec::new();

    if pin.chars().count() < MIN_PIN_LENGTH {
        errors.push(format!("PIN must be at least {MIN_PIN_LENGTH} characters"));
    }
    if !pin.chars().any(|c| c.is_ascii_digit()) {
        errors.push("PIN must contain at least one number".to_string());
    }
    if !pin.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("PIN must contain at least one lowercase letter".to_string());
    }
    if !pin.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("PIN must contain at least one uppercase letter".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidPin(errors))
    }
}

/// Check a PIN and its confirmation
pub fn validate_new_pin(pin: &str, confirm: &str) -> Result<()> {
    validate_pin(pin)?;
    if pin != confirm {
        return Err(Error::PinMismatch);
    }
    Ok(())
}

/// Check a mnemonic phrase before import
///
/// Only the shape is checked (ASCII letters separated by whitespace, at least
/// [`MIN_MNEMONIC_WORDS`] words). Word list membership and checksum are left
/// to the device.
pub fn validate_mnemonic(mnemonic: &str) -> Result<()> {
    let trimmed = mnemonic.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidMnemonic(vec!["Mnemonic phrase is required".into()]));
    }

    let mut errors = Vec::new();

    if !trimmed.chars().all(|c| c.is_ascii_alphabetic() || c.is_whitespace()) {
        errors.push("Mnemonic phrase can only contain letters and spaces".to_string());
    }

    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() < MIN_MNEMONIC_WORDS {
        errors.push(format!(
            "Mnemonic phrase must contain at least {MIN_MNEMONIC_WORDS} words (currently {})",
            words.len()
        ));
    }

    for (index, word) in words.iter().enumerate() {
        if !word.chars().all(|c| c.is_ascii_alphabetic()) {
            errors.push(format!("Word {} {word:?} contains invalid characters", index + 1));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidMnemonic(errors))
    }
}

/// Normalize a mnemonic to lowercase words separated by single spaces
pub fn normalize_mnemonic(mnemonic: &str) -> String {
    mnemonic
        .split_whitespace()
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORDS: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_pin_valid() {
        assert!(validate_pin("Abcdefg1").is_ok());
        assert!(validate_pin("Str0ngPassword").is_ok());
    }

    #[test]
    fn test_pin_length_bound_is_inclusive() {
        // Exactly eight characters passes, seven fails
        assert!(validate_pin("Abcdef12").is_ok());
        assert!(matches!(validate_pin("Abcde12"), Err(Error::InvalidPin(e)) if e.len() == 1));
    }

    #[test]
    fn test_pin_reports_every_rule() {
        match validate_pin("abc") {
            Err(Error::InvalidPin(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_new_pin_mismatch() {
        assert!(matches!(validate_new_pin("Abcdefg1", "Abcdefg2"), Err(Error::PinMismatch)));
        assert!(validate_new_pin("Abcdefg1", "Abcdefg1").is_ok());
    }

    #[test]
    fn test_mnemonic_valid() {
        assert!(validate_mnemonic(WORDS).is_ok());
        assert!(validate_mnemonic(&format!("  {WORDS}\n")).is_ok());
    }

    #[test]
    fn test_mnemonic_empty() {
        assert!(matches!(validate_mnemonic("   "), Err(Error::InvalidMnemonic(_))));
    }

    #[test]
    fn test_mnemonic_too_short() {
        match validate_mnemonic("abandon about") {
            Err(Error::InvalidMnemonic(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].contains("currently 2"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mnemonic_bad_characters() {
        let phrase = WORDS.replace("about", "ab0ut");
        match validate_mnemonic(&phrase) {
            Err(Error::InvalidMnemonic(errors)) => {
                assert!(errors.iter().any(|e| e.contains("Word 12")));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_normalize_mnemonic() {
        assert_eq!(normalize_mnemonic("  Abandon\tABOUT  "), "abandon about");
    }
}
