//! # Validation Module
//!
//! Input validation for requests crossing the HTTP surface. Structural
//! problems are rejected here with a 400 before any transaction opens; the
//! store's NOT NULL / UNIQUE / foreign-key constraints remain the last line
//! of defense.

use crate::error::ValidationError;
use crate::{PIN_MAX_LEN, PIN_MIN_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Authentication
// =============================================================================

/// Validates a login PIN: 4-10 characters, digits only.
///
/// ## Example
/// ```rust
/// use harbor_core::validation::validate_pin;
///
/// assert!(validate_pin("1234").is_ok());
/// assert!(validate_pin("12").is_err());
/// assert!(validate_pin("12a4").is_err());
/// ```
pub fn validate_pin(pin: &str) -> ValidationResult<()> {
    if pin.is_empty() {
        return Err(ValidationError::Required {
            field: "pin".to_string(),
        });
    }

    if pin.len() < PIN_MIN_LEN || pin.len() > PIN_MAX_LEN {
        return Err(ValidationError::LengthOutOfRange {
            field: "pin".to_string(),
            min: PIN_MIN_LEN,
            max: PIN_MAX_LEN,
        });
    }

    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "pin".to_string(),
            reason: "digits only".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Money & Quantities
// =============================================================================

/// Validates a monetary amount: finite and strictly positive.
pub fn validate_positive_amount(field: &str, amount: f64) -> ValidationResult<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a line quantity: finite and strictly positive.
pub fn validate_quantity(quantity: f64) -> ValidationResult<()> {
    validate_positive_amount("quantity", quantity)
}

// =============================================================================
// Structural
// =============================================================================

/// Rejects an empty or whitespace-only required string.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Rejects an empty collection.
pub fn validate_non_empty<T>(field: &str, items: &[T]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Empty {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_length_bounds() {
        assert!(validate_pin("1234").is_ok());
        assert!(validate_pin("1234567890").is_ok());
        assert!(validate_pin("123").is_err());
        assert!(validate_pin("12345678901").is_err());
        assert!(validate_pin("").is_err());
    }

    #[test]
    fn test_pin_digits_only() {
        assert!(validate_pin("12x4").is_err());
        assert!(validate_pin("    ").is_err());
    }

    #[test]
    fn test_positive_amount() {
        assert!(validate_positive_amount("total", 10.0).is_ok());
        assert!(validate_positive_amount("total", 0.0).is_err());
        assert!(validate_positive_amount("total", -1.0).is_err());
        assert!(validate_positive_amount("total", f64::NAN).is_err());
    }

    #[test]
    fn test_required_and_non_empty() {
        assert!(validate_required("name", "table 5").is_ok());
        assert!(validate_required("name", "  ").is_err());
        assert!(validate_non_empty("items", &[1]).is_ok());
        assert!(validate_non_empty::<i32>("items", &[]).is_err());
    }
}
