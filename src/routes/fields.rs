//! Request field checks shared by the handlers. Each helper records its
//! messages into a `FieldErrors` and returns the accepted value, if any.

use rust_decimal::Decimal;

use crate::error::FieldErrors;
use crate::identity::{self, MAX_FIELD_LEN, MIN_PASSWORD_LEN};

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";

/// A text field. `None` is an error only when `required`; blank is
/// always an error.
pub fn text<'a>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&'a str>,
    required: bool,
) -> Option<&'a str> {
    match value {
        None => {
            if required {
                errors.add(field, REQUIRED);
            }
            None
        }
        Some(v) if v.trim().is_empty() => {
            errors.add(field, BLANK);
            None
        }
        Some(v) if v.chars().count() > MAX_FIELD_LEN => {
            errors.add(
                field,
                format!("Ensure this field has no more than {MAX_FIELD_LEN} characters."),
            );
            None
        }
        Some(v) => Some(v),
    }
}

/// Text that may be empty but is still length-limited.
pub fn optional_text<'a>(errors: &mut FieldErrors, field: &str, value: &'a str) -> Option<&'a str> {
    if value.chars().count() > MAX_FIELD_LEN {
        errors.add(
            field,
            format!("Ensure this field has no more than {MAX_FIELD_LEN} characters."),
        );
        return None;
    }
    Some(value)
}

/// Normalised email, if well-formed.
pub fn email(errors: &mut FieldErrors, raw: &str) -> Option<String> {
    let email = identity::normalize_email(raw);
    if identity::is_valid_email(&email) {
        Some(email)
    } else {
        errors.add("email", "Enter a valid email address.");
        None
    }
}

pub fn password<'a>(errors: &mut FieldErrors, raw: &'a str) -> Option<&'a str> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Ensure this field has at least {MIN_PASSWORD_LEN} characters."),
        );
        None
    } else {
        Some(raw)
    }
}

/// NUMERIC(5, 2): at most 3 integer digits and 2 decimal places.
pub fn price(errors: &mut FieldErrors, price: Decimal) -> Option<Decimal> {
    if price.scale() > 2 {
        errors.add("price", "Ensure that there are no more than 2 decimal places.");
        return None;
    }
    if price.abs().trunc() >= Decimal::ONE_THOUSAND {
        errors.add(
            "price",
            "Ensure that there are no more than 3 digits before the decimal point.",
        );
        return None;
    }
    Some(price)
}

pub fn required<T>(errors: &mut FieldErrors, field: &str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        errors.add(field, REQUIRED);
    }
    value
}
