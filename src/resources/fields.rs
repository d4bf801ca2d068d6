//! Payload field helpers shared by the resource types.
//!
//! Update payloads distinguish three states per field: absent (`None`),
//! explicit `null` (`Some(None)`) and a value (`Some(Some(v))`).

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use time::OffsetDateTime;

use crate::error::FieldErrors;

pub const REQUIRED: &str = "This field is required.";
pub const NOT_NULL: &str = "This field may not be null.";
pub const NOT_BLANK: &str = "This field may not be blank.";

const COUNT_MAX: i64 = i32::MAX as i64;

pub type Field<T> = Option<Option<T>>;

/// `#[serde(default, deserialize_with = "nullable")]` keeps `null` apart from absence.
pub fn nullable<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// RFC 3339 timestamp on the wire.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Rfc3339(#[serde(with = "time::serde::rfc3339")] pub OffsetDateTime);

/// A field that may not be null. Absence is an error unless `partial`.
pub fn required<T>(errors: &mut FieldErrors, name: &str, value: Field<T>, partial: bool) -> Option<T> {
    match value {
        Some(Some(v)) => Some(v),
        Some(None) => {
            errors.add(name, NOT_NULL);
            None
        }
        None => {
            if !partial {
                errors.add(name, REQUIRED);
            }
            None
        }
    }
}

/// A field that may be omitted but not nulled.
pub fn optional<T>(errors: &mut FieldErrors, name: &str, value: Field<T>) -> Option<T> {
    required(errors, name, value, true)
}

/// Trimmed, non-blank text of at most `max` characters (`None` for no limit).
pub fn text(errors: &mut FieldErrors, name: &str, value: String, max: Option<usize>) -> Option<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        errors.add(name, NOT_BLANK);
        return None;
    }
    if let Some(max) = max {
        if value.chars().count() > max {
            errors.add(name, format!("Ensure this field has no more than {max} characters."));
            return None;
        }
    }
    Some(value)
}

/// Non-negative count that fits a 32-bit column.
pub fn count(errors: &mut FieldErrors, name: &str, value: i64) -> Option<i32> {
    if value < 0 {
        errors.add(name, "Ensure this value is greater than or equal to 0.");
        return None;
    }
    if value > COUNT_MAX {
        errors.add(name, format!("Ensure this value is less than or equal to {COUNT_MAX}."));
        return None;
    }
    i32::try_from(value).ok()
}

/// Fixed-point decimal with at most `max_digits` digits, `places` of them fractional.
/// Digits are counted as written, so trailing fraction zeros count too. The
/// result is rescaled to exactly `places` fraction digits.
pub fn decimal(
    errors: &mut FieldErrors,
    name: &str,
    value: Decimal,
    max_digits: u32,
    places: u32,
) -> Option<Decimal> {
    let scale = value.scale();
    let digits = value.mantissa().unsigned_abs().to_string().len() as u32;
    let whole = digits.saturating_sub(scale);
    let total = digits.max(scale);

    if total > max_digits {
        errors.add(name, format!("Ensure that there are no more than {max_digits} digits in total."));
        return None;
    }
    if scale > places {
        errors.add(name, format!("Ensure that there are no more than {places} decimal places."));
        return None;
    }
    if whole > max_digits - places {
        errors.add(
            name,
            format!(
                "Ensure that there are no more than {} digits before the decimal point.",
                max_digits - places
            ),
        );
        return None;
    }

    let mut fixed = value;
    fixed.rescale(places);
    Some(fixed)
}
