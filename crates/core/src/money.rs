//! Integer-cents money arithmetic.
//!
//! Every amount the engine compares is an `i64` number of cents.
//! Floats appear only at the analytics edge (ratios), never in
//! equality or tolerance comparisons.

use crate::error::TieoutError;

/// An amount in cents. Negative values are valid (contra accounts,
/// cash outflows).
pub type Cents = i64;

/// Parse a currency string into cents.
///
/// Accepts optional `$`, thousands separators, a leading `-` or
/// parenthesized negatives (`(1,234.56)`), and at most two decimal
/// places.
pub fn parse_amount(raw: &str) -> Result<Cents, TieoutError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TieoutError::MalformedAmount(raw.to_string()));
    }

    let (body, negative) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (&trimmed[1..trimmed.len() - 1], true)
    } else if let Some(rest) = trimmed.strip_prefix('-') {
        (rest, true)
    } else {
        (trimmed, false)
    };

    let cleaned: String = body
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Err(TieoutError::MalformedAmount(raw.to_string()));
    }

    let (dollars, cents) = match cleaned.split_once('.') {
        Some((d, c)) => {
            if c.len() > 2 || !c.chars().all(|ch| ch.is_ascii_digit()) {
                return Err(TieoutError::MalformedAmount(raw.to_string()));
            }
            let mut frac = c.to_string();
            while frac.len() < 2 {
                frac.push('0');
            }
            (d.to_string(), frac)
        }
        None => (cleaned.clone(), "00".to_string()),
    };

    let dollars = if dollars.is_empty() { "0".to_string() } else { dollars };
    if !dollars.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(TieoutError::MalformedAmount(raw.to_string()));
    }

    let whole: i64 = dollars
        .parse()
        .map_err(|_| TieoutError::MalformedAmount(raw.to_string()))?;
    let frac: i64 = cents
        .parse()
        .map_err(|_| TieoutError::MalformedAmount(raw.to_string()))?;

    let value = whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(frac))
        .ok_or_else(|| TieoutError::MalformedAmount(raw.to_string()))?;

    Ok(if negative { -value } else { value })
}

/// Convert whole dollars (possibly fractional) to cents, rounding
/// half away from zero.
pub fn dollars_to_cents(dollars: f64) -> Cents {
    (dollars * 100.0).round() as Cents
}

/// Cents to fractional dollars. For display and ratio math only.
pub fn cents_to_dollars(cents: Cents) -> f64 {
    cents as f64 / 100.0
}

/// Format cents as `1,234.56` / `-1,234.56`.
pub fn format_cents(cents: Cents) -> String {
    let negative = cents < 0;
    let abs = cents.unsigned_abs();
    let whole = abs / 100;
    let frac = abs % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-{}.{:02}", grouped, frac)
    } else {
        format!("{}.{:02}", grouped, frac)
    }
}

/// Signed variance `left - right`.
pub fn variance(left: Cents, right: Cents) -> Cents {
    left - right
}

/// Whether two amounts agree within `tolerance` (absolute, inclusive).
pub fn within_tolerance(left: Cents, right: Cents, tolerance: Cents) -> bool {
    (left - right).abs() <= tolerance
}

/// Leading digit (1-9) of an amount, ignoring sign. `None` for zero.
pub fn leading_digit(cents: Cents) -> Option<u32> {
    let mut v = cents.unsigned_abs();
    if v == 0 {
        return None;
    }
    while v >= 10 {
        v /= 10;
    }
    Some(v as u32)
}

/// Whether an amount is an even dollar figure (ends in `.00`).
pub fn is_round_dollar(cents: Cents) -> bool {
    cents % 100 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain() {
        assert_eq!(parse_amount("1234.56").unwrap(), 123_456);
        assert_eq!(parse_amount("0.07").unwrap(), 7);
        assert_eq!(parse_amount("12").unwrap(), 1_200);
        assert_eq!(parse_amount("12.5").unwrap(), 1_250);
    }

    #[test]
    fn parse_currency_formats() {
        assert_eq!(parse_amount("$2,480,810.88").unwrap(), 248_081_088);
        assert_eq!(parse_amount("-1,000.00").unwrap(), -100_000);
        assert_eq!(parse_amount("(45,000.00)").unwrap(), -4_500_000);
        assert_eq!(parse_amount(" $5 ").unwrap(), 500);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_amount("").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("1.234").is_err());
        assert!(parse_amount("--5").is_err());
    }

    #[test]
    fn format_round_trips() {
        assert_eq!(format_cents(248_081_088), "2,480,810.88");
        assert_eq!(format_cents(-4_500_000), "-45,000.00");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(7), "0.07");
        assert_eq!(format_cents(100_000), "1,000.00");
    }

    #[test]
    fn tolerance_is_inclusive() {
        assert!(within_tolerance(100_00, 100_50, 50));
        assert!(!within_tolerance(100_00, 100_51, 50));
        assert!(within_tolerance(-100, 100, 200));
    }

    #[test]
    fn leading_digits() {
        assert_eq!(leading_digit(248_081_088), Some(2));
        assert_eq!(leading_digit(-950), Some(9));
        assert_eq!(leading_digit(0), None);
        assert_eq!(leading_digit(1), Some(1));
    }

    #[test]
    fn round_dollar_detection() {
        assert!(is_round_dollar(500_00));
        assert!(is_round_dollar(-120_000_00));
        assert!(!is_round_dollar(500_01));
    }
}
