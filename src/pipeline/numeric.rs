//! Decimal-comma number parsing.
//!
//! The report prints amounts as `1.234.567,89`: `.` groups thousands and `,`
//! separates decimals. Every numeric cell in the pipeline goes through
//! [`parse_decimal`]; it never panics and returns `None` on anything it
//! cannot read.

/// Parse a decimal-comma amount.
///
/// Whitespace anywhere in the text is ignored. A leading `-` or surrounding
/// parentheses mark a negative amount. Returns `None` for blank input and for
/// anything that is not digits with optional separators.
///
/// ```rust
/// use saf2xlsx::pipeline::numeric::parse_decimal;
///
/// assert_eq!(parse_decimal("1.234,56"), Some(1234.56));
/// assert_eq!(parse_decimal("(10,5)"), Some(-10.5));
/// assert_eq!(parse_decimal("n/d"), None);
/// ```
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let (negative, body) = if let Some(inner) = compact
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        (true, inner)
    } else if let Some(rest) = compact.strip_prefix('-') {
        (true, rest)
    } else {
        (false, compact.as_str())
    };

    let normalised: String = body
        .chars()
        .filter(|&c| c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();

    if !is_plain_decimal(&normalised) {
        return None;
    }

    let value: f64 = normalised.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Digits with at most one `.` that is neither first nor last.
fn is_plain_decimal(s: &str) -> bool {
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    if parts.next().is_some() {
        return false;
    }
    let digits = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());
    match frac_part {
        Some(frac) => digits(int_part) && digits(frac),
        None => digits(int_part),
    }
}
