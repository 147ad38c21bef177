//! Lexicographic text encodings for numeric scalars.
//!
//! Contract:
//! - For two values `a < b` of the same scalar kind, `lex(a) < lex(b)` as
//!   text, provided both fit the fixed digit widths below.
//! - Encodings are deterministic; they are never parsed back.
//!
//! Shape: one sign byte (`'0'` negative, `'1'` non-negative) followed by a
//! zero-padded magnitude. Negative magnitudes are complemented so that more
//! negative values sort first.

use rust_decimal::Decimal;

/// Digit width of the integer encoding.
pub(crate) const INT_WIDTH: usize = 20;

/// Digit widths of the binary-float encoding (integer / fractional halves).
pub(crate) const FLOAT_INT_WIDTH: usize = 10;
pub(crate) const FLOAT_FRAC_WIDTH: usize = 10;

/// Digit widths of the fixed-point decimal encoding.
const DECIMAL_INT_WIDTH: usize = 20;
const DECIMAL_FRAC_WIDTH: usize = 20;

/// Encode an integer: sign byte plus 20-digit magnitude, complemented as
/// `10^20 - |n|` for negatives.
pub(crate) fn lex_int(n: i64) -> String {
    if n < 0 {
        let magnitude = 10u128.pow(INT_WIDTH as u32) - u128::from(n.unsigned_abs());
        format!("0{magnitude:0width$}", width = INT_WIDTH)
    } else {
        format!("1{n:0width$}", width = INT_WIDTH)
    }
}

/// Encode a binary float: sign byte, 10-digit integer half, `.`, 10-digit
/// fractional half. Negative halves are nines-complemented digit-wise.
pub(crate) fn lex_float(f: f64) -> String {
    let text = format!("{:.prec$}", f.abs(), prec = FLOAT_FRAC_WIDTH);
    encode_parts(&text, f < 0.0, FLOAT_INT_WIDTH, FLOAT_FRAC_WIDTH)
}

/// Encode a fixed-point decimal: sign byte, 20-digit integer half, `.`,
/// 20-digit fractional half.
pub(crate) fn lex_decimal(d: Decimal) -> String {
    let negative = d.is_sign_negative() && !d.is_zero();
    encode_parts(&d.abs().to_string(), negative, DECIMAL_INT_WIDTH, DECIMAL_FRAC_WIDTH)
}

fn encode_parts(text: &str, negative: bool, int_width: usize, frac_width: usize) -> String {
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text, ""));

    let int_padded = format!("{int_part:0>int_width$}");
    let frac_padded = if frac_part.len() > frac_width {
        frac_part[..frac_width].to_string()
    } else {
        format!("{frac_part:0<frac_width$}")
    };

    if negative {
        format!(
            "0{}.{}",
            nines_complement(&int_padded),
            nines_complement(&frac_padded)
        )
    } else {
        format!("1{int_padded}.{frac_padded}")
    }
}

// Digit-wise nines complement keeps the fixed width, so a zero fractional
// half still occupies exactly `frac_width` characters.
fn nines_complement(digits: &str) -> String {
    digits
        .chars()
        .map(|c| {
            if c.is_ascii_digit() {
                char::from(b'9' - (c as u8 - b'0'))
            } else {
                c
            }
        })
        .collect()
}

///
/// TESTS
///
