use alloy_primitives::U256;

/// Render `raw / 10^decimals` exactly.
///
/// Works on the decimal digits of the integer so no precision is lost for any
/// 256-bit amount. The result always has at least one fractional digit and no
/// trailing zeros beyond it: `2500000000000000000 @ 18 -> "2.5"`,
/// `1000000 @ 6 -> "1.0"`.
pub fn format_units(raw: U256, decimals: u32) -> String {
    let digits = raw.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return format!("{}.0", digits);
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };

    let (integer, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    let fraction = if fraction.is_empty() { "0" } else { fraction };

    format!("{}.{}", integer, fraction)
}
