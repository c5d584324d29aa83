/// Formats cents as the fixed-point string the payment gateway expects, e.g. `2000` -> `"20.00"`.
pub fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Saving of the yearly price over twelve monthly payments, in whole percent.
pub fn discount_percent(monthly_cents: i64, yearly_cents: i64) -> i32 {
    if monthly_cents == 0 {
        return 0;
    }
    let ratio = yearly_cents as f64 / (monthly_cents as f64 * 12.0);
    (100.0 - ratio * 100.0).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(2000), "20.00");
        assert_eq!(format_amount(1999), "19.99");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(0), "0.00");
    }

    #[test]
    fn test_discount_percent() {
        // 10/month, 100/year -> 16.67% off
        assert_eq!(discount_percent(1000, 10_000), 17);
        assert_eq!(discount_percent(1000, 12_000), 0);
        assert_eq!(discount_percent(0, 5000), 0);
    }
}
