//! Number formatting shared by log messages and tool results.

/// Format a number the way it reads in a sentence: `250` stays `250`, `2.5`
/// stays `2.5`, and no trailing `.0` is added.
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        // Covers -0.0 as well.
        return "0".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() };
    }
    value.to_string()
}

/// Format an amount as pounds with two decimals, e.g. `£1,234.50`.
pub fn format_gbp(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let pence = (value.abs() * 100.0).round() as u64;
    let pounds = (pence / 100).to_string();

    let mut grouped = String::with_capacity(pounds.len() + pounds.len() / 3);
    for (i, digit) in pounds.chars().enumerate() {
        if i > 0 && (pounds.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("{sign}£{grouped}.{:02}", pence % 100)
}
