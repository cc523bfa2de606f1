/// Parse a gram quantity typed into an ingredient field.
///
/// Either `,` or `.` is accepted as the decimal separator. Empty input, text
/// that is not a number, and negative or non-finite values all become `0.0`.
pub fn parse_quantity(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed.replace(',', ".").parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => value,
        _ => 0.0,
    }
}

/// Text shown in an ingredient field for a quantity coming from the backend:
/// one decimal with a comma separator, or empty for zero.
pub fn format_quantity(quantity_g: f64) -> String {
    if quantity_g > 0.0 {
        format!("{:.1}", quantity_g).replace('.', ",")
    } else {
        String::new()
    }
}
