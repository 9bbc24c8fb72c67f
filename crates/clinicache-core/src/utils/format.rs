use chrono::{DateTime, Utc};

/// Format a phone number for display
/// Handles various input formats and normalizes to (XXX) XXX-XXXX
pub fn format_phone(phone: &str) -> String {
    // Extract just the digits
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        7 => format!("{}-{}", &digits[0..3], &digits[3..7]),
        10 => format!(
            "({}) {}-{}",
            &digits[0..3],
            &digits[3..6],
            &digits[6..10]
        ),
        11 if digits.starts_with('1') => format!(
            "({}) {}-{}",
            &digits[1..4],
            &digits[4..7],
            &digits[7..11]
        ),
        _ => phone.to_string(), // Return original if can't format
    }
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Day-first date and time, the way appointment lists display it (dd/mm/yyyy hh:mm).
pub fn format_appointment_date(date: &DateTime<Utc>) -> String {
    date.format("%d/%m/%Y %H:%M").to_string()
}

/// Case-insensitive substring check
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
