use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{
    Deserialize, Deserializer,
    de::{IntoDeserializer, value::StrDeserializer},
};

use crate::error::AppError;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));

/// Empty or whitespace-only input counts as "not provided".
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Serde helper: a missing, null or blank string field becomes `None`,
/// anything else is parsed as `T`.
pub fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;

    match non_empty(value.as_deref()) {
        Some(value) => {
            let input: StrDeserializer<'_, D::Error> = value.into_deserializer();
            T::deserialize(input).map(Some)
        }
        None => Ok(None),
    }
}

pub fn is_valid_email(input: &str) -> bool {
    EMAIL.is_match(input.trim())
}

/// Accepts `2025-01-31`, RFC 3339 and `2025-01-31 08:00:00`.
pub fn parse_date(field: &str, input: &str) -> Result<NaiveDate, AppError> {
    let input = input.trim();

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(input) {
        return Ok(datetime.date_naive());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S") {
        return Ok(datetime.date());
    }

    Err(AppError::MalformedPayload(format!(
        "{field} is not a valid date: {input}"
    )))
}

/// `alice@example.com` becomes `al***@example.com`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let visible: String = local.chars().take(2).collect();
            format!("{visible}***@{domain}")
        }
        None => "***".to_string(),
    }
}

pub fn page_count(total: usize, limit: u32) -> u32 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(limit as usize) as u32
}

/// Splits `text` into chunks of at most `max_chars` characters, preferring to
/// cut right before a newline.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let hard_end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(index, _)| index)
            .unwrap_or(rest.len());

        let end = if hard_end < rest.len() {
            match rest[..hard_end].rfind('\n') {
                Some(newline) if newline > 0 => newline,
                _ => hard_end,
            }
        } else {
            hard_end
        };

        chunks.push(rest[..end].to_string());
        rest = &rest[end..];
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  x ")), Some("x"));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(Some("")), None);
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn test_email() {
        assert!(is_valid_email("jane@example.com"));
        assert!(is_valid_email(" jane.doe@mail.example.org "));
        assert!(!is_valid_email("jane"));
        assert!(!is_valid_email("jane@localhost"));
        assert!(!is_valid_email("ja ne@example.com"));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(parse_date("d", "2025-03-14").unwrap(), expected);
        assert_eq!(parse_date("d", "2025-03-14T09:30:00+08:00").unwrap(), expected);
        assert_eq!(parse_date("d", "2025-03-14 09:30:00").unwrap(), expected);
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(matches!(
            parse_date("contract_end_date", "next tuesday"),
            Err(AppError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("alice@example.com"), "al***@example.com");
        assert_eq!(mask_email("a@example.com"), "a***@example.com");
        assert_eq!(mask_email("broken"), "***");
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 20), 0);
        assert_eq!(page_count(20, 20), 1);
        assert_eq!(page_count(21, 20), 2);
    }

    #[test]
    fn test_split_short_message() {
        assert_eq!(split_message("hello", 10), vec!["hello"]);
        assert!(split_message("", 10).is_empty());
    }

    #[test]
    fn test_split_prefers_newlines() {
        let text = "aaaa\nbbbb\ncccc";
        let chunks = split_message(text, 7);
        assert_eq!(chunks, vec!["aaaa", "\nbbbb", "\ncccc"]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_split_without_newlines() {
        let chunks = split_message("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_split_counts_characters() {
        let chunks = split_message("專案報備通知", 4);
        assert_eq!(chunks, vec!["專案報備", "通知"]);
    }
}
