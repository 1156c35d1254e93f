use chrono::{
  DateTime,
  NaiveDate
};

/// Parses a stored due date. Accepts
/// `YYYY-MM-DD` as written by a date
/// picker, and RFC 3339 timestamps,
/// which are reduced to their UTC date.
#[must_use]
pub fn parse_due_date(
  raw: &str
) -> Option<NaiveDate> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return None;
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      trimmed, "%Y-%m-%d"
    )
  {
    return Some(date);
  }

  DateTime::parse_from_rfc3339(trimmed)
    .ok()
    .map(|dt| {
      dt.naive_utc().date()
    })
}

#[must_use]
pub fn format_due_date(
  date: NaiveDate
) -> String {
  date.format("%Y-%m-%d").to_string()
}
