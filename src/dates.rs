//! Date parsing and formatting helpers shared by the CLI and the board.

use chrono::{Datelike, Duration, NaiveDate};

/// Parse human-readable due date input.
///
/// Supports:
/// - "today", "tomorrow"
/// - bare weekday names ("monday", "fri")
/// - "in 3d", "in 2w"
/// - "YYYY-MM-DD" format
pub fn parse_due_input(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return Some(today + Duration::days(1)),
        _ => {}
    }

    // "in X" patterns
    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(nd) = rest.strip_suffix('d') {
            if let Ok(days) = nd.trim().parse::<i64>() {
                return Some(today + Duration::days(days));
            }
        }
        if let Some(nw) = rest.strip_suffix('w') {
            if let Ok(weeks) = nw.trim().parse::<i64>() {
                return Some(today + Duration::weeks(weeks));
            }
        }
    }

    // Weekday patterns: the next occurrence of the named day, today included.
    let weekdays = [
        ("monday", 0),
        ("tuesday", 1),
        ("wednesday", 2),
        ("thursday", 3),
        ("friday", 4),
        ("saturday", 5),
        ("sunday", 6),
        ("mon", 0),
        ("tue", 1),
        ("wed", 2),
        ("thu", 3),
        ("fri", 4),
        ("sat", 5),
        ("sun", 6),
    ];
    for (day_name, target_day) in weekdays {
        if s == day_name {
            let current_day = today.weekday().num_days_from_monday() as i32;
            let days_ahead = (target_day + 7 - current_day) % 7;
            return Some(today + Duration::days(days_ahead as i64));
        }
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Calculate the start and end dates of the current ISO week (Monday to Sunday).
pub fn start_end_of_this_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    // ISO week: Monday start.
    let weekday = today.weekday().num_days_from_monday() as i64;
    let start = today - Duration::days(weekday);
    let end = start + Duration::days(6);
    (start, end)
}

/// Format a due date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: Option<NaiveDate>, today: NaiveDate) -> String {
    match due {
        None => "-".into(),
        Some(d) => {
            let delta = (d - today).num_days();
            if delta == 0 {
                "today".into()
            } else if delta == 1 {
                "tomorrow".into()
            } else if delta > 1 {
                format!("in {}d", delta)
            } else {
                format!("{}d late", -delta)
            }
        }
    }
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}
