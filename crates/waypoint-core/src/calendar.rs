use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::datetime::parse_due_date;
use crate::task::Task;

/// An all-day calendar entry for a task with a due date.
///
/// `start` and `end` are `None` when the stored due date does not parse;
/// such events are still emitted and keep the raw text in `due_date`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub due_date: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay<'a> {
    /// `None` groups events whose due date could not be parsed.
    pub date: Option<NaiveDate>,
    pub events: Vec<&'a CalendarEvent>,
}

pub fn calendar_events(tasks: &[Task]) -> Vec<CalendarEvent> {
    tasks
        .iter()
        .filter_map(|task| {
            let raw = task.due_date()?;
            let date = parse_due_date(raw);
            Some(CalendarEvent {
                id: task.id.clone(),
                title: task.description.clone(),
                due_date: raw.to_string(),
                start: date,
                end: date,
            })
        })
        .collect()
}

/// Groups events by start date, earliest first, undated events last.
/// Events within a day keep their list order.
pub fn calendar_days(events: &[CalendarEvent]) -> Vec<CalendarDay<'_>> {
    let mut dated: BTreeMap<NaiveDate, Vec<&CalendarEvent>> = BTreeMap::new();
    let mut undated = Vec::new();

    for event in events {
        match event.start {
            Some(date) => dated.entry(date).or_default().push(event),
            None => undated.push(event),
        }
    }

    let mut days: Vec<CalendarDay<'_>> = dated
        .into_iter()
        .map(|(date, events)| CalendarDay {
            date: Some(date),
            events,
        })
        .collect();

    if !undated.is_empty() {
        days.push(CalendarDay {
            date: None,
            events: undated,
        });
    }

    days
}
