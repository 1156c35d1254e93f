use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::calendar::{CalendarDay, CalendarEvent, calendar_days};
use crate::config::Config;
use crate::datetime::format_due_date;
use crate::map::MapView;
use crate::task::{Priority, Status, Task};

pub const EMPTY_LIST_MESSAGE: &str = "No tasks";

/// Text for one task card in the list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCard {
    pub id: String,
    pub description: String,
    pub struck_through: bool,
    pub meta: String,
    pub toggle_label: &'static str,
}

impl TaskCard {
    pub fn from_task(task: &Task) -> Self {
        let mut meta = task.priority.as_str().to_ascii_uppercase();
        if let Some(due) = task.due_date() {
            meta.push_str(&format!(" | Due {due}"));
        }
        if let Some(location) = task.location() {
            meta.push_str(&format!(" | {location}"));
        }

        Self {
            id: task.id.clone(),
            description: task.description.clone(),
            struck_through: task.is_completed(),
            meta,
            toggle_label: match task.status {
                Status::Pending => "Mark Done",
                Status::Completed => "Mark Pending",
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self { color: cfg.color()? })
    }

    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn print_task_cards(&mut self, tasks: &[&Task]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_task_cards(&mut out, tasks)
    }

    pub fn write_task_cards<W: Write>(&self, mut out: W, tasks: &[&Task]) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "{EMPTY_LIST_MESSAGE}")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Description".to_string(),
            "Details".to_string(),
            "Action".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let card = TaskCard::from_task(task);
            let description = if !card.struck_through {
                card.description.clone()
            } else if self.ansi_enabled() {
                self.paint(&card.description, "9")
            } else {
                format!("~~{}~~", card.description)
            };
            let meta = match task.priority {
                Priority::High => self.paint(&card.meta, "31"),
                Priority::Medium => self.paint(&card.meta, "33"),
                Priority::Low => card.meta.clone(),
            };

            rows.push(vec![
                self.paint(&card.id, "33"),
                description,
                meta,
                card.toggle_label.to_string(),
            ]);
        }

        write_table(&mut out, headers, rows)
    }

    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    pub fn print_calendar(&mut self, events: &[CalendarEvent]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_calendar(&mut out, &calendar_days(events))
    }

    pub fn write_calendar<W: Write>(&self, mut out: W, days: &[CalendarDay<'_>]) -> anyhow::Result<()> {
        if days.is_empty() {
            writeln!(out, "No scheduled tasks")?;
            return Ok(());
        }

        for day in days {
            let heading = match day.date {
                Some(date) => format_due_date(date),
                None => "Unparsed dates".to_string(),
            };
            writeln!(out, "{}", self.paint(&heading, "1"))?;
            for event in &day.events {
                if day.date.is_some() {
                    writeln!(out, "  {}  {}", event.id, event.title)?;
                } else {
                    writeln!(out, "  {}  {} ({})", event.id, event.title, event.due_date)?;
                }
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, view), fields(markers = view.markers.len()))]
    pub fn print_map(&mut self, view: &MapView) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_map(&mut out, view)
    }

    pub fn write_map<W: Write>(&self, mut out: W, view: &MapView) -> anyhow::Result<()> {
        writeln!(
            out,
            "center {:.4},{:.4}  zoom {}",
            view.center.lat, view.center.lng, view.zoom
        )?;
        writeln!(out)?;

        let headers = vec![
            "ID".to_string(),
            "Lat".to_string(),
            "Lng".to_string(),
            "Description".to_string(),
            "Due".to_string(),
        ];
        let rows = view
            .markers
            .iter()
            .map(|marker| {
                vec![
                    self.paint(&marker.id, "33"),
                    marker.position.lat.to_string(),
                    marker.position.lng.to_string(),
                    marker.title.clone(),
                    marker.subtitle.clone(),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)
    }

    fn ansi_enabled(&self) -> bool {
        self.color && io::stdout().is_terminal()
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.ansi_enabled() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
