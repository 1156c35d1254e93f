use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::trace;

use crate::task::{Status, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    #[default]
    All,
    Pending,
    Completed,
}

impl Filter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Pending => task.status == Status::Pending,
            Filter::Completed => task.status == Status::Completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Pending => "pending",
            Filter::Completed => "completed",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Filter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "pending" => Ok(Filter::Pending),
            "completed" => Ok(Filter::Completed),
            other => Err(anyhow!(
                "invalid filter: {other} (expected all, pending or completed)"
            )),
        }
    }
}

/// Tasks matching `filter`, in list order.
pub fn filtered_list(tasks: &[Task], filter: Filter) -> Vec<&Task> {
    let out: Vec<&Task> = tasks.iter().filter(|t| filter.matches(t)).collect();
    trace!(filter = %filter, total = tasks.len(), matched = out.len(), "filtered tasks");
    out
}
