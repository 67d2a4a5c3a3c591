use std::str::FromStr;

use serde::Serialize;

use crate::model::{Lead, LeadSource, LeadStatus, Priority};

/// Field the statistics endpoint groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsKind {
    Status,
    Priority,
    Source,
}

impl FromStr for StatsKind {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "status" => Ok(StatsKind::Status),
            "priority" => Ok(StatsKind::Priority),
            "source" => Ok(StatsKind::Source),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatRow {
    #[serde(rename = "_id")]
    pub id: &'static str,
    pub name: &'static str,
    pub count: usize,
}

/// One row per enumerated value, zero counts included, in declaration order.
pub fn tally(kind: StatsKind, leads: &[Lead]) -> Vec<StatRow> {
    match kind {
        StatsKind::Status => count_by(
            LeadStatus::ALL,
            LeadStatus::as_str,
            LeadStatus::label,
            leads.iter().map(|lead| Some(lead.status)),
        ),
        StatsKind::Priority => count_by(
            Priority::ALL,
            Priority::as_str,
            Priority::label,
            leads.iter().map(|lead| lead.priority),
        ),
        StatsKind::Source => count_by(
            LeadSource::ALL,
            LeadSource::as_str,
            LeadSource::label,
            leads.iter().map(|lead| lead.source),
        ),
    }
}

fn count_by<T, I>(
    all: &'static [T],
    tag: fn(T) -> &'static str,
    label: fn(T) -> &'static str,
    values: I,
) -> Vec<StatRow>
where
    T: Copy + PartialEq,
    I: Iterator<Item = Option<T>>,
{
    let mut counts = vec![0usize; all.len()];
    for value in values.flatten() {
        if let Some(slot) = all.iter().position(|candidate| *candidate == value) {
            counts[slot] += 1;
        }
    }
    all.iter()
        .zip(counts)
        .map(|(value, count)| StatRow {
            id: tag(*value),
            name: label(*value),
            count,
        })
        .collect()
}
