use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::time::parse_timestamp;
use super::{EventId, UserId, ValidationError, trimmed};

/// A calendar entry owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub owner: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for `POST /events`. Times accept RFC 3339 or `datetime-local` input.
#[derive(Debug, Clone, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

fn parse_bound(raw: &str, field: &str) -> Result<DateTime<Utc>, ValidationError> {
    parse_timestamp(raw).ok_or_else(|| ValidationError::new(format!("{field} is not a valid date")))
}

fn check_span(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ValidationError> {
    if start > end {
        return Err(ValidationError::new("start must not be after end"));
    }
    Ok(())
}

impl EventDraft {
    pub fn into_event(self, owner: UserId, now: DateTime<Utc>) -> Result<Event, ValidationError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ValidationError::new("title must not be blank"));
        }
        let start = parse_bound(&self.start, "start")?;
        let end = parse_bound(&self.end, "end")?;
        check_span(start, end)?;

        Ok(Event {
            id: EventId::generate(),
            title,
            description: trimmed(self.description),
            start,
            end,
            owner,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Event {
    pub fn apply(&mut self, patch: EventPatch, now: DateTime<Utc>) -> Result<(), ValidationError> {
        let title = match patch.title {
            Some(title) if title.trim().is_empty() => {
                return Err(ValidationError::new("title must not be blank"));
            }
            Some(title) => title.trim().to_string(),
            None => self.title.clone(),
        };
        let start = match patch.start.as_deref() {
            Some(raw) => parse_bound(raw, "start")?,
            None => self.start,
        };
        let end = match patch.end.as_deref() {
            Some(raw) => parse_bound(raw, "end")?,
            None => self.end,
        };
        check_span(start, end)?;

        self.title = title;
        if patch.description.is_some() {
            self.description = trimmed(patch.description);
        }
        self.start = start;
        self.end = end;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(start: &str, end: &str) -> EventDraft {
        EventDraft {
            title: "Site visit".into(),
            description: None,
            start: start.into(),
            end: end.into(),
        }
    }

    #[test]
    fn accepts_datetime_local_values() {
        let event = draft("2024-05-01T10:00", "2024-05-01T11:30")
            .into_event(UserId::from("e1"), Utc::now())
            .unwrap();
        assert!(event.start < event.end);
    }

    #[test]
    fn rejects_inverted_span() {
        let result = draft("2024-05-02T10:00", "2024-05-01T10:00")
            .into_event(UserId::from("e1"), Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn patch_checks_the_combined_span() {
        let mut event = draft("2024-05-01T10:00", "2024-05-01T11:00")
            .into_event(UserId::from("e1"), Utc::now())
            .unwrap();
        let patch = EventPatch {
            start: Some("2024-05-01T12:00".into()),
            ..EventPatch::default()
        };
        assert!(event.apply(patch, Utc::now()).is_err());

        let patch = EventPatch {
            end: Some("2024-05-01T15:00".into()),
            title: Some("Longer visit".into()),
            ..EventPatch::default()
        };
        event.apply(patch, Utc::now()).unwrap();
        assert_eq!(event.title, "Longer visit");
    }
}
