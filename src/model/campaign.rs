use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{CampaignId, ValidationError, trimmed};

/// A paid marketing campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub daily_budget: Option<f64>,
    pub total_budget: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub language: Option<String>,
    pub bidding_strategy: Option<String>,
    pub keywords: Option<String>,
    pub leads: Option<u64>,
    pub spend: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDraft {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub daily_budget: Option<f64>,
    pub total_budget: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub language: Option<String>,
    pub bidding_strategy: Option<String>,
    pub keywords: Option<String>,
    pub leads: Option<u64>,
    pub spend: Option<f64>,
}

impl CampaignDraft {
    pub fn into_campaign(self, now: DateTime<Utc>) -> Result<Campaign, ValidationError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::new("campaign name must not be blank"));
        }

        let campaign = Campaign {
            id: CampaignId::generate(),
            name,
            kind: trimmed(self.kind),
            status: trimmed(self.status),
            daily_budget: self.daily_budget,
            total_budget: self.total_budget,
            start_date: self.start_date,
            end_date: self.end_date,
            location: trimmed(self.location),
            language: trimmed(self.language),
            bidding_strategy: trimmed(self.bidding_strategy),
            keywords: trimmed(self.keywords),
            leads: self.leads,
            spend: self.spend,
            created_at: now,
            updated_at: now,
        };
        campaign.validate()?;
        Ok(campaign)
    }
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignPatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub daily_budget: Option<f64>,
    pub total_budget: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub language: Option<String>,
    pub bidding_strategy: Option<String>,
    pub keywords: Option<String>,
    pub leads: Option<u64>,
    pub spend: Option<f64>,
}

impl Campaign {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("campaign name must not be blank"));
        }
        for (field, value) in [
            ("dailyBudget", self.daily_budget),
            ("totalBudget", self.total_budget),
            ("spend", self.spend),
        ] {
            if let Some(value) = value
                && (!value.is_finite() || value < 0.0)
            {
                return Err(ValidationError::new(format!(
                    "{field} must be a non-negative number"
                )));
            }
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && start > end
        {
            return Err(ValidationError::new("startDate must not be after endDate"));
        }
        Ok(())
    }

    /// Applies `patch` to a copy and validates it before committing the change.
    pub fn apply(
        &mut self,
        patch: CampaignPatch,
        now: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        let mut next = self.clone();
        if let Some(name) = patch.name {
            next.name = name.trim().to_string();
        }
        if patch.kind.is_some() {
            next.kind = trimmed(patch.kind);
        }
        if patch.status.is_some() {
            next.status = trimmed(patch.status);
        }
        if patch.daily_budget.is_some() {
            next.daily_budget = patch.daily_budget;
        }
        if patch.total_budget.is_some() {
            next.total_budget = patch.total_budget;
        }
        if patch.start_date.is_some() {
            next.start_date = patch.start_date;
        }
        if patch.end_date.is_some() {
            next.end_date = patch.end_date;
        }
        if patch.location.is_some() {
            next.location = trimmed(patch.location);
        }
        if patch.language.is_some() {
            next.language = trimmed(patch.language);
        }
        if patch.bidding_strategy.is_some() {
            next.bidding_strategy = trimmed(patch.bidding_strategy);
        }
        if patch.keywords.is_some() {
            next.keywords = trimmed(patch.keywords);
        }
        if patch.leads.is_some() {
            next.leads = patch.leads;
        }
        if patch.spend.is_some() {
            next.spend = patch.spend;
        }
        next.validate()?;
        next.updated_at = now;
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> CampaignDraft {
        CampaignDraft {
            name: "Spring launch".into(),
            daily_budget: Some(50.0),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31),
            ..CampaignDraft::default()
        }
    }

    #[test]
    fn type_field_uses_wire_name() {
        let parsed: CampaignDraft =
            serde_json::from_str(r#"{"name":"Search","type":"google","dailyBudget":10}"#).unwrap();
        assert_eq!(parsed.kind.as_deref(), Some("google"));
        assert_eq!(parsed.daily_budget, Some(10.0));
    }

    #[test]
    fn rejects_blank_name_and_negative_budget() {
        let mut bad = draft();
        bad.name = "   ".into();
        assert!(bad.into_campaign(Utc::now()).is_err());

        let mut bad = draft();
        bad.total_budget = Some(-1.0);
        assert!(bad.into_campaign(Utc::now()).is_err());
    }

    #[test]
    fn rejected_patch_leaves_campaign_untouched() {
        let mut campaign = draft().into_campaign(Utc::now()).unwrap();
        let patch = CampaignPatch {
            name: Some("Renamed".into()),
            end_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            ..CampaignPatch::default()
        };
        assert!(campaign.apply(patch, Utc::now()).is_err());
        assert_eq!(campaign.name, "Spring launch");
    }
}
