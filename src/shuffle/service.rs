use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::distribute::{DistributionPlan, EmployeeCount};
use super::permute::shuffled;
use super::window::{Clock, Period, PeriodKind};
use crate::leads::{PopulatedLead, populate, populate_one};
use crate::model::{Lead, LeadId, LeadStatus, Role, UserId, ValidationError};
use crate::repository::{Assignment, LeadQuery, LeadRepository, RepoError, UserRepository};

#[derive(Debug, Error)]
pub enum ShuffleError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Repository(#[from] RepoError),
}

impl From<ValidationError> for ShuffleError {
    fn from(err: ValidationError) -> Self {
        ShuffleError::InvalidRequest(err.0)
    }
}

pub type ShuffleResult<T> = Result<T, ShuffleError>;

/// Selection fields shared by the preview and commit bodies.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShuffleFilter {
    #[serde(default)]
    pub period: PeriodKind,
    pub starting_date: Option<String>,
    pub ending_date: Option<String>,
    pub status: Option<Vec<LeadStatus>>,
    #[serde(default, deserialize_with = "optional_limit")]
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLimit {
    Number(i64),
    Text(String),
}

/// Form clients send `limit` as a number, a numeric string or `""`.
/// Blank and `null` both mean no limit.
fn optional_limit<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawLimit>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawLimit::Number(limit)) => Ok(Some(limit)),
        Some(RawLimit::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse::<i64>().map(Some).map_err(|_| {
                D::Error::custom(format!("limit must be a number, got \"{text}\""))
            })
        }
    }
}

impl ShuffleFilter {
    pub fn validate(self) -> Result<Selection, ValidationError> {
        let period = Period::from_wire(
            self.period,
            self.starting_date.as_deref(),
            self.ending_date.as_deref(),
        )?;
        let limit = match self.limit {
            None => None,
            Some(limit) if limit > 0 => Some(usize::try_from(limit).unwrap_or(usize::MAX)),
            Some(_) => return Err(ValidationError::new("limit must be a positive integer")),
        };
        Ok(Selection {
            period,
            statuses: self.status.unwrap_or_default(),
            limit,
        })
    }
}

/// A validated candidate filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub period: Period,
    pub statuses: Vec<LeadStatus>,
    pub limit: Option<usize>,
}

impl Selection {
    pub fn query(&self, clock: &dyn Clock) -> LeadQuery {
        let window = self.period.resolve(clock.today());
        LeadQuery {
            statuses: self.statuses.clone(),
            created_from: Some(window.start),
            created_to: Some(window.end),
            limit: self.limit,
            ..LeadQuery::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTarget {
    Keyword(String),
    Ids(Vec<UserId>),
}

/// Who receives leads on commit: every employee, or an explicit ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmployeeTarget {
    All,
    Explicit(Vec<UserId>),
}

impl<'de> Deserialize<'de> for EmployeeTarget {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawTarget::deserialize(deserializer)? {
            RawTarget::Keyword(word) if word == "all" => Ok(EmployeeTarget::All),
            RawTarget::Keyword(word) => Err(D::Error::custom(format!(
                "employees must be \"all\" or a list of ids, got \"{word}\""
            ))),
            RawTarget::Ids(ids) => Ok(EmployeeTarget::Explicit(ids)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkShuffleRequest {
    pub employees: EmployeeTarget,
    #[serde(flatten)]
    pub filter: ShuffleFilter,
    pub set_as_primary: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub assign_to: Option<UserId>,
    pub set_as_primary: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct Preview {
    pub leads: Vec<PopulatedLead>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShuffleOutcome {
    pub total_leads: usize,
    pub employees: usize,
    /// Leads actually written per employee slot, in list order.
    pub assignments: Vec<EmployeeCount>,
}

/// Filter, shuffle and round-robin distribution of leads.
pub struct ShuffleService {
    leads: Arc<dyn LeadRepository>,
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl ShuffleService {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        users: Arc<dyn UserRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            leads,
            users,
            clock,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    async fn shuffle<T>(&self, items: Vec<T>) -> Vec<T> {
        let mut rng = self.rng.lock().await;
        shuffled(items, &mut *rng)
    }

    /// Non-archived leads inside the selection, oldest first, truncated to the limit.
    pub async fn candidates(&self, selection: &Selection) -> ShuffleResult<Vec<Lead>> {
        let query = selection.query(self.clock.as_ref());
        Ok(self.leads.list(&query).await?)
    }

    /// Shuffled candidates with no writes.
    pub async fn preview(&self, filter: ShuffleFilter) -> ShuffleResult<Preview> {
        let selection = filter.validate()?;
        let candidates = self.candidates(&selection).await?;
        let leads = self.shuffle(candidates).await;
        let total = leads.len();
        debug!(total, period = ?selection.period, "shuffle preview");
        Ok(Preview {
            leads: populate(self.users.as_ref(), leads).await?,
            total,
        })
    }

    pub async fn resolve_employees(&self, target: &EmployeeTarget) -> ShuffleResult<Vec<UserId>> {
        let employees = match target {
            EmployeeTarget::All => self
                .users
                .list(Some(Role::Employee))
                .await?
                .into_iter()
                .map(|user| user.id)
                .collect(),
            EmployeeTarget::Explicit(ids) => ids.clone(),
        };
        if employees.is_empty() {
            return Err(ShuffleError::InvalidRequest("No employees found".into()));
        }
        Ok(employees)
    }

    /// Shuffles the candidates and makes each one's allocation exactly one
    /// employee, round-robin. Writes are independent; a failure keeps earlier writes.
    pub async fn commit(&self, request: BulkShuffleRequest) -> ShuffleResult<ShuffleOutcome> {
        let selection = request.filter.validate()?;
        if request.set_as_primary == Some(false) {
            debug!("setAsPrimary=false ignored, bulk shuffle always assigns a single primary");
        }
        let employees = self.resolve_employees(&request.employees).await?;

        let candidates = self.candidates(&selection).await?;
        let order = self
            .shuffle(candidates.into_iter().map(|lead| lead.id).collect())
            .await;
        let Some(plan) = DistributionPlan::round_robin(order, &employees) else {
            return Err(ShuffleError::InvalidRequest("No employees found".into()));
        };

        let now = self.clock.now();
        let mut written = vec![0usize; employees.len()];
        for (lead_id, slot) in plan.slots() {
            let employee = plan.employee_at(slot).clone();
            let updated = self
                .leads
                .assign(lead_id, Assignment::Primary(employee), now)
                .await
                .inspect_err(|err| {
                    error!(
                        lead_id = %lead_id,
                        written = written.iter().sum::<usize>(),
                        error = %err,
                        "bulk shuffle stopped partway"
                    );
                })?;
            match updated {
                Some(_) => written[slot] += 1,
                None => warn!(lead_id = %lead_id, "lead disappeared before reassignment, skipped"),
            }
        }

        let projected = DistributionPlan::projected_counts(plan.lead_count(), &employees);
        let skipped: usize = projected
            .iter()
            .zip(&written)
            .map(|(planned, done)| planned.count.saturating_sub(*done))
            .sum();
        if skipped > 0 {
            warn!(skipped, "bulk shuffle wrote fewer leads than planned");
        }

        let assignments: Vec<EmployeeCount> = employees
            .iter()
            .zip(written)
            .map(|(employee, count)| EmployeeCount {
                employee: employee.clone(),
                count,
            })
            .collect();
        info!(
            total_leads = plan.lead_count(),
            employees = employees.len(),
            "bulk shuffle committed"
        );
        Ok(ShuffleOutcome {
            total_leads: plan.lead_count(),
            employees: employees.len(),
            assignments,
        })
    }

    /// Assigns one lead. Primary replaces the allocation, otherwise the employee is added.
    pub async fn assign(
        &self,
        lead_id: &LeadId,
        request: AssignRequest,
    ) -> ShuffleResult<PopulatedLead> {
        let assign_to = request
            .assign_to
            .filter(|id| !id.as_str().trim().is_empty())
            .ok_or_else(|| {
                ShuffleError::InvalidRequest("assignTo (employee id) is required".into())
            })?;
        let assignment = if request.set_as_primary.unwrap_or(false) {
            Assignment::Primary(assign_to)
        } else {
            Assignment::Shared(assign_to)
        };
        let updated = self
            .leads
            .assign(lead_id, assignment, self.clock.now())
            .await?
            .ok_or_else(|| ShuffleError::NotFound("Lead not found".into()))?;
        Ok(populate_one(self.users.as_ref(), updated).await?)
    }

    /// Every stored lead in a fresh random order.
    pub async fn shuffled_leads(&self) -> ShuffleResult<Vec<PopulatedLead>> {
        let all = self
            .leads
            .list(&LeadQuery {
                include_archived: true,
                ..LeadQuery::default()
            })
            .await?;
        let leads = self.shuffle(all).await;
        Ok(populate(self.users.as_ref(), leads).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::model::{LeadDraft, LeadPatch, User};
    use crate::repository::{RepoResult, StoreRepository};
    use crate::shuffle::FixedClock;
    use crate::storage::StoreError;

    fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    struct Fixture {
        repo: StoreRepository,
        service: ShuffleService,
    }

    fn fixture(today: DateTime<Utc>) -> Fixture {
        let repo = StoreRepository::in_memory();
        let service = ShuffleService::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(FixedClock(today)),
        )
        .with_rng(StdRng::seed_from_u64(11));
        Fixture { repo, service }
    }

    async fn seed_lead(
        repo: &StoreRepository,
        status: LeadStatus,
        owner: &str,
        created_at: DateTime<Utc>,
    ) -> Lead {
        let draft = LeadDraft {
            status: Some(status),
            ..LeadDraft::default()
        };
        LeadRepository::create(repo, Lead::new(&draft, Some(UserId::from(owner)), created_at))
            .await
            .unwrap()
    }

    async fn seed_user(repo: &StoreRepository, id: &str, role: Role) {
        let user = User {
            id: UserId::from(id),
            username: format!("user-{id}"),
            first_name: None,
            last_name: None,
            phone: None,
            role,
            password_hash: String::new(),
            created_at: Utc::now(),
        };
        UserRepository::create(repo, user).await.unwrap();
    }

    async fn allocations(repo: &StoreRepository) -> HashMap<LeadId, Vec<UserId>> {
        LeadRepository::list(
            repo,
            &LeadQuery {
                include_archived: true,
                ..LeadQuery::default()
            },
        )
        .await
        .unwrap()
        .into_iter()
        .map(|lead| (lead.id, lead.allocated_to))
        .collect()
    }

    fn bulk(employees: EmployeeTarget, filter: ShuffleFilter) -> BulkShuffleRequest {
        BulkShuffleRequest {
            employees,
            filter,
            set_as_primary: None,
        }
    }

    fn explicit(ids: &[&str]) -> EmployeeTarget {
        EmployeeTarget::Explicit(ids.iter().map(|id| UserId::from(*id)).collect())
    }

    #[tokio::test]
    async fn preview_leaves_allocations_alone() {
        let today = noon(2024, 5, 10);
        let fx = fixture(today);
        for _ in 0..6 {
            seed_lead(&fx.repo, LeadStatus::New, "owner", today).await;
        }
        let before = allocations(&fx.repo).await;

        let first = fx.service.preview(ShuffleFilter::default()).await.unwrap();
        let second = fx.service.preview(ShuffleFilter::default()).await.unwrap();

        assert_eq!(first.total, 6);
        assert_eq!(second.total, 6);
        assert_eq!(allocations(&fx.repo).await, before);
    }

    #[tokio::test]
    async fn all_with_no_employees_fails_without_writes() {
        let today = noon(2024, 5, 10);
        let fx = fixture(today);
        seed_user(&fx.repo, "m1", Role::Manager).await;
        for _ in 0..3 {
            seed_lead(&fx.repo, LeadStatus::New, "owner", today).await;
        }
        let before = allocations(&fx.repo).await;

        let err = fx
            .service
            .commit(bulk(EmployeeTarget::All, ShuffleFilter::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ShuffleError::InvalidRequest(ref m) if m == "No employees found"));
        assert_eq!(allocations(&fx.repo).await, before);

        let err = fx
            .service
            .commit(bulk(explicit(&[]), ShuffleFilter::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ShuffleError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn archived_leads_are_never_candidates() {
        let today = noon(2024, 5, 10);
        let fx = fixture(today);
        let kept = seed_lead(&fx.repo, LeadStatus::New, "owner", today).await;
        let archived = seed_lead(&fx.repo, LeadStatus::New, "owner", today).await;
        LeadRepository::archive(&fx.repo, &archived.id, today)
            .await
            .unwrap();

        let filter = ShuffleFilter {
            status: Some(vec![LeadStatus::New]),
            ..ShuffleFilter::default()
        };
        let preview = fx.service.preview(filter.clone()).await.unwrap();
        assert_eq!(preview.total, 1);
        assert_eq!(preview.leads[0].id, kept.id);

        let outcome = fx
            .service
            .commit(bulk(explicit(&["e1"]), filter))
            .await
            .unwrap();
        assert_eq!(outcome.total_leads, 1);
        let stored = allocations(&fx.repo).await;
        assert_eq!(stored[&archived.id], vec![UserId::from("owner")]);
        assert_eq!(stored[&kept.id], vec![UserId::from("e1")]);
    }

    #[tokio::test]
    async fn ten_leads_split_four_three_three() {
        let today = noon(2024, 5, 10);
        let fx = fixture(today);
        for _ in 0..10 {
            seed_lead(&fx.repo, LeadStatus::New, "owner", today).await;
        }

        let outcome = fx
            .service
            .commit(bulk(explicit(&["e1", "e2", "e3"]), ShuffleFilter::default()))
            .await
            .unwrap();
        assert_eq!(outcome.total_leads, 10);
        assert_eq!(outcome.employees, 3);

        let mut per_employee: HashMap<UserId, usize> = HashMap::new();
        for allocated in allocations(&fx.repo).await.into_values() {
            assert_eq!(allocated.len(), 1);
            *per_employee.entry(allocated[0].clone()).or_default() += 1;
        }
        let mut counts: Vec<usize> = per_employee.values().copied().collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![3, 3, 4]);

        let reported: Vec<usize> = outcome.assignments.iter().map(|a| a.count).collect();
        let staff = [UserId::from("e1"), UserId::from("e2"), UserId::from("e3")];
        let projected: Vec<usize> = DistributionPlan::projected_counts(10, &staff)
            .into_iter()
            .map(|c| c.count)
            .collect();
        assert_eq!(reported, projected);
        for row in &outcome.assignments {
            assert_eq!(per_employee[&row.employee], row.count);
        }
    }

    #[tokio::test]
    async fn all_resolves_employees_in_id_order() {
        let fx = fixture(noon(2024, 5, 10));
        seed_user(&fx.repo, "e2", Role::Employee).await;
        seed_user(&fx.repo, "m1", Role::Manager).await;
        seed_user(&fx.repo, "e1", Role::Employee).await;

        let resolved = fx
            .service
            .resolve_employees(&EmployeeTarget::All)
            .await
            .unwrap();
        assert_eq!(resolved, vec![UserId::from("e1"), UserId::from("e2")]);

        let verbatim = fx
            .service
            .resolve_employees(&explicit(&["z", "a"]))
            .await
            .unwrap();
        assert_eq!(verbatim, vec![UserId::from("z"), UserId::from("a")]);
    }

    #[tokio::test]
    async fn january_range_selects_inclusive_bounds() {
        let fx = fixture(noon(2024, 6, 1));
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let last =
            Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap() + Duration::milliseconds(999);

        let inside_a = seed_lead(&fx.repo, LeadStatus::New, "o", first).await;
        let inside_b = seed_lead(&fx.repo, LeadStatus::New, "o", last).await;
        seed_lead(&fx.repo, LeadStatus::New, "o", first - Duration::milliseconds(1)).await;
        seed_lead(&fx.repo, LeadStatus::New, "o", last + Duration::milliseconds(1)).await;

        let selection = ShuffleFilter {
            period: PeriodKind::Range,
            starting_date: Some("2024-01-01".into()),
            ending_date: Some("2024-01-31".into()),
            ..ShuffleFilter::default()
        }
        .validate()
        .unwrap();
        let candidates = fx.service.candidates(&selection).await.unwrap();
        let ids: Vec<LeadId> = candidates.into_iter().map(|lead| lead.id).collect();
        assert_eq!(ids, vec![inside_a.id, inside_b.id]);
    }

    #[tokio::test]
    async fn limit_truncates_oldest_first() {
        let today = noon(2024, 5, 10);
        let fx = fixture(today);
        let oldest = seed_lead(&fx.repo, LeadStatus::New, "o", today - Duration::hours(3)).await;
        let middle = seed_lead(&fx.repo, LeadStatus::New, "o", today - Duration::hours(2)).await;
        seed_lead(&fx.repo, LeadStatus::New, "o", today - Duration::hours(1)).await;

        let filter = ShuffleFilter {
            limit: Some(2),
            ..ShuffleFilter::default()
        };
        let preview = fx.service.preview(filter).await.unwrap();
        let mut ids: Vec<LeadId> = preview.leads.into_iter().map(|lead| lead.id).collect();
        ids.sort();
        let mut expected = vec![oldest.id, middle.id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[test]
    fn non_positive_limit_is_rejected() {
        for limit in [0, -3] {
            let filter = ShuffleFilter {
                limit: Some(limit),
                ..ShuffleFilter::default()
            };
            assert!(filter.validate().is_err());
        }
    }

    #[tokio::test]
    async fn status_filter_restricts_commit() {
        let today = noon(2024, 5, 10);
        let fx = fixture(today);
        let wanted = seed_lead(&fx.repo, LeadStatus::NotInterested, "o", today).await;
        let other = seed_lead(&fx.repo, LeadStatus::New, "o", today).await;

        let filter = ShuffleFilter {
            status: Some(vec![LeadStatus::NotInterested]),
            ..ShuffleFilter::default()
        };
        fx.service
            .commit(bulk(explicit(&["e9"]), filter))
            .await
            .unwrap();
        let stored = allocations(&fx.repo).await;
        assert_eq!(stored[&wanted.id], vec![UserId::from("e9")]);
        assert_eq!(stored[&other.id], vec![UserId::from("o")]);
    }

    #[tokio::test]
    async fn single_assignment_modes() {
        let today = noon(2024, 5, 10);
        let fx = fixture(today);
        let lead = seed_lead(&fx.repo, LeadStatus::New, "e1", today).await;

        let shared = fx
            .service
            .assign(
                &lead.id,
                AssignRequest {
                    assign_to: Some(UserId::from("e2")),
                    set_as_primary: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(shared.id, lead.id);
        let stored = allocations(&fx.repo).await;
        assert_eq!(stored[&lead.id], vec![UserId::from("e1"), UserId::from("e2")]);

        fx.service
            .assign(
                &lead.id,
                AssignRequest {
                    assign_to: Some(UserId::from("e3")),
                    set_as_primary: Some(true),
                },
            )
            .await
            .unwrap();
        assert_eq!(allocations(&fx.repo).await[&lead.id], vec![UserId::from("e3")]);

        let missing = fx
            .service
            .assign(&lead.id, AssignRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(missing, ShuffleError::InvalidRequest(_)));

        let unknown = fx
            .service
            .assign(
                &LeadId::from("nope"),
                AssignRequest {
                    assign_to: Some(UserId::from("e3")),
                    set_as_primary: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(unknown, ShuffleError::NotFound(_)));
    }

    #[test]
    fn employee_target_wire_forms() {
        let all: EmployeeTarget = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(all, EmployeeTarget::All);
        let list: EmployeeTarget = serde_json::from_str(r#"["b","a"]"#).unwrap();
        assert_eq!(list, explicit(&["b", "a"]));
        assert!(serde_json::from_str::<EmployeeTarget>("\"everyone\"").is_err());

        let request: BulkShuffleRequest = serde_json::from_value(serde_json::json!({
            "employees": "all",
            "period": "range",
            "startingDate": "2024-01-01",
            "endingDate": "2024-01-31",
            "status": ["new"],
            "limit": 5,
            "setAsPrimary": false,
        }))
        .unwrap();
        assert_eq!(request.filter.period, PeriodKind::Range);
        assert_eq!(request.filter.limit, Some(5));
        assert_eq!(request.set_as_primary, Some(false));
    }

    #[test]
    fn limit_accepts_form_encoded_values() {
        let parse = |limit: serde_json::Value| {
            serde_json::from_value::<BulkShuffleRequest>(serde_json::json!({
                "employees": "all",
                "limit": limit,
            }))
            .map(|request| request.filter.limit)
        };
        assert_eq!(parse(serde_json::json!(3)).unwrap(), Some(3));
        assert_eq!(parse(serde_json::json!("2")).unwrap(), Some(2));
        assert_eq!(parse(serde_json::json!(" 7 ")).unwrap(), Some(7));
        assert_eq!(parse(serde_json::json!("")).unwrap(), None);
        assert_eq!(parse(serde_json::Value::Null).unwrap(), None);
        assert!(parse(serde_json::json!("lots")).is_err());

        let absent: ShuffleFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.limit, None);

        let negative: ShuffleFilter = serde_json::from_str(r#"{"limit":"-1"}"#).unwrap();
        assert!(negative.validate().is_err());
    }

    /// Delegates to the store but fails every assignment after the first `allow`.
    struct FlakyLeads {
        inner: StoreRepository,
        allow: usize,
        seen: AtomicUsize,
    }

    #[async_trait]
    impl LeadRepository for FlakyLeads {
        async fn create(&self, lead: Lead) -> RepoResult<Lead> {
            LeadRepository::create(&self.inner, lead).await
        }
        async fn get(&self, id: &LeadId) -> RepoResult<Option<Lead>> {
            LeadRepository::get(&self.inner, id).await
        }
        async fn list(&self, query: &LeadQuery) -> RepoResult<Vec<Lead>> {
            LeadRepository::list(&self.inner, query).await
        }
        async fn update(
            &self,
            id: &LeadId,
            patch: LeadPatch,
            now: DateTime<Utc>,
        ) -> RepoResult<Option<Lead>> {
            LeadRepository::update(&self.inner, id, patch, now).await
        }
        async fn assign(
            &self,
            id: &LeadId,
            assignment: Assignment,
            now: DateTime<Utc>,
        ) -> RepoResult<Option<Lead>> {
            if self.seen.fetch_add(1, Ordering::SeqCst) >= self.allow {
                return Err(StoreError::Io(std::io::Error::other("disk full")).into());
            }
            LeadRepository::assign(&self.inner, id, assignment, now).await
        }
        async fn archive(&self, id: &LeadId, now: DateTime<Utc>) -> RepoResult<Option<Lead>> {
            LeadRepository::archive(&self.inner, id, now).await
        }
        async fn delete(&self, id: &LeadId) -> RepoResult<Option<Lead>> {
            LeadRepository::delete(&self.inner, id).await
        }
        async fn delete_all(&self) -> RepoResult<usize> {
            LeadRepository::delete_all(&self.inner).await
        }
    }

    #[tokio::test]
    async fn failure_partway_keeps_earlier_writes() {
        let today = noon(2024, 5, 10);
        let repo = StoreRepository::in_memory();
        for _ in 0..5 {
            seed_lead(&repo, LeadStatus::New, "owner", today).await;
        }
        let flaky = Arc::new(FlakyLeads {
            inner: repo.clone(),
            allow: 2,
            seen: AtomicUsize::new(0),
        });
        let clock = Arc::new(FixedClock(today));
        let service = ShuffleService::new(flaky, Arc::new(repo.clone()), clock)
            .with_rng(StdRng::seed_from_u64(3));

        let err = service
            .commit(bulk(explicit(&["e1"]), ShuffleFilter::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ShuffleError::Repository(_)));

        let reassigned = allocations(&repo)
            .await
            .into_values()
            .filter(|allocated| allocated == &vec![UserId::from("e1")])
            .count();
        assert_eq!(reassigned, 2);
    }
}
