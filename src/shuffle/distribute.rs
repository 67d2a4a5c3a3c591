use serde::Serialize;

use crate::model::{LeadId, UserId};

/// Number of leads one employee slot receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeCount {
    pub employee: UserId,
    pub count: usize,
}

/// Round-robin mapping of shuffled leads onto an ordered employee list.
///
/// The lead at shuffled index `i` goes to `employees[i % employees.len()]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionPlan {
    employees: Vec<UserId>,
    assignments: Vec<(LeadId, usize)>,
}

impl DistributionPlan {
    /// `None` when there is nobody to distribute to.
    pub fn round_robin<I>(leads: I, employees: &[UserId]) -> Option<Self>
    where
        I: IntoIterator<Item = LeadId>,
    {
        if employees.is_empty() {
            return None;
        }
        let assignments = leads
            .into_iter()
            .enumerate()
            .map(|(index, lead)| (lead, index % employees.len()))
            .collect();
        Some(Self {
            employees: employees.to_vec(),
            assignments,
        })
    }

    pub fn lead_count(&self) -> usize {
        self.assignments.len()
    }

    /// `(lead, employee slot)` pairs in shuffled order.
    pub fn slots(&self) -> impl Iterator<Item = (&LeadId, usize)> {
        self.assignments.iter().map(|(lead, slot)| (lead, *slot))
    }

    pub fn employee_at(&self, slot: usize) -> &UserId {
        &self.employees[slot]
    }

    /// Counts that round-robin yields for `total` leads without building a plan:
    /// `total / n + 1` for the first `total % n` employees, `total / n` after.
    pub fn projected_counts(total: usize, employees: &[UserId]) -> Vec<EmployeeCount> {
        let n = employees.len();
        if n == 0 {
            return Vec::new();
        }
        let base = total / n;
        let extra = total % n;
        employees
            .iter()
            .enumerate()
            .map(|(slot, employee)| EmployeeCount {
                employee: employee.clone(),
                count: base + usize::from(slot < extra),
            })
            .collect()
    }
}
