// 🧮 Payee Aggregator - Source rows → reportable payees
//
// Pure fold over an already-fetched snapshot, no I/O:
//   1. keep paid rows of the right kind, paid inside the tax year
//   2. group by recipient PROFILE (a mid-year move yields two payees)
//   3. apply the form's residency / confirmation / threshold rules
//   4. sum totals, take the MAX withholding rate seen
//   5. order by profile id so reruns are byte-identical

use crate::db::{SourceTransaction, TransactionKind};
use crate::entities::{Company, RecipientProfile};
use crate::error::{FilingError, FilingResult};
use chrono::Datelike;
use std::collections::BTreeMap;

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Everything one filing reads, captured at a single point in time
#[derive(Debug, Clone)]
pub struct FilingSnapshot {
    pub company: Company,
    profiles: BTreeMap<i64, RecipientProfile>,
    pub transactions: Vec<SourceTransaction>,
}

impl FilingSnapshot {
    pub fn new(
        company: Company,
        profiles: Vec<RecipientProfile>,
        transactions: Vec<SourceTransaction>,
    ) -> Self {
        FilingSnapshot {
            company,
            profiles: profiles.into_iter().map(|p| (p.id, p)).collect(),
            transactions,
        }
    }

    pub fn profile(&self, id: i64) -> Option<&RecipientProfile> {
        self.profiles.get(&id)
    }

    pub fn profiles(&self) -> impl Iterator<Item = &RecipientProfile> {
        self.profiles.values()
    }
}

// ============================================================================
// ELIGIBILITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Residency {
    /// Resident of the filing country
    Domestic(String),
    /// Resident anywhere else
    Foreign(String),
}

impl Residency {
    pub fn admits(&self, profile: &RecipientProfile) -> bool {
        match self {
            Residency::Domestic(country) => profile.is_resident_of(country),
            Residency::Foreign(country) => !profile.is_resident_of(country),
        }
    }
}

/// Form-specific filter applied after grouping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityCriteria {
    pub kind: TransactionKind,
    pub residency: Residency,
    /// Yearly gross at or above this (cents) is reportable
    pub minimum_gross_cents: i64,
}

// ============================================================================
// PAYEE AGGREGATE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PayeeAggregate {
    pub profile: RecipientProfile,
    pub gross_total_cents: i64,
    pub net_total_cents: i64,
    pub withheld_total_cents: i64,
    /// Highest rate seen across the group, not the average
    pub max_withholding_percentage: f64,
    pub transaction_count: usize,
}

impl PayeeAggregate {
    pub fn profile_id(&self) -> i64 {
        self.profile.id
    }
}

/// File-level totals, in the same units the payee records render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlTotals {
    pub payee_count: usize,
    pub gross_total: i64,
    pub withheld_total: i64,
}

impl ControlTotals {
    /// Sum per-payee amounts AFTER unit conversion so the control record
    /// reconciles with what each payee record actually shows.
    pub fn from_payees(payees: &[PayeeAggregate], to_units: fn(i64) -> i64) -> Self {
        ControlTotals {
            payee_count: payees.len(),
            gross_total: payees.iter().map(|p| to_units(p.gross_total_cents)).sum(),
            withheld_total: payees.iter().map(|p| to_units(p.withheld_total_cents)).sum(),
        }
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct PayeeAggregator<'a> {
    snapshot: &'a FilingSnapshot,
}

impl<'a> PayeeAggregator<'a> {
    pub fn new(snapshot: &'a FilingSnapshot) -> Self {
        PayeeAggregator { snapshot }
    }

    /// Eligible payees for `tax_year`, ascending by profile id.
    ///
    /// An empty result means "nothing to file", not an error.
    pub fn aggregate(
        &self,
        criteria: &EligibilityCriteria,
        tax_year: i32,
    ) -> FilingResult<Vec<PayeeAggregate>> {
        let groups = self.group_by_profile(criteria.kind, tax_year);

        let mut payees = Vec::with_capacity(groups.len());
        for (profile_id, transactions) in groups {
            let profile = self
                .snapshot
                .profile(profile_id)
                .ok_or_else(|| FilingError::missing("payee", "recipient_profile"))?;

            let payee = summarize(profile, &transactions);

            if !self.is_eligible(criteria, &payee) {
                continue;
            }

            payees.push(payee);
        }

        tracing::debug!(
            company_id = self.snapshot.company.id,
            tax_year,
            kind = criteria.kind.as_str(),
            payees = payees.len(),
            "aggregated payees"
        );

        Ok(payees)
    }

    /// Steps 1-2: year/status/kind filter, then group by profile identity
    fn group_by_profile(
        &self,
        kind: TransactionKind,
        tax_year: i32,
    ) -> BTreeMap<i64, Vec<&'a SourceTransaction>> {
        let snapshot: &'a FilingSnapshot = self.snapshot;
        let mut groups: BTreeMap<i64, Vec<&'a SourceTransaction>> = BTreeMap::new();

        for tx in &snapshot.transactions {
            if tx.company_id != snapshot.company.id || tx.kind != kind || !tx.is_paid() {
                continue;
            }

            let paid_in_year = tx.paid_at.map(|at| at.year() == tax_year).unwrap_or(false);
            if !paid_in_year {
                continue;
            }

            groups.entry(tx.recipient_profile_id).or_default().push(tx);
        }

        groups
    }

    fn is_eligible(&self, criteria: &EligibilityCriteria, payee: &PayeeAggregate) -> bool {
        let profile = &payee.profile;

        if !criteria.residency.admits(profile) {
            tracing::debug!(profile_id = profile.id, "excluded: residency");
            return false;
        }

        if !profile.tax_info_confirmed {
            tracing::debug!(profile_id = profile.id, "excluded: tax information not confirmed");
            return false;
        }

        if payee.gross_total_cents < criteria.minimum_gross_cents {
            tracing::debug!(
                profile_id = profile.id,
                gross_total_cents = payee.gross_total_cents,
                minimum = criteria.minimum_gross_cents,
                "excluded: below reporting threshold"
            );
            return false;
        }

        true
    }
}

fn summarize(profile: &RecipientProfile, transactions: &[&SourceTransaction]) -> PayeeAggregate {
    PayeeAggregate {
        profile: profile.clone(),
        gross_total_cents: transactions.iter().map(|tx| tx.gross_amount_cents).sum(),
        net_total_cents: transactions.iter().map(|tx| tx.net_amount_cents).sum(),
        withheld_total_cents: transactions.iter().map(|tx| tx.withheld_amount_cents).sum(),
        max_withholding_percentage: transactions
            .iter()
            .map(|tx| tx.withholding_percentage)
            .fold(0.0, f64::max),
        transaction_count: transactions.len(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TransactionStatus;
    use crate::entities::Address;
    use chrono::{TimeZone, Utc};

    fn company() -> Company {
        Company {
            id: 1,
            legal_name: "Acme Corp".to_string(),
            tax_id: "123456789".to_string(),
            address: Address::default(),
            phone: "5550100".to_string(),
            email: "tax@acme.test".to_string(),
        }
    }

    fn profile(id: i64, country: &str, confirmed: bool) -> RecipientProfile {
        RecipientProfile {
            id,
            recipient_id: "usr_1".to_string(),
            legal_name: "Jane Doe".to_string(),
            business_name: None,
            is_business: false,
            tax_id: Some("123456789".to_string()),
            tax_info_confirmed: confirmed,
            address: Address::default(),
            date_of_birth: None,
            residency_country_code: country.to_string(),
        }
    }

    fn paid(id: i64, profile_id: i64, gross: i64, year: i32) -> SourceTransaction {
        SourceTransaction {
            id,
            company_id: 1,
            recipient_profile_id: profile_id,
            kind: TransactionKind::Dividend,
            status: TransactionStatus::Paid,
            gross_amount_cents: gross,
            net_amount_cents: gross * 7 / 10,
            withheld_amount_cents: gross * 3 / 10,
            withholding_percentage: 30.0,
            currency: "USD".to_string(),
            paid_at: Some(Utc.with_ymd_and_hms(year, 6, 15, 0, 0, 0).unwrap()),
            created_at: Utc.with_ymd_and_hms(year, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    fn foreign_criteria() -> EligibilityCriteria {
        EligibilityCriteria {
            kind: TransactionKind::Dividend,
            residency: Residency::Foreign("US".to_string()),
            minimum_gross_cents: 1_000,
        }
    }

    #[test]
    fn test_groups_and_sums_per_profile() {
        let snapshot = FilingSnapshot::new(
            company(),
            vec![profile(2, "DE", true), profile(1, "FR", true)],
            vec![paid(1, 2, 5_000, 2024), paid(2, 1, 2_000, 2024), paid(3, 2, 5_000, 2024)],
        );

        let payees = PayeeAggregator::new(&snapshot)
            .aggregate(&foreign_criteria(), 2024)
            .unwrap();

        assert_eq!(payees.len(), 2);
        // Ascending profile id regardless of insertion order
        assert_eq!(payees[0].profile_id(), 1);
        assert_eq!(payees[1].profile_id(), 2);
        assert_eq!(payees[1].gross_total_cents, 10_000);
        assert_eq!(payees[1].withheld_total_cents, 3_000);
        assert_eq!(payees[1].transaction_count, 2);
    }

    #[test]
    fn test_max_not_average_withholding_rate() {
        let mut low = paid(1, 1, 5_000, 2024);
        low.withholding_percentage = 15.0;
        let high = paid(2, 1, 5_000, 2024);

        let snapshot = FilingSnapshot::new(company(), vec![profile(1, "DE", true)], vec![low, high]);
        let payees = PayeeAggregator::new(&snapshot)
            .aggregate(&foreign_criteria(), 2024)
            .unwrap();

        assert_eq!(payees[0].max_withholding_percentage, 30.0);
    }

    #[test]
    fn test_unpaid_and_other_years_excluded() {
        let mut pending = paid(1, 1, 50_000, 2024);
        pending.status = TransactionStatus::Pending;
        let mut failed = paid(2, 1, 50_000, 2024);
        failed.status = TransactionStatus::Failed;
        // Created inside the year, paid after it
        let mut paid_next_year = paid(3, 1, 50_000, 2025);
        paid_next_year.created_at = Utc.with_ymd_and_hms(2024, 12, 20, 0, 0, 0).unwrap();

        let snapshot = FilingSnapshot::new(
            company(),
            vec![profile(1, "DE", true)],
            vec![pending, failed, paid(4, 1, 50_000, 2023), paid_next_year, paid(5, 1, 1_500, 2024)],
        );

        let payees = PayeeAggregator::new(&snapshot)
            .aggregate(&foreign_criteria(), 2024)
            .unwrap();

        assert_eq!(payees.len(), 1);
        assert_eq!(payees[0].gross_total_cents, 1_500);
        assert_eq!(payees[0].transaction_count, 1);
    }

    #[test]
    fn test_residency_and_confirmation_filters() {
        let snapshot = FilingSnapshot::new(
            company(),
            vec![profile(1, "US", true), profile(2, "DE", false), profile(3, "DE", true)],
            vec![paid(1, 1, 5_000, 2024), paid(2, 2, 5_000, 2024), paid(3, 3, 5_000, 2024)],
        );

        let payees = PayeeAggregator::new(&snapshot)
            .aggregate(&foreign_criteria(), 2024)
            .unwrap();

        let ids: Vec<i64> = payees.iter().map(|p| p.profile_id()).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn test_threshold_boundary() {
        let snapshot = FilingSnapshot::new(
            company(),
            vec![profile(1, "DE", true), profile(2, "DE", true)],
            vec![paid(1, 1, 999, 2024), paid(2, 2, 1_000, 2024)],
        );

        let payees = PayeeAggregator::new(&snapshot)
            .aggregate(&foreign_criteria(), 2024)
            .unwrap();

        assert_eq!(payees.len(), 1);
        assert_eq!(payees[0].profile_id(), 2);
    }

    #[test]
    fn test_empty_when_nothing_qualifies() {
        let snapshot = FilingSnapshot::new(company(), vec![], vec![]);
        let payees = PayeeAggregator::new(&snapshot)
            .aggregate(&foreign_criteria(), 2024)
            .unwrap();

        assert!(payees.is_empty());
    }

    #[test]
    fn test_control_totals_sum_rendered_units() {
        let snapshot = FilingSnapshot::new(
            company(),
            vec![profile(1, "DE", true), profile(2, "DE", true)],
            vec![paid(1, 1, 1_050, 2024), paid(2, 2, 1_050, 2024)],
        );
        let payees = PayeeAggregator::new(&snapshot)
            .aggregate(&foreign_criteria(), 2024)
            .unwrap();

        let totals = ControlTotals::from_payees(&payees, crate::codec::money_to_whole_units);

        // 10.50 rounds to 11 per payee; the total is 22, not round(21.00)
        assert_eq!(totals.payee_count, 2);
        assert_eq!(totals.gross_total, 22);
    }
}
