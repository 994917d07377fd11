//! Report shapes produced by a reconciliation run, and the thresholds that
//! grade what the run found.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillsync_core::{LocationId, ReconciliationId, TenantId, UserId};

/// Differences at or below one cent are float noise, not variance.
pub const CENT_EPSILON: f64 = 0.01;
/// A per-transaction mismatch above this many currency units is high
/// severity.
pub const HIGH_DIFF_THRESHOLD: f64 = 10.0;
/// An absolute period variance above this many currency units forces
/// [`ReportStatus::MajorDiscrepancy`] on its own.
pub const MAJOR_VARIANCE_THRESHOLD: f64 = 100.0;

/// What kind of mismatch a [`Discrepancy`] describes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    MissingPayment,
    DuplicatePayment,
    AmountMismatch,
    StatusMismatch,
}

impl DiscrepancyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyKind::MissingPayment => "missing_payment",
            DiscrepancyKind::DuplicatePayment => "duplicate_payment",
            DiscrepancyKind::AmountMismatch => "amount_mismatch",
            DiscrepancyKind::StatusMismatch => "status_mismatch",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Grade a per-transaction amount difference.
    pub fn for_amount_difference(diff: f64) -> Self {
        if diff.abs() > HIGH_DIFF_THRESHOLD {
            Severity::High
        } else {
            Severity::Medium
        }
    }
}

/// One specific mismatch found while pairing transactions with payments.
///
/// Which of the optional fields are set depends on the kind: a missing
/// payment knows the transaction and what was expected, an orphaned payment
/// knows the payment and what arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_amount: Option<f64>,
    pub description: String,
    pub severity: Severity,
}

/// Overall verdict for a reconciled period.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Balanced,
    VarianceDetected,
    MajorDiscrepancy,
}

impl ReportStatus {
    /// Classify from the finished aggregates.
    ///
    /// Any high-severity discrepancy or a variance beyond
    /// [`MAJOR_VARIANCE_THRESHOLD`] makes the period major. Anything else
    /// that is visibly off, a variance above [`CENT_EPSILON`] or any
    /// remaining discrepancy, is flagged. The rest is clean.
    pub fn derive(variance: f64, discrepancies: &[Discrepancy]) -> Self {
        let has_high = discrepancies.iter().any(|d| d.severity == Severity::High);
        if has_high || variance.abs() > MAJOR_VARIANCE_THRESHOLD {
            ReportStatus::MajorDiscrepancy
        } else if variance.abs() > CENT_EPSILON || !discrepancies.is_empty() {
            ReportStatus::VarianceDetected
        } else {
            ReportStatus::Balanced
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Balanced => "balanced",
            ReportStatus::VarianceDetected => "variance_detected",
            ReportStatus::MajorDiscrepancy => "major_discrepancy",
        }
    }
}

impl core::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-payment-method rollup of settled money movement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodSummary {
    pub count: u32,
    pub total: f64,
    pub average: f64,
    pub refund_count: u32,
    pub refund_amount: f64,
}

impl MethodSummary {
    /// Fold one settled payment in. Positive amounts are sales; zero or
    /// negative amounts count as refunds, stored as a positive magnitude.
    pub fn record_payment(&mut self, amount: f64) {
        if amount > 0.0 {
            self.count += 1;
            self.total += amount;
            self.average = self.total / f64::from(self.count);
        } else {
            self.refund_count += 1;
            self.refund_amount += amount.abs();
        }
    }
}

/// Tuning for one reconciliation run.
///
/// Defaults compare settled activity only: voided and refunded transactions
/// stay out, and every method and location is considered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationOptions {
    pub include_voided: bool,
    pub include_refunded: bool,
    /// Restrict both sides to these payment methods when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_methods: Option<Vec<String>>,
    /// Restrict transactions to these locations when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_ids: Option<Vec<LocationId>>,
}

impl ReconciliationOptions {
    pub fn with_voided(mut self, include: bool) -> Self {
        self.include_voided = include;
        self
    }

    pub fn with_refunded(mut self, include: bool) -> Self {
        self.include_refunded = include;
        self
    }

    pub fn with_payment_methods(mut self, methods: Vec<String>) -> Self {
        self.payment_methods = Some(methods);
        self
    }

    pub fn with_locations(mut self, locations: Vec<LocationId>) -> Self {
        self.location_ids = Some(locations);
        self
    }
}

/// Finished comparison of recorded transactions against captured payments
/// for one tenant and period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub id: ReconciliationId,
    pub tenant_id: TenantId,
    /// Location filter the run was scoped to, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_ids: Option<Vec<LocationId>>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Transactions that survived the option filters.
    pub transaction_count: usize,
    /// Sum of completed transaction totals.
    pub expected_amount: f64,
    /// Sum of settled payment amounts.
    pub actual_amount: f64,
    /// `actual - expected`; negative means money is missing.
    pub variance: f64,
    /// Variance as a percentage of expected, zero when nothing was expected.
    pub variance_percentage: f64,
    pub method_summaries: BTreeMap<String, MethodSummary>,
    pub discrepancies: Vec<Discrepancy>,
    pub status: ReportStatus,
    pub generated_at: DateTime<Utc>,
    pub generated_by: UserId,
    pub is_approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_notes: Option<String>,
}

/// Rollup over every stored report whose period overlaps a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub report_count: usize,
    pub balanced: usize,
    pub variance_detected: usize,
    pub major_discrepancy: usize,
    pub average_variance: f64,
}
