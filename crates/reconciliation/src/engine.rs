//! The reconciliation engine: fetch, filter, pair, grade, persist.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info};

use tillsync_core::{Clock, ReconciliationId, SystemClock, TenantId, UserId};
use tillsync_storage::{JsonStoreExt, KvStore, keys};

use crate::error::ReconciliationError;
use crate::record::{
    PaymentRecord, PaymentRepository, PeriodQuery, TransactionRecord, TransactionRepository,
    TransactionStatus,
};
use crate::report::{
    CENT_EPSILON, Discrepancy, DiscrepancyKind, MethodSummary, ReconciliationOptions,
    ReconciliationReport, ReconciliationSummary, ReportStatus, Severity,
};

/// Compares recorded transactions against captured payments and turns the
/// outcome into stored [`ReconciliationReport`]s.
pub struct ReconciliationEngine<S, T, P> {
    store: S,
    transactions: T,
    payments: P,
    clock: Arc<dyn Clock>,
}

impl<S, T, P> ReconciliationEngine<S, T, P>
where
    S: KvStore,
    T: TransactionRepository,
    P: PaymentRepository,
{
    pub fn new(store: S, transactions: T, payments: P) -> Self {
        Self::with_clock(store, transactions, payments, Arc::new(SystemClock))
    }

    pub fn with_clock(store: S, transactions: T, payments: P, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            transactions,
            payments,
            clock,
        }
    }

    /// Reconcile one tenant's books over `[start_date, end_date)`.
    ///
    /// Completed transaction totals set the expectation, settled payments
    /// set the reality, and everything that does not pair up cleanly is
    /// itemized. The finished report is stored before it is returned, so a
    /// successful run is always retrievable later.
    pub fn perform_reconciliation(
        &self,
        tenant_id: TenantId,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        options: &ReconciliationOptions,
        generated_by: UserId,
    ) -> Result<ReconciliationReport, ReconciliationError> {
        if end_date < start_date {
            return Err(ReconciliationError::InvalidPeriod(format!(
                "end {end_date} precedes start {start_date}"
            )));
        }

        let query = PeriodQuery {
            start: start_date,
            end: end_date,
        };
        let transactions = self.transactions.find_by_tenant(tenant_id, &query)?.items;
        let payments = self.payments.find_by_tenant(tenant_id, &query)?.items;
        debug!(
            tenant_id = %tenant_id,
            transactions = transactions.len(),
            payments = payments.len(),
            "reconciliation inputs fetched"
        );

        let filtered_transactions: Vec<&TransactionRecord> = transactions
            .iter()
            .filter(|t| {
                match t.status {
                    TransactionStatus::Voided if !options.include_voided => return false,
                    TransactionStatus::Refunded if !options.include_refunded => return false,
                    _ => {}
                }
                if let Some(methods) = &options.payment_methods {
                    if !methods.contains(&t.payment_method) {
                        return false;
                    }
                }
                if let Some(locations) = &options.location_ids {
                    if !locations.contains(&t.location_id) {
                        return false;
                    }
                }
                true
            })
            .collect();

        let filtered_payments: Vec<&PaymentRecord> = payments
            .iter()
            .filter(|p| {
                if !p.status.is_settled() {
                    return false;
                }
                match &options.payment_methods {
                    Some(methods) => methods.contains(&p.method),
                    None => true,
                }
            })
            .collect();

        let mut method_summaries: BTreeMap<String, MethodSummary> = BTreeMap::new();
        for payment in &filtered_payments {
            method_summaries
                .entry(payment.method.clone())
                .or_default()
                .record_payment(payment.amount);
        }

        let expected_amount: f64 = filtered_transactions
            .iter()
            .filter(|t| t.status == TransactionStatus::Completed)
            .map(|t| t.total)
            .sum();
        let actual_amount: f64 = filtered_payments.iter().map(|p| p.amount).sum();
        let variance = actual_amount - expected_amount;
        let variance_percentage = if expected_amount > 0.0 {
            variance / expected_amount * 100.0
        } else {
            0.0
        };

        let discrepancies =
            detect_discrepancies(&transactions, &filtered_transactions, &filtered_payments);
        let status = ReportStatus::derive(variance, &discrepancies);

        let report = ReconciliationReport {
            id: ReconciliationId::new(),
            tenant_id,
            location_ids: options.location_ids.clone(),
            start_date,
            end_date,
            transaction_count: filtered_transactions.len(),
            expected_amount,
            actual_amount,
            variance,
            variance_percentage,
            method_summaries,
            discrepancies,
            status,
            generated_at: self.clock.now(),
            generated_by,
            is_approved: false,
            approved_by: None,
            approved_at: None,
            approval_notes: None,
        };

        self.store
            .set_json(&keys::report(tenant_id, report.id), &report, None)?;

        info!(
            tenant_id = %tenant_id,
            reconciliation_id = %report.id,
            status = %report.status,
            variance = report.variance,
            discrepancies = report.discrepancies.len(),
            "reconciliation report generated"
        );
        Ok(report)
    }

    /// Reconcile one calendar day, midnight to midnight UTC.
    pub fn run_daily_reconciliation(
        &self,
        tenant_id: TenantId,
        day: NaiveDate,
        options: &ReconciliationOptions,
        generated_by: UserId,
    ) -> Result<ReconciliationReport, ReconciliationError> {
        let next = day.succ_opt().ok_or_else(|| {
            ReconciliationError::InvalidPeriod(format!("no calendar day after {day}"))
        })?;
        let start = day.and_time(NaiveTime::MIN).and_utc();
        let end = next.and_time(NaiveTime::MIN).and_utc();
        self.perform_reconciliation(tenant_id, start, end, options, generated_by)
    }

    /// Sign off on a stored report.
    ///
    /// Approving twice is allowed; the newest approval replaces the previous
    /// one wholesale, notes included.
    pub fn approve_reconciliation(
        &self,
        tenant_id: TenantId,
        reconciliation_id: ReconciliationId,
        approved_by: UserId,
        notes: Option<String>,
    ) -> Result<ReconciliationReport, ReconciliationError> {
        let key = keys::report(tenant_id, reconciliation_id);
        let mut report: ReconciliationReport = self
            .store
            .get_json(&key)?
            .ok_or(ReconciliationError::ReportNotFound(reconciliation_id))?;

        report.is_approved = true;
        report.approved_by = Some(approved_by);
        report.approved_at = Some(self.clock.now());
        report.approval_notes = notes;
        self.store.set_json(&key, &report, None)?;

        info!(
            tenant_id = %tenant_id,
            reconciliation_id = %reconciliation_id,
            approved_by = %approved_by,
            "reconciliation report approved"
        );
        Ok(report)
    }

    /// A stored report by id. `None` when it does not exist.
    pub fn get_report(
        &self,
        tenant_id: TenantId,
        reconciliation_id: ReconciliationId,
    ) -> Result<Option<ReconciliationReport>, ReconciliationError> {
        let key = keys::report(tenant_id, reconciliation_id);
        Ok(self.store.get_json(&key)?)
    }

    /// Every stored report for the tenant, newest first.
    pub fn list_reports(
        &self,
        tenant_id: TenantId,
    ) -> Result<Vec<ReconciliationReport>, ReconciliationError> {
        let report_keys = self.store.scan_prefix(&keys::report_prefix(tenant_id))?;

        let mut reports = Vec::with_capacity(report_keys.len());
        for key in report_keys {
            if let Some(report) = self.store.get_json::<ReconciliationReport>(&key)? {
                reports.push(report);
            }
        }
        reports.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(reports)
    }

    /// Roll up every stored report whose period overlaps `[start, end)`.
    pub fn get_reconciliation_summary(
        &self,
        tenant_id: TenantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ReconciliationSummary, ReconciliationError> {
        let mut summary = ReconciliationSummary::default();
        let mut variance_sum = 0.0;

        for report in self.list_reports(tenant_id)? {
            if report.start_date >= end || report.end_date <= start {
                continue;
            }
            summary.report_count += 1;
            variance_sum += report.variance;
            match report.status {
                ReportStatus::Balanced => summary.balanced += 1,
                ReportStatus::VarianceDetected => summary.variance_detected += 1,
                ReportStatus::MajorDiscrepancy => summary.major_discrepancy += 1,
            }
        }

        if summary.report_count > 0 {
            summary.average_variance = variance_sum / summary.report_count as f64;
        }
        Ok(summary)
    }
}

/// Pair completed transactions with their settled payments and flag what
/// does not line up.
///
/// Orphan detection runs against every fetched transaction, not just the
/// filtered ones, so a payment attached to a voided transaction is not
/// reported as pointing nowhere.
fn detect_discrepancies(
    all_transactions: &[TransactionRecord],
    filtered_transactions: &[&TransactionRecord],
    filtered_payments: &[&PaymentRecord],
) -> Vec<Discrepancy> {
    let mut discrepancies = Vec::new();

    let mut paid_by_transaction: HashMap<&str, f64> = HashMap::new();
    for payment in filtered_payments {
        *paid_by_transaction
            .entry(payment.transaction_id.as_str())
            .or_insert(0.0) += payment.amount;
    }

    for transaction in filtered_transactions
        .iter()
        .filter(|t| t.status == TransactionStatus::Completed)
    {
        match paid_by_transaction.get(transaction.id.as_str()) {
            None => discrepancies.push(Discrepancy {
                kind: DiscrepancyKind::MissingPayment,
                transaction_id: Some(transaction.id.clone()),
                payment_id: None,
                expected_amount: Some(transaction.total),
                actual_amount: None,
                description: format!(
                    "no settled payment for completed transaction {}",
                    transaction.id
                ),
                severity: Severity::High,
            }),
            Some(&paid) => {
                let diff = paid - transaction.total;
                if diff.abs() > CENT_EPSILON {
                    discrepancies.push(Discrepancy {
                        kind: DiscrepancyKind::AmountMismatch,
                        transaction_id: Some(transaction.id.clone()),
                        payment_id: None,
                        expected_amount: Some(transaction.total),
                        actual_amount: Some(paid),
                        description: format!(
                            "payments for transaction {} total {:.2}, expected {:.2}",
                            transaction.id, paid, transaction.total
                        ),
                        severity: Severity::for_amount_difference(diff),
                    });
                }
            }
        }
    }

    let known_transactions: HashSet<&str> =
        all_transactions.iter().map(|t| t.id.as_str()).collect();
    for payment in filtered_payments {
        if !known_transactions.contains(payment.transaction_id.as_str()) {
            discrepancies.push(Discrepancy {
                kind: DiscrepancyKind::MissingPayment,
                transaction_id: Some(payment.transaction_id.clone()),
                payment_id: Some(payment.id.clone()),
                expected_amount: None,
                actual_amount: Some(payment.amount),
                description: format!(
                    "payment {} references unknown transaction {}",
                    payment.id, payment.transaction_id
                ),
                severity: Severity::Medium,
            });
        }
    }

    discrepancies
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use tillsync_core::{LocationId, ManualClock};
    use tillsync_storage::InMemoryKvStore;

    use crate::record::{
        InMemoryPaymentRepository, InMemoryTransactionRepository, Page, PaymentStatus,
        RepositoryError,
    };

    use super::*;

    struct Fixture {
        engine: ReconciliationEngine<
            Arc<InMemoryKvStore>,
            Arc<InMemoryTransactionRepository>,
            Arc<InMemoryPaymentRepository>,
        >,
        transactions: Arc<InMemoryTransactionRepository>,
        payments: Arc<InMemoryPaymentRepository>,
        clock: Arc<ManualClock>,
        tenant: TenantId,
        location: LocationId,
        user: UserId,
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 0, 0, 0).unwrap()
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(day(2) + Duration::hours(9)));
        let store = Arc::new(InMemoryKvStore::with_clock(clock.clone()));
        let transactions = Arc::new(InMemoryTransactionRepository::new());
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let engine = ReconciliationEngine::with_clock(
            store,
            transactions.clone(),
            payments.clone(),
            clock.clone() as Arc<dyn Clock>,
        );

        Fixture {
            engine,
            transactions,
            payments,
            clock,
            tenant: TenantId::new(),
            location: LocationId::new(),
            user: UserId::new(),
        }
    }

    impl Fixture {
        fn add_txn(&self, id: &str, total: f64, method: &str, status: TransactionStatus) {
            self.add_txn_at(id, total, method, status, day(1) + Duration::hours(12));
        }

        fn add_txn_at(
            &self,
            id: &str,
            total: f64,
            method: &str,
            status: TransactionStatus,
            at: DateTime<Utc>,
        ) {
            self.transactions.insert(TransactionRecord {
                id: id.to_string(),
                tenant_id: self.tenant,
                location_id: self.location,
                total,
                payment_method: method.to_string(),
                status,
                occurred_at: at,
            });
        }

        fn add_payment(&self, id: &str, transaction_id: &str, amount: f64, method: &str) {
            self.add_payment_at(id, transaction_id, amount, method, day(1) + Duration::hours(12));
        }

        fn add_payment_at(
            &self,
            id: &str,
            transaction_id: &str,
            amount: f64,
            method: &str,
            at: DateTime<Utc>,
        ) {
            self.payments.insert(PaymentRecord {
                id: id.to_string(),
                tenant_id: self.tenant,
                transaction_id: transaction_id.to_string(),
                amount,
                method: method.to_string(),
                status: PaymentStatus::Captured,
                occurred_at: at,
            });
        }

        fn reconcile(&self) -> ReconciliationReport {
            self.reconcile_with(&ReconciliationOptions::default())
        }

        fn reconcile_with(&self, options: &ReconciliationOptions) -> ReconciliationReport {
            self.engine
                .perform_reconciliation(self.tenant, day(1), day(2), options, self.user)
                .unwrap()
        }
    }

    #[test]
    fn matching_books_produce_a_balanced_report() {
        let fx = fixture();
        fx.add_txn("txn-1", 30.0, "card", TransactionStatus::Completed);
        fx.add_txn("txn-2", 45.5, "cash", TransactionStatus::Completed);
        fx.add_payment("pay-1", "txn-1", 30.0, "card");
        fx.add_payment("pay-2", "txn-2", 45.5, "cash");

        let report = fx.reconcile();

        assert_eq!(report.status, ReportStatus::Balanced);
        assert_eq!(report.transaction_count, 2);
        assert_eq!(report.expected_amount, 75.5);
        assert_eq!(report.actual_amount, 75.5);
        assert_eq!(report.variance, 0.0);
        assert_eq!(report.variance_percentage, 0.0);
        assert!(report.discrepancies.is_empty());
        assert!(!report.is_approved);
        assert_eq!(report.generated_by, fx.user);
        assert_eq!(report.generated_at, fx.clock.now());

        let card = &report.method_summaries["card"];
        assert_eq!(card.count, 1);
        assert_eq!(card.total, 30.0);
        assert_eq!(card.average, 30.0);
        assert_eq!(card.refund_count, 0);
    }

    #[test]
    fn an_empty_period_reconciles_clean() {
        let fx = fixture();

        let report = fx.reconcile();

        assert_eq!(report.status, ReportStatus::Balanced);
        assert_eq!(report.transaction_count, 0);
        assert_eq!(report.expected_amount, 0.0);
        assert_eq!(report.actual_amount, 0.0);
        assert_eq!(report.variance_percentage, 0.0);
        assert!(report.method_summaries.is_empty());
        assert!(report.discrepancies.is_empty());
    }

    #[test]
    fn unsettled_payments_do_not_count() {
        let fx = fixture();
        fx.add_txn("txn-1", 50.0, "card", TransactionStatus::Completed);
        fx.payments.insert(PaymentRecord {
            id: "pay-1".to_string(),
            tenant_id: fx.tenant,
            transaction_id: "txn-1".to_string(),
            amount: 50.0,
            method: "card".to_string(),
            status: PaymentStatus::Pending,
            occurred_at: day(1) + Duration::hours(12),
        });

        let report = fx.reconcile();

        assert_eq!(report.actual_amount, 0.0);
        assert_eq!(report.discrepancies.len(), 1);
        assert_eq!(report.discrepancies[0].kind, DiscrepancyKind::MissingPayment);
    }

    #[test]
    fn missing_payment_is_flagged_high() {
        let fx = fixture();
        fx.add_txn("txn-1", 50.0, "card", TransactionStatus::Completed);

        let report = fx.reconcile();

        assert_eq!(report.discrepancies.len(), 1);
        let d = &report.discrepancies[0];
        assert_eq!(d.kind, DiscrepancyKind::MissingPayment);
        assert_eq!(d.severity, Severity::High);
        assert_eq!(d.transaction_id.as_deref(), Some("txn-1"));
        assert_eq!(d.expected_amount, Some(50.0));
        assert_eq!(d.actual_amount, None);

        assert_eq!(report.status, ReportStatus::MajorDiscrepancy);
        assert_eq!(report.variance, -50.0);
        assert_eq!(report.variance_percentage, -100.0);
    }

    #[test]
    fn short_payments_grade_by_the_size_of_the_difference() {
        let fx = fixture();
        fx.add_txn("txn-1", 100.0, "card", TransactionStatus::Completed);
        fx.add_payment("pay-1", "txn-1", 80.0, "card");

        let report = fx.reconcile();
        assert_eq!(report.discrepancies.len(), 1);
        let d = &report.discrepancies[0];
        assert_eq!(d.kind, DiscrepancyKind::AmountMismatch);
        assert_eq!(d.expected_amount, Some(100.0));
        assert_eq!(d.actual_amount, Some(80.0));
        assert_eq!(d.severity, Severity::High, "twenty off is past the high threshold");
        assert_eq!(report.status, ReportStatus::MajorDiscrepancy);

        let fx = fixture();
        fx.add_txn("txn-1", 50.0, "card", TransactionStatus::Completed);
        fx.add_payment("pay-1", "txn-1", 45.0, "card");

        let report = fx.reconcile();
        assert_eq!(report.discrepancies.len(), 1);
        assert_eq!(report.discrepancies[0].severity, Severity::Medium);
        assert_eq!(report.status, ReportStatus::VarianceDetected);
    }

    #[test]
    fn split_payments_sum_before_comparison() {
        let fx = fixture();
        fx.add_txn("txn-1", 100.0, "card", TransactionStatus::Completed);
        fx.add_payment("pay-1", "txn-1", 60.0, "card");
        fx.add_payment("pay-2", "txn-1", 40.0, "card");

        let report = fx.reconcile();

        assert!(report.discrepancies.is_empty());
        assert_eq!(report.status, ReportStatus::Balanced);
    }

    #[test]
    fn orphaned_payments_flag_the_unknown_transaction() {
        let fx = fixture();
        fx.add_payment("pay-9", "ghost", 25.0, "card");

        let report = fx.reconcile();

        assert_eq!(report.discrepancies.len(), 1);
        let d = &report.discrepancies[0];
        assert_eq!(d.kind, DiscrepancyKind::MissingPayment);
        assert_eq!(d.severity, Severity::Medium);
        assert_eq!(d.payment_id.as_deref(), Some("pay-9"));
        assert_eq!(d.transaction_id.as_deref(), Some("ghost"));
        assert_eq!(d.actual_amount, Some(25.0));

        // Nothing was expected, so the percentage stays defined at zero.
        assert_eq!(report.expected_amount, 0.0);
        assert_eq!(report.variance, 25.0);
        assert_eq!(report.variance_percentage, 0.0);
        assert_eq!(report.status, ReportStatus::VarianceDetected);
    }

    #[test]
    fn payments_for_excluded_transactions_are_not_orphans() {
        let fx = fixture();
        fx.add_txn("txn-1", 20.0, "card", TransactionStatus::Voided);
        fx.add_payment("pay-1", "txn-1", 20.0, "card");

        let report = fx.reconcile();

        // The voided transaction is filtered out, but its payment still
        // points at a known record.
        assert!(report.discrepancies.is_empty());
        assert_eq!(report.transaction_count, 0);
        assert_eq!(report.actual_amount, 20.0);
        assert_eq!(report.status, ReportStatus::VarianceDetected);
    }

    #[test]
    fn voided_and_refunded_transactions_stay_out_by_default() {
        let fx = fixture();
        fx.add_txn("txn-1", 50.0, "card", TransactionStatus::Completed);
        fx.add_txn("txn-2", 20.0, "card", TransactionStatus::Voided);
        fx.add_txn("txn-3", 15.0, "card", TransactionStatus::Refunded);
        fx.add_payment("pay-1", "txn-1", 50.0, "card");

        let report = fx.reconcile();
        assert_eq!(report.transaction_count, 1);
        assert_eq!(report.expected_amount, 50.0);
        assert_eq!(report.status, ReportStatus::Balanced);

        let opened = fx.reconcile_with(
            &ReconciliationOptions::default()
                .with_voided(true)
                .with_refunded(true),
        );
        assert_eq!(opened.transaction_count, 3);
        // Only completed transactions feed the expected total either way.
        assert_eq!(opened.expected_amount, 50.0);
    }

    #[test]
    fn payment_method_filter_restricts_both_sides() {
        let fx = fixture();
        fx.add_txn("txn-1", 30.0, "card", TransactionStatus::Completed);
        fx.add_payment("pay-1", "txn-1", 30.0, "card");
        fx.add_txn("txn-2", 20.0, "cash", TransactionStatus::Completed);
        fx.add_payment("pay-2", "txn-2", 20.0, "cash");

        let report = fx.reconcile_with(
            &ReconciliationOptions::default().with_payment_methods(vec!["card".to_string()]),
        );

        assert_eq!(report.transaction_count, 1);
        assert_eq!(report.expected_amount, 30.0);
        assert_eq!(report.actual_amount, 30.0);
        assert_eq!(report.status, ReportStatus::Balanced);
        assert!(report.method_summaries.contains_key("card"));
        assert!(!report.method_summaries.contains_key("cash"));
    }

    #[test]
    fn location_filter_scopes_the_run() {
        let fx = fixture();
        let other_location = LocationId::new();
        fx.add_txn("txn-1", 30.0, "card", TransactionStatus::Completed);
        fx.add_payment("pay-1", "txn-1", 30.0, "card");
        // A second site with unpaid books that should stay out of scope.
        fx.transactions.insert(TransactionRecord {
            id: "txn-2".to_string(),
            tenant_id: fx.tenant,
            location_id: other_location,
            total: 20.0,
            payment_method: "card".to_string(),
            status: TransactionStatus::Completed,
            occurred_at: day(1) + Duration::hours(12),
        });

        let scoped =
            fx.reconcile_with(&ReconciliationOptions::default().with_locations(vec![fx.location]));
        assert_eq!(scoped.transaction_count, 1);
        assert_eq!(scoped.status, ReportStatus::Balanced);
        assert_eq!(scoped.location_ids, Some(vec![fx.location]));

        let unscoped = fx.reconcile();
        assert_eq!(unscoped.transaction_count, 2);
        assert_eq!(unscoped.status, ReportStatus::MajorDiscrepancy, "txn-2 has no payment");
    }

    #[test]
    fn reports_are_persisted_and_retrievable() {
        let fx = fixture();
        fx.add_txn("txn-1", 30.0, "card", TransactionStatus::Completed);
        fx.add_payment("pay-1", "txn-1", 30.0, "card");

        let report = fx.reconcile();

        let fetched = fx.engine.get_report(fx.tenant, report.id).unwrap();
        assert_eq!(fetched, Some(report));
        assert_eq!(
            fx.engine.get_report(fx.tenant, ReconciliationId::new()).unwrap(),
            None
        );
    }

    #[test]
    fn list_reports_returns_newest_first() {
        let fx = fixture();
        let first = fx.reconcile();
        fx.clock.advance(Duration::minutes(5));
        let second = fx.reconcile();
        fx.clock.advance(Duration::minutes(5));
        let third = fx.reconcile();

        let ids: Vec<_> = fx
            .engine
            .list_reports(fx.tenant)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[test]
    fn approval_is_idempotent_and_the_last_write_wins() {
        let fx = fixture();
        let report = fx.reconcile();

        let first_approver = UserId::new();
        let approved = fx
            .engine
            .approve_reconciliation(
                fx.tenant,
                report.id,
                first_approver,
                Some("till counted".to_string()),
            )
            .unwrap();
        assert!(approved.is_approved);
        assert_eq!(approved.approved_by, Some(first_approver));
        assert_eq!(approved.approved_at, Some(fx.clock.now()));
        assert_eq!(approved.approval_notes.as_deref(), Some("till counted"));

        fx.clock.advance(Duration::minutes(10));
        let second_approver = UserId::new();
        let reapproved = fx
            .engine
            .approve_reconciliation(fx.tenant, report.id, second_approver, None)
            .unwrap();
        assert!(reapproved.is_approved);
        assert_eq!(reapproved.approved_by, Some(second_approver));
        assert_eq!(reapproved.approved_at, Some(fx.clock.now()));
        assert_eq!(reapproved.approval_notes, None);

        let stored = fx.engine.get_report(fx.tenant, report.id).unwrap().unwrap();
        assert_eq!(stored, reapproved);
    }

    #[test]
    fn approving_an_unknown_report_fails() {
        let fx = fixture();

        let err = fx
            .engine
            .approve_reconciliation(fx.tenant, ReconciliationId::new(), fx.user, None)
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::ReportNotFound(_)));
    }

    #[test]
    fn daily_reconciliation_covers_exactly_one_utc_day() {
        let fx = fixture();
        fx.add_txn_at("txn-1", 10.0, "card", TransactionStatus::Completed, day(1));
        fx.add_payment_at("pay-1", "txn-1", 10.0, "card", day(1));
        let last_moment = day(2) - Duration::seconds(1);
        fx.add_txn_at("txn-2", 20.0, "card", TransactionStatus::Completed, last_moment);
        fx.add_payment_at("pay-2", "txn-2", 20.0, "card", last_moment);
        // Next day's trade stays out.
        fx.add_txn_at("txn-3", 40.0, "card", TransactionStatus::Completed, day(2));

        let report = fx
            .engine
            .run_daily_reconciliation(
                fx.tenant,
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                &ReconciliationOptions::default(),
                fx.user,
            )
            .unwrap();

        assert_eq!(report.start_date, day(1));
        assert_eq!(report.end_date, day(2));
        assert_eq!(report.transaction_count, 2);
        assert_eq!(report.expected_amount, 30.0);
        assert_eq!(report.status, ReportStatus::Balanced);
    }

    #[test]
    fn inverted_periods_are_rejected() {
        let fx = fixture();

        let err = fx
            .engine
            .perform_reconciliation(
                fx.tenant,
                day(2),
                day(1),
                &ReconciliationOptions::default(),
                fx.user,
            )
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::InvalidPeriod(_)));
    }

    #[test]
    fn summary_rolls_up_overlapping_reports() {
        let fx = fixture();
        let options = ReconciliationOptions::default();

        // Day one balances, day two drifts by five cents, day three is
        // missing two hundred outright.
        fx.add_txn_at("txn-1", 10.0, "card", TransactionStatus::Completed, day(1));
        fx.add_payment_at("pay-1", "txn-1", 10.0, "card", day(1));
        fx.add_txn_at("txn-2", 10.0, "card", TransactionStatus::Completed, day(2));
        fx.add_payment_at("pay-2", "txn-2", 10.05, "card", day(2));
        fx.add_txn_at("txn-3", 200.0, "card", TransactionStatus::Completed, day(3));

        for d in 1..=3 {
            fx.engine
                .run_daily_reconciliation(
                    fx.tenant,
                    NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
                    &options,
                    fx.user,
                )
                .unwrap();
        }

        let all = fx
            .engine
            .get_reconciliation_summary(fx.tenant, day(1), day(4))
            .unwrap();
        assert_eq!(all.report_count, 3);
        assert_eq!(all.balanced, 1);
        assert_eq!(all.variance_detected, 1);
        assert_eq!(all.major_discrepancy, 1);
        let expected_average = (0.0 + 0.05 - 200.0) / 3.0;
        assert!((all.average_variance - expected_average).abs() < 1e-9);

        // The window is overlap-based, not containment-based.
        let tail = fx
            .engine
            .get_reconciliation_summary(fx.tenant, day(3) - Duration::hours(1), day(4))
            .unwrap();
        assert_eq!(tail.report_count, 2, "day two's report overlaps the window edge");

        let outside = fx
            .engine
            .get_reconciliation_summary(fx.tenant, day(8), day(9))
            .unwrap();
        assert_eq!(outside, ReconciliationSummary::default());
    }

    struct BrokenRepo;

    impl TransactionRepository for BrokenRepo {
        fn find_by_tenant(
            &self,
            _tenant_id: TenantId,
            _query: &PeriodQuery,
        ) -> Result<Page<TransactionRecord>, RepositoryError> {
            Err(RepositoryError::unavailable("ledger db down"))
        }
    }

    #[test]
    fn repository_failures_surface_as_errors() {
        let engine = ReconciliationEngine::new(
            Arc::new(InMemoryKvStore::new()),
            BrokenRepo,
            Arc::new(InMemoryPaymentRepository::new()),
        );

        let err = engine
            .perform_reconciliation(
                TenantId::new(),
                day(1),
                day(2),
                &ReconciliationOptions::default(),
                UserId::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::Repository(_)));
    }

    proptest! {
        #[test]
        fn matched_books_always_balance(
            totals in proptest::collection::vec(0.01f64..10_000.0, 0..20)
        ) {
            let fx = fixture();
            for (i, raw) in totals.iter().enumerate() {
                let total = (raw * 100.0).round() / 100.0;
                fx.add_txn(&format!("txn-{i}"), total, "card", TransactionStatus::Completed);
                fx.add_payment(&format!("pay-{i}"), &format!("txn-{i}"), total, "card");
            }

            let report = fx.reconcile();

            prop_assert_eq!(report.status, ReportStatus::Balanced);
            prop_assert!(report.discrepancies.is_empty());
            prop_assert!(report.variance.abs() < 1e-9);
            prop_assert_eq!(report.transaction_count, totals.len());
        }
    }
}
