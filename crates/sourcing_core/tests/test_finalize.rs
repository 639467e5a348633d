//! Finalization through the desk: deviation gate, partial commits,
//! capacity rejections and closure.

mod common;

use std::sync::Arc;

use sourcing_core::allocation::{AllocationSnapshot, FinalizeRequest, SchemeSplit};
use sourcing_core::rfq::RfqStatus;
use sourcing_core::{CapacityScope, FinalizeConfig, QuoteId, RfqId, SourcingDesk, SourcingError, Upstream};

use common::{
    BrokenNotifier, FailingFx, FailingJournal, RecordingNotifier, Scenario, prices_with_totals,
    submission, two_vendor_scenario,
};

#[test]
fn test_accepting_recommendation_closes_without_reason() {
    let Scenario { desk, rfq, v1, v2, journal } = two_vendor_scenario();
    let rec = desk.recommend(rfq).unwrap();

    let outcome = desk
        .finalize_at(rfq, FinalizeRequest::new(rec.to_snapshot()), 5_000)
        .unwrap();

    assert!(outcome.closed);
    assert!(!outcome.deviated);
    assert_eq!(outcome.total_allocated, 10);
    assert_eq!(outcome.records.len(), 2);
    assert!(outcome.records.iter().all(|r| r.reason.is_none()));
    assert_eq!(outcome.proposed_cost, outcome.recommended_cost);

    let effective = desk.effective_allocation(rfq).unwrap();
    assert_eq!(effective[&v2], SchemeSplit::new(0, 8));
    assert_eq!(effective[&v1], SchemeSplit::new(2, 0));
    assert_eq!(desk.rfq_status(rfq).unwrap(), RfqStatus::Closed);
    assert_eq!(journal.len(), 2);
    assert_eq!(desk.metrics().closed_total(), 1);
    assert_eq!(desk.metrics().deviations_total(), 0);
}

#[test]
fn test_deviation_requires_non_blank_reason() {
    let Scenario { desk, rfq, v1, v2, .. } = two_vendor_scenario();
    let manual = AllocationSnapshot::new().with(v1, 6, 0).with(v2, 0, 4);

    for reason in [None, Some(""), Some("   ")] {
        let mut request = FinalizeRequest::new(manual.clone());
        request.reason = reason.map(str::to_string);
        let err = desk.finalize(rfq, request).unwrap_err();
        assert!(matches!(err, SourcingError::Validation { .. }), "{err}");
    }
    assert_eq!(desk.total_allocated(rfq).unwrap(), 0);
    assert_eq!(desk.metrics().rejected_validation_total(), 3);

    let outcome = desk
        .finalize(rfq, FinalizeRequest::new(manual).with_reason("  V1 has better on-time record "))
        .unwrap();
    assert!(outcome.closed);
    assert!(outcome.deviated);
    assert_eq!(outcome.proposed_cost, 6.0 * 100.0 + 4.0 * 90.0);
    assert_eq!(outcome.recommended_cost, 8.0 * 90.0 + 2.0 * 100.0);
    assert!(
        outcome
            .records
            .iter()
            .all(|r| r.reason.as_deref() == Some("V1 has better on-time record"))
    );
    assert_eq!(desk.metrics().deviations_total(), 1);
}

#[test]
fn test_edited_prices_force_reason_even_when_matching() {
    let Scenario { desk, rfq, v1, .. } = two_vendor_scenario();
    let edited = desk
        .edit_quote_prices(rfq, v1, prices_with_totals(95.0, 120.0))
        .unwrap();
    assert!(edited.is_edited());
    assert_eq!(edited.submitted_prices, prices_with_totals(100.0, 120.0));

    // The recommendation uses the edited price.
    let rec = desk.recommend(rfq).unwrap();
    assert_eq!(rec.split_for(v1), SchemeSplit::new(2, 0));
    assert_eq!(rec.total_cost, 8.0 * 90.0 + 2.0 * 95.0);

    let err = desk
        .finalize(rfq, FinalizeRequest::new(rec.to_snapshot()))
        .unwrap_err();
    assert!(matches!(err, SourcingError::Validation { .. }));

    let outcome = desk
        .finalize(rfq, FinalizeRequest::new(rec.to_snapshot()).with_reason("negotiated discount"))
        .unwrap();
    assert!(outcome.closed);
    assert!(outcome.deviated);
}

#[test]
fn test_partial_commit_keeps_rfq_in_evaluation() {
    let Scenario { desk, rfq, v1, v2, .. } = two_vendor_scenario();
    let partial = AllocationSnapshot::new().with(v2, 0, 8);

    let first = desk
        .finalize(rfq, FinalizeRequest::new(partial).with_reason("stage one award"))
        .unwrap();
    assert!(!first.closed);
    assert_eq!(first.total_allocated, 8);
    assert_eq!(desk.rfq_status(rfq).unwrap(), RfqStatus::Evaluation);

    // The next recommendation carries the committed 8 and fills the rest.
    let rec = desk.recommend(rfq).unwrap();
    assert_eq!(rec.split_for(v2), SchemeSplit::new(0, 8));
    assert_eq!(rec.split_for(v1), SchemeSplit::new(2, 0));

    let second = desk
        .finalize(rfq, FinalizeRequest::new(rec.to_snapshot()).based_on(8))
        .unwrap();
    assert!(second.closed);
    assert_eq!(second.records.len(), 1);
    assert_eq!(second.records[0].quote_id, v1);
    assert_eq!(second.records[0].seq, 2);

    let history = desk.allocation_history(rfq).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].reason.as_deref(), Some("stage one award"));
    assert_eq!(history[1].reason, None);
}

#[test]
fn test_snapshot_below_committed_rejected() {
    let Scenario { desk, rfq, v1, v2, .. } = two_vendor_scenario();
    desk.finalize(
        rfq,
        FinalizeRequest::new(AllocationSnapshot::new().with(v2, 0, 8)).with_reason("stage one"),
    )
    .unwrap();

    let shrink = AllocationSnapshot::new().with(v2, 0, 5).with(v1, 2, 0);
    let err = desk
        .finalize(rfq, FinalizeRequest::new(shrink).with_reason("changed mind"))
        .unwrap_err();
    assert!(matches!(err, SourcingError::Validation { .. }));

    // Omitting a committed quote counts as proposing zero for it.
    let omitted = AllocationSnapshot::new().with(v1, 2, 0);
    let err = desk
        .finalize(rfq, FinalizeRequest::new(omitted).with_reason("changed mind"))
        .unwrap_err();
    assert!(matches!(err, SourcingError::Validation { .. }));

    assert_eq!(desk.total_allocated(rfq).unwrap(), 8);
    assert_eq!(desk.allocation_history(rfq).unwrap().len(), 1);
}

#[test]
fn test_over_requirement_rejected_without_writes() {
    let Scenario { desk, rfq, v1, v2, journal } = two_vendor_scenario();
    let greedy = AllocationSnapshot::new().with(v1, 6, 0).with(v2, 0, 8);

    let err = desk
        .finalize(rfq, FinalizeRequest::new(greedy).with_reason("take everything"))
        .unwrap_err();
    assert_eq!(
        err,
        SourcingError::CapacityExceeded {
            scope: CapacityScope::Requirement(rfq),
            requested: 14,
            limit: 10,
        }
    );
    assert!(journal.is_empty());
    assert_eq!(desk.rfq_status(rfq).unwrap(), RfqStatus::Evaluation);
    assert_eq!(desk.metrics().rejected_capacity_total(), 1);
}

#[test]
fn test_over_offer_rejected() {
    let Scenario { desk, rfq, v1, v2, journal } = two_vendor_scenario();
    let too_much = AllocationSnapshot::new().with(v1, 4, 3).with(v2, 0, 3);

    let err = desk
        .finalize(rfq, FinalizeRequest::new(too_much).with_reason("prefer V1"))
        .unwrap_err();
    assert_eq!(
        err,
        SourcingError::CapacityExceeded {
            scope: CapacityScope::QuoteOffer(v1),
            requested: 7,
            limit: 6,
        }
    );
    assert!(journal.is_empty());
}

#[test]
fn test_unknown_quote_and_rfq_rejected() {
    let Scenario { desk, rfq, v1, .. } = two_vendor_scenario();
    let stray = AllocationSnapshot::new().with(v1, 1, 0).with(QuoteId(404), 1, 0);
    let err = desk
        .finalize(rfq, FinalizeRequest::new(stray).with_reason("typo"))
        .unwrap_err();
    assert!(matches!(err, SourcingError::Validation { .. }));

    let err = desk
        .finalize(RfqId(77), FinalizeRequest::new(AllocationSnapshot::new()))
        .unwrap_err();
    assert!(matches!(err, SourcingError::Validation { .. }));
}

#[test]
fn test_snapshot_without_additions_rejected() {
    let Scenario { desk, rfq, v2, .. } = two_vendor_scenario();
    let err = desk
        .finalize(rfq, FinalizeRequest::new(AllocationSnapshot::new()).with_reason("noop"))
        .unwrap_err();
    assert!(matches!(err, SourcingError::Validation { .. }));

    let stage = AllocationSnapshot::new().with(v2, 0, 3);
    desk.finalize(rfq, FinalizeRequest::new(stage.clone()).with_reason("stage"))
        .unwrap();
    let err = desk
        .finalize(rfq, FinalizeRequest::new(stage).with_reason("again"))
        .unwrap_err();
    assert!(matches!(err, SourcingError::Validation { .. }));
    assert_eq!(desk.total_allocated(rfq).unwrap(), 3);
}

#[test]
fn test_stale_base_rejected() {
    let Scenario { desk, rfq, v1, v2, .. } = two_vendor_scenario();
    desk.finalize(
        rfq,
        FinalizeRequest::new(AllocationSnapshot::new().with(v1, 2, 0)).with_reason("stage"),
    )
    .unwrap();

    // Operator prepared against 0; adding 2 more would still fit: reload.
    let err = desk
        .finalize(
            rfq,
            FinalizeRequest::new(AllocationSnapshot::new().with(v1, 2, 0))
                .with_reason("stale")
                .based_on(0),
        )
        .unwrap_err();
    assert!(matches!(err, SourcingError::Validation { .. }));

    // Operator prepared the full 10 against 0; that no longer fits.
    let err = desk
        .finalize(
            rfq,
            FinalizeRequest::new(AllocationSnapshot::new().with(v1, 2, 0).with(v2, 0, 8))
                .based_on(0),
        )
        .unwrap_err();
    assert_eq!(
        err,
        SourcingError::CapacityExceeded {
            scope: CapacityScope::Requirement(rfq),
            requested: 12,
            limit: 10,
        }
    );
    assert_eq!(desk.total_allocated(rfq).unwrap(), 2);
}

#[test]
fn test_fx_outage_blocks_finalization() {
    let desk = SourcingDesk::new(
        Arc::new(sourcing_core::allocation::MemoryJournal::new()),
        Arc::new(FailingFx),
        FinalizeConfig::default(),
    );
    let rfq = RfqId(3);
    desk.create_rfq(rfq, 4).unwrap();
    let q = desk.submit_quote(rfq, submission("V1", 4, 10.0, 12.0)).unwrap();

    let err = desk.recommend(rfq).unwrap_err();
    assert!(err.is_retryable());

    let err = desk
        .finalize(rfq, FinalizeRequest::new(AllocationSnapshot::new().with(q.id, 4, 0)))
        .unwrap_err();
    assert!(matches!(
        err,
        SourcingError::UpstreamUnavailable {
            upstream: Upstream::FxRate,
            ..
        }
    ));
    assert_eq!(desk.total_allocated(rfq).unwrap(), 0);
    assert_eq!(desk.metrics().rejected_upstream_total(), 1);
}

#[test]
fn test_journal_outage_leaves_rfq_open() {
    let desk = common::desk_with_journal(Arc::new(FailingJournal));
    let rfq = RfqId(3);
    desk.create_rfq(rfq, 4).unwrap();
    let q = desk.submit_quote(rfq, submission("V1", 4, 10.0, 12.0)).unwrap();

    let err = desk
        .finalize(rfq, FinalizeRequest::new(AllocationSnapshot::new().with(q.id, 4, 0)))
        .unwrap_err();
    assert!(matches!(
        err,
        SourcingError::UpstreamUnavailable {
            upstream: Upstream::Persistence,
            ..
        }
    ));
    assert_eq!(desk.rfq_status(rfq).unwrap(), RfqStatus::Evaluation);
    assert_eq!(desk.total_allocated(rfq).unwrap(), 0);
}

#[test]
fn test_closure_notice_lists_awards() {
    let notifier = Arc::new(RecordingNotifier::default());
    let Scenario { desk, rfq, v1, v2, .. } = two_vendor_scenario();
    let desk = desk.with_notifier(notifier.clone());

    let rec = desk.recommend(rfq).unwrap();
    desk.finalize_at(rfq, FinalizeRequest::new(rec.to_snapshot()), 9_000)
        .unwrap();

    let notices = notifier.notices.lock().unwrap();
    assert_eq!(notices.len(), 1);
    let notice = &notices[0];
    assert_eq!(notice.rfq_id, rfq);
    assert_eq!(notice.required_containers, 10);
    assert_eq!(notice.closed_at_ms, 9_000);
    let awarded: Vec<_> = notice
        .allocations
        .iter()
        .map(|a| (a.vendor.as_str(), a.quote_id, a.split))
        .collect();
    assert_eq!(
        awarded,
        vec![("V1", v1, SchemeSplit::new(2, 0)), ("V2", v2, SchemeSplit::new(0, 8))]
    );
}

#[test]
fn test_partial_commit_sends_no_notice() {
    let notifier = Arc::new(RecordingNotifier::default());
    let Scenario { desk, rfq, v2, .. } = two_vendor_scenario();
    let desk = desk.with_notifier(notifier.clone());

    desk.finalize(
        rfq,
        FinalizeRequest::new(AllocationSnapshot::new().with(v2, 0, 8)).with_reason("stage"),
    )
    .unwrap();
    assert!(notifier.notices.lock().unwrap().is_empty());
}

#[test]
fn test_notify_failure_does_not_roll_back_closure() {
    let Scenario { desk, rfq, journal, .. } = two_vendor_scenario();
    let desk = desk.with_notifier(Arc::new(BrokenNotifier));

    let rec = desk.recommend(rfq).unwrap();
    let outcome = desk
        .finalize(rfq, FinalizeRequest::new(rec.to_snapshot()))
        .unwrap();

    assert!(outcome.closed);
    assert_eq!(desk.rfq_status(rfq).unwrap(), RfqStatus::Closed);
    assert_eq!(journal.len(), 2);
    assert_eq!(desk.metrics().notify_failures_total(), 1);
}

#[test]
fn test_total_never_exceeds_requirement_over_many_commits() {
    let desk = common::desk();
    let rfq = RfqId(11);
    desk.create_rfq(rfq, 7).unwrap();
    let q1 = desk.submit_quote(rfq, submission("V1", 5, 10.0, 11.0)).unwrap().id;
    let q2 = desk.submit_quote(rfq, submission("V2", 5, 12.0, 9.0)).unwrap().id;

    let mut cumulative = AllocationSnapshot::new();
    let steps = [(q1, 1, 0), (q2, 0, 2), (q1, 2, 1), (q2, 0, 4), (q1, 3, 2)];
    for (quote_id, a, b) in steps {
        let mut next = cumulative.clone();
        next.set(quote_id, SchemeSplit::new(a, b));
        match desk.finalize(rfq, FinalizeRequest::new(next.clone()).with_reason("manual step")) {
            Ok(_) => cumulative = next,
            Err(err) => assert!(matches!(
                err,
                SourcingError::CapacityExceeded { .. } | SourcingError::AlreadyFinalized { .. }
            )),
        }
        let total = desk.total_allocated(rfq).unwrap();
        assert!(total <= 7);
        let closed = desk.rfq_status(rfq).unwrap() == RfqStatus::Closed;
        assert_eq!(closed, total == 7);
    }
    assert_eq!(desk.total_allocated(rfq).unwrap(), 7);
}
