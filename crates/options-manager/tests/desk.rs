mod common;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::*;
use gex_desk_core::{CloseMethod, DeskError, PositionId, PositionStatus, SpotQuote};
use gex_desk_options_manager::{JsonLedgerStore, PaperDesk, ValuationStatus};

#[test]
fn scenario_a_entry_cost() {
    let desk = PaperDesk::new(FakeQuotes::new(), &config());
    let pos = desk.open_position(terms(), scenario_a_entry()).unwrap();

    assert_eq!(pos.call_prem_usd, dec!(660));
    assert_eq!(pos.put_prem_usd, dec!(510));
    assert_eq!(pos.total_cost_usd, dec!(1170));
    assert_eq!(pos.total_cost_usd, pos.call_prem_usd + pos.put_prem_usd);
    assert_eq!(pos.status(), PositionStatus::Open);
    assert_eq!(desk.list_open().len(), 1);
}

#[test]
fn invalid_entry_leaves_ledger_untouched() {
    let desk = PaperDesk::new(FakeQuotes::new(), &config());

    let mut no_put = terms();
    no_put.put_instrument = None;
    let err = desk.open_position(no_put, scenario_a_entry()).unwrap_err();
    assert!(matches!(err, DeskError::InvalidEntry(_)));

    let err = desk
        .open_position(terms().with_quantity(dec!(0)), scenario_a_entry())
        .unwrap_err();
    assert!(matches!(err, DeskError::InvalidEntry(_)));

    assert!(desk.list_open().is_empty());
    assert!(desk.list_closed().is_empty());
}

#[test]
fn duplicate_open_is_rejected() {
    let desk = PaperDesk::new(FakeQuotes::new(), &config());
    desk.open_position(terms(), scenario_a_entry()).unwrap();
    let err = desk.open_position(terms(), scenario_a_entry()).unwrap_err();
    assert!(matches!(err, DeskError::DuplicatePosition { .. }));
    assert_eq!(desk.list_open().len(), 1);
}

#[tokio::test]
async fn scenario_b_poll_values_position() {
    let desk = PaperDesk::new(scenario_b_source(), &config());
    let id = desk.open_position(terms(), scenario_a_entry()).unwrap().id;

    let now = Utc::now();
    let report = desk.poll_once(now).await;
    assert_eq!(report.refreshed, vec![id]);
    assert!(report.failed.is_empty());

    let snap = desk.get_valuation(&id).unwrap();
    assert_eq!(snap.call_value_usd, dec!(700));
    assert_eq!(snap.put_value_usd, dec!(550));
    assert_eq!(snap.value_usd, dec!(1250));
    assert_eq!(snap.pnl_usd, dec!(80));
    assert_eq!(snap.fetched_at, now);
    assert!(desk.valuation_status(&id, now).is_fresh());
}

#[tokio::test]
async fn scenario_c_take_profit_closes_on_fresh_snapshot() {
    let desk = PaperDesk::new(scenario_b_source(), &config());
    let id = desk.open_position(terms(), scenario_a_entry()).unwrap().id;
    desk.configure_exit_policy(dec!(50), dec!(100), true).unwrap();

    let now = Utc::now();
    desk.poll_once(now).await;
    let closed = desk.evaluate_exits(now + Duration::seconds(1));

    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].id, id);
    assert!(closed[0].record.reason.contains("TP"));
    assert_eq!(closed[0].record.pnl_usd, dec!(80));
    assert_eq!(closed[0].record.basis, CloseMethod::MarkToMarket);

    let pos = desk.get_position(&id).unwrap();
    assert!(pos.note.unwrap().contains("auto:TP 50"));
    assert_eq!(desk.get_equity().equity, dec!(1080));
    assert!(desk.get_valuation(&id).is_none());
}

#[tokio::test]
async fn scenario_d_stale_snapshot_never_closes() {
    let desk = PaperDesk::new(scenario_b_source(), &config());
    let id = desk.open_position(terms(), scenario_a_entry()).unwrap().id;
    desk.configure_exit_policy(dec!(50), dec!(100), true).unwrap();

    let t0 = Utc::now();
    desk.poll_once(t0).await;

    let later = t0 + Duration::seconds(12);
    assert!(desk.evaluate_exits(later).is_empty());
    assert!(desk.get_position(&id).unwrap().is_open());
    assert!(matches!(
        desk.valuation_status(&id, later),
        ValuationStatus::Stale { age_ms: 12_000, .. }
    ));
}

#[tokio::test]
async fn scenario_e_manual_close_uses_intrinsic() {
    let desk = PaperDesk::new(FakeQuotes::new(), &config());
    let id = desk.open_position(terms(), scenario_a_entry()).unwrap().id;

    let record = desk
        .close_position(id, "manual", Some(dec!(61000)))
        .await
        .unwrap();

    assert_eq!(record.close_value_usd, dec!(1000));
    assert_eq!(record.pnl_usd, dec!(-170));
    assert_eq!(record.basis, CloseMethod::Intrinsic);
    assert_eq!(desk.get_equity().equity, dec!(830));
    // no quotes were needed
    assert_eq!(desk.source().calls(), 0);
}

#[tokio::test]
async fn second_close_is_already_closed() {
    let desk = PaperDesk::new(FakeQuotes::new(), &config());
    let id = desk.open_position(terms(), scenario_a_entry()).unwrap().id;
    desk.close_position(id, "manual", Some(dec!(61000)))
        .await
        .unwrap();

    let before = desk.get_position(&id);
    let err = desk
        .close_position(id, "again", Some(dec!(50000)))
        .await
        .unwrap_err();
    assert_eq!(err, DeskError::already_closed(id));
    assert_eq!(desk.get_position(&id), before);
    assert_eq!(desk.get_equity().realized_pnl, dec!(-170));
}

#[tokio::test]
async fn close_unknown_position() {
    let desk = PaperDesk::new(FakeQuotes::new(), &config());
    let id = PositionId::new();
    let err = desk.close_position(id, "manual", None).await.unwrap_err();
    assert_eq!(err, DeskError::position_not_found(id));
}

#[tokio::test]
async fn close_without_spot_uses_fresh_snapshot() {
    let desk = PaperDesk::new(scenario_b_source(), &config());
    let id = desk.open_position(terms(), scenario_a_entry()).unwrap().id;
    desk.poll_once(Utc::now()).await;
    let calls = desk.source().calls();

    let record = desk.close_position(id, "", None).await.unwrap();
    assert_eq!(record.pnl_usd, dec!(80));
    assert_eq!(record.reason, "manual");
    assert_eq!(record.close_spot, dec!(50000));
    assert_eq!(desk.source().calls(), calls);
}

#[tokio::test]
async fn close_without_snapshot_fetches_live() {
    let desk = PaperDesk::new(scenario_b_source(), &config());
    let id = desk.open_position(terms(), scenario_a_entry()).unwrap().id;

    let record = desk.close_position(id, "manual", None).await.unwrap();
    assert_eq!(record.close_value_usd, dec!(1250));
    assert_eq!(record.basis, CloseMethod::MarkToMarket);
    assert_eq!(desk.source().calls(), 3);
}

#[tokio::test]
async fn close_fails_when_quotes_unavailable() {
    let source = scenario_b_source();
    source.fail(PUT);
    let desk = PaperDesk::new(source, &config());
    let id = desk.open_position(terms(), scenario_a_entry()).unwrap().id;

    let err = desk.close_position(id, "manual", None).await.unwrap_err();
    assert!(matches!(err, DeskError::QuoteUnavailable { .. }));
    assert!(desk.get_position(&id).unwrap().is_open());
    assert_eq!(desk.get_equity().realized_pnl, Decimal::ZERO);
}

#[tokio::test]
async fn manual_and_auto_close_first_wins() {
    // manual first
    let desk = PaperDesk::new(scenario_b_source(), &config());
    let id = desk.open_position(terms(), scenario_a_entry()).unwrap().id;
    desk.configure_exit_policy(dec!(50), dec!(100), true).unwrap();
    let now = Utc::now();
    desk.poll_once(now).await;

    desk.close_position(id, "manual", Some(dec!(61000)))
        .await
        .unwrap();
    assert!(desk.evaluate_exits(now).is_empty());
    assert_eq!(desk.get_equity().realized_pnl, dec!(-170));

    // auto first
    let desk = PaperDesk::new(scenario_b_source(), &config());
    let id = desk.open_position(terms(), scenario_a_entry()).unwrap().id;
    desk.configure_exit_policy(dec!(50), dec!(100), true).unwrap();
    let now = Utc::now();
    desk.poll_once(now).await;

    assert_eq!(desk.evaluate_exits(now).len(), 1);
    let err = desk
        .close_position(id, "manual", Some(dec!(61000)))
        .await
        .unwrap_err();
    assert_eq!(err, DeskError::already_closed(id));
    assert_eq!(desk.get_equity().realized_pnl, dec!(80));
}

#[tokio::test]
async fn concurrent_closes_settle_exactly_once() {
    let desk = PaperDesk::new(scenario_b_source(), &config());
    let id = desk.open_position(terms(), scenario_a_entry()).unwrap().id;
    desk.configure_exit_policy(dec!(50), dec!(100), true).unwrap();
    let now = Utc::now();
    desk.poll_once(now).await;

    let (manual, auto) = tokio::join!(desk.close_position(id, "manual", None), async {
        desk.evaluate_exits(now)
    });

    match manual {
        Ok(_) => assert!(auto.is_empty()),
        Err(e) => {
            assert_eq!(e, DeskError::already_closed(id));
            assert_eq!(auto.len(), 1);
        }
    }
    assert_eq!(desk.list_closed().len(), 1);
    assert_eq!(desk.get_equity().closed_count, 1);
}

#[tokio::test]
async fn stop_loss_closes_losing_position() {
    let source = scenario_b_source();
    source.set_spot(PERP, dec!(40000));
    let desk = PaperDesk::new(source, &config());
    let id = desk.open_position(terms(), scenario_a_entry()).unwrap().id;
    desk.configure_exit_policy(dec!(0), dec!(100), true).unwrap();

    let now = Utc::now();
    desk.poll_once(now).await;
    // 0.025 * 40000 = 1000 → pnl -170
    assert_eq!(desk.get_valuation(&id).unwrap().pnl_usd, dec!(-170));

    let closed = desk.evaluate_exits(now);
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].record.reason, "auto:SL 100");
}

#[tokio::test]
async fn auto_disabled_never_closes() {
    let desk = PaperDesk::new(scenario_b_source(), &config());
    desk.open_position(terms(), scenario_a_entry()).unwrap();
    desk.configure_exit_policy(dec!(50), dec!(100), false).unwrap();

    let now = Utc::now();
    desk.poll_once(now).await;
    assert!(desk.evaluate_exits(now).is_empty());
}

#[tokio::test]
async fn equity_law_ignores_unrealized() {
    let source = scenario_b_source();
    quote_strike(&source, 65000);
    let desk = PaperDesk::new(source, &config());

    let a = desk.open_position(terms(), scenario_a_entry()).unwrap().id;
    let b = desk
        .open_position(terms_at(65000), scenario_a_entry())
        .unwrap()
        .id;

    desk.poll_once(Utc::now()).await;
    let report = desk.get_equity();
    assert_eq!(report.equity, dec!(1000));
    assert_eq!(report.unrealized_pnl, dec!(160));
    assert_eq!(report.open_cost, dec!(2340));
    assert_eq!(report.open_value, dec!(2500));
    assert_eq!(report.valued_positions, 2);

    desk.close_position(a, "manual", Some(dec!(61000)))
        .await
        .unwrap();
    desk.close_position(b, "manual", Some(dec!(67000)))
        .await
        .unwrap();

    let report = desk.get_equity();
    // -170 + (2000 - 1170)
    assert_eq!(report.realized_pnl, dec!(660));
    assert_eq!(report.equity, dec!(1660));
    assert_eq!(report.unrealized_pnl, Decimal::ZERO);
    assert_eq!(report.open_count, 0);
    assert_eq!(report.closed_count, 2);
}

#[tokio::test]
async fn positions_crossing_take_profit_close_in_same_pass() {
    let source = scenario_b_source();
    quote_strike(&source, 65000);
    let desk = PaperDesk::new(source, &config());

    let a = desk.open_position(terms(), scenario_a_entry()).unwrap().id;
    let b = desk
        .open_position(terms_at(65000), scenario_a_entry())
        .unwrap()
        .id;
    desk.configure_exit_policy(dec!(50), dec!(100), true).unwrap();

    let now = Utc::now();
    desk.poll_once(now).await;
    let closed = desk.evaluate_exits(now);

    let ids: Vec<PositionId> = closed.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![a, b]);
    assert!(closed.iter().all(|c| c.record.pnl_usd == dec!(80)));
    assert!(desk.list_open().is_empty());

    let report = desk.get_equity();
    assert_eq!(report.realized_pnl, dec!(160));
    assert_eq!(report.equity, dec!(1160));
    assert_eq!(report.closed_count, 2);
}

#[tokio::test]
async fn open_live_fetches_entry_quotes() {
    let source = FakeQuotes::new();
    source.set_quote(CALL, scenario_a_call());
    source.set_quote(PUT, scenario_a_put());
    source.set_raw_spot(
        PERP,
        SpotQuote {
            index_price: None,
            last_price: Some(dec!(60000)),
        },
    );
    let desk = PaperDesk::new(source, &config());

    let pos = desk.open_position_live(terms()).await.unwrap();
    assert_eq!(pos.entry_spot, dec!(60000));
    assert_eq!(pos.total_cost_usd, dec!(1170));
}

#[tokio::test]
async fn open_live_rejects_missing_leg_before_fetching() {
    let desk = PaperDesk::new(scenario_b_source(), &config());
    let mut no_call = terms();
    no_call.call_instrument = Some("  ".to_string());

    let err = desk.open_position_live(no_call).await.unwrap_err();
    assert!(matches!(err, DeskError::InvalidEntry(_)));
    assert_eq!(desk.source().calls(), 0);
}

#[tokio::test]
async fn open_live_without_spot_is_invalid_entry() {
    let source = FakeQuotes::new();
    source.set_quote(CALL, scenario_a_call());
    source.set_quote(PUT, scenario_a_put());
    source.set_raw_spot(PERP, SpotQuote::default());
    let desk = PaperDesk::new(source, &config());

    let err = desk.open_position_live(terms()).await.unwrap_err();
    assert!(matches!(err, DeskError::InvalidEntry(_)));
    assert!(desk.list_open().is_empty());
}

#[tokio::test]
async fn set_active_requires_open_position() {
    let desk = PaperDesk::new(FakeQuotes::new(), &config());
    let id = desk.open_position(terms(), scenario_a_entry()).unwrap().id;

    desk.set_active(Some(id)).unwrap();
    assert_eq!(desk.session().active_position, Some(id));

    desk.close_position(id, "manual", Some(dec!(61000)))
        .await
        .unwrap();
    assert!(desk.session().active_position.is_none());
    assert_eq!(
        desk.set_active(Some(id)).unwrap_err(),
        DeskError::already_closed(id)
    );
}

#[tokio::test]
async fn persisted_ledger_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data/paperbox.json");

    let (open_id, closed_id) = {
        let desk =
            PaperDesk::with_store(FakeQuotes::new(), &config(), JsonLedgerStore::new(&path))
                .unwrap();
        let closed = desk
            .open_position(terms().with_note("wall"), scenario_a_entry())
            .unwrap()
            .id;
        let open = desk
            .open_position(
                terms_at(65000).with_quantity(dec!(2)),
                scenario_a_entry(),
            )
            .unwrap()
            .id;
        desk.close_position(closed, "manual", Some(dec!(61000)))
            .await
            .unwrap();
        desk.configure_exit_policy(dec!(50), dec!(100), true).unwrap();
        assert!(desk.last_persist_error().is_none());
        (open, closed)
    };

    let desk =
        PaperDesk::with_store(FakeQuotes::new(), &config(), JsonLedgerStore::new(&path)).unwrap();

    let open = desk.list_open();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, open_id);
    assert_eq!(open[0].quantity, dec!(2));
    assert_eq!(open[0].total_cost_usd, dec!(2340));

    let closed = desk.get_position(&closed_id).unwrap();
    assert_eq!(closed.realized_pnl(), Some(dec!(-170)));
    assert_eq!(closed.note.as_deref(), Some("wall; manual"));

    let policy = desk.exit_policy();
    assert_eq!(policy.take_profit_usd, dec!(50));
    assert_eq!(policy.stop_loss_usd, dec!(100));
    assert!(policy.auto_enabled);
    assert_eq!(desk.get_equity().equity, dec!(830));
}

#[test]
fn reset_clears_ledger_and_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paperbox.json");
    let store = JsonLedgerStore::new(&path);

    let desk = PaperDesk::with_store(FakeQuotes::new(), &config(), store.clone()).unwrap();
    desk.open_position(terms(), scenario_a_entry()).unwrap();
    desk.reset_ledger().unwrap();

    assert!(desk.list_open().is_empty());
    assert_eq!(desk.get_equity().equity, dec!(1000));
    assert!(store.load().unwrap().unwrap().positions.is_empty());
}

#[test]
fn position_view_reports_breakevens() {
    let desk = PaperDesk::new(FakeQuotes::new(), &config());
    let id = desk.open_position(terms(), scenario_a_entry()).unwrap().id;

    let view = desk.position_view(&id, Utc::now()).unwrap();
    assert_eq!(view.breakeven_low, dec!(58830));
    assert_eq!(view.breakeven_high, dec!(61170));
    assert!(view.valuation.is_none());
    assert_eq!(view.status, ValuationStatus::Unknown { last_error: None });
}

#[tokio::test]
async fn focus_mode_keeps_restored_exit_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paperbox.json");
    let source = scenario_b_source();
    quote_strike(&source, 65000);

    let (first, second) = {
        let desk =
            PaperDesk::with_store(FakeQuotes::new(), &config(), JsonLedgerStore::new(&path))
                .unwrap();
        let first = desk.open_position(terms(), scenario_a_entry()).unwrap().id;
        let second = desk
            .open_position(terms_at(65000), scenario_a_entry())
            .unwrap()
            .id;
        desk.configure_exit_policy(dec!(50), dec!(100), true).unwrap();
        (first, second)
    };

    let desk = PaperDesk::with_store(source, &config(), JsonLedgerStore::new(&path)).unwrap();
    desk.set_active(Some(second)).unwrap();
    desk.set_focus_mode(true);

    let policy = desk.exit_policy();
    assert_eq!(policy.take_profit_usd, dec!(50));
    assert_eq!(policy.stop_loss_usd, dec!(100));
    assert!(policy.auto_enabled);

    let report = desk.poll_once(Utc::now()).await;
    assert_eq!(report.refreshed, vec![second]);
    assert_eq!(report.skipped, 1);
    assert!(desk.get_valuation(&first).is_none());

    let stored = JsonLedgerStore::new(&path).load().unwrap().unwrap();
    assert!(stored.exit_policy.auto_enabled);
    assert_eq!(stored.exit_policy.take_profit_usd, dec!(50));
}

#[tokio::test]
async fn changes_from_another_desk_on_same_store_survive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paperbox.json");
    let source = scenario_b_source();
    quote_strike(&source, 65000);

    let running = PaperDesk::with_store(source, &config(), JsonLedgerStore::new(&path)).unwrap();
    let mine = running
        .open_position(terms(), scenario_a_entry())
        .unwrap()
        .id;

    let theirs = {
        let other =
            PaperDesk::with_store(FakeQuotes::new(), &config(), JsonLedgerStore::new(&path))
                .unwrap();
        other
            .open_position(terms_at(65000), scenario_a_entry())
            .unwrap()
            .id
    };

    let report = running.poll_once(Utc::now()).await;
    assert_eq!(report.refreshed.len(), 2);
    assert!(report.refreshed.contains(&theirs));

    running
        .configure_exit_policy(dec!(500), dec!(500), true)
        .unwrap();
    assert!(running.evaluate_exits(Utc::now()).is_empty());

    let stored = JsonLedgerStore::new(&path).load().unwrap().unwrap();
    let on_disk: Vec<PositionId> = stored.positions.iter().map(|p| p.id).collect();
    assert_eq!(on_disk, vec![mine, theirs]);
    assert!(running.last_persist_error().is_none());

    // A close made elsewhere is seen before the next mutation.
    {
        let other =
            PaperDesk::with_store(FakeQuotes::new(), &config(), JsonLedgerStore::new(&path))
                .unwrap();
        other
            .close_position(theirs, "manual", Some(dec!(65000)))
            .await
            .unwrap();
    }
    assert_eq!(
        running
            .close_position(theirs, "manual", Some(dec!(65000)))
            .await
            .unwrap_err(),
        DeskError::already_closed(theirs)
    );
    assert_eq!(running.list_closed().len(), 1);
    assert!(running.get_valuation(&theirs).is_none());
}
