//! Liquidation scenarios: interest-driven eligibility, slippage bounds,
//! self-liquidation, partial liquidation and the deleverage callback.

use cascade_common::{CascadeError, UserId, WAD};
use cascade_controller::Controller;
use cascade_integration_tests::{
    market, max_loan_fully_converted, FailingCallback, FakeLeverage, StingyCallback, DAY,
    FULL_APR,
};

const USER: UserId = 7;
const LIQUIDATOR: UserId = 99;

/// A position borrowed to the maximum and fully converted to stable, with
/// 100% APR accrued over `sleep_days` and the rate frozen afterwards.
/// The stable quantity is constant while interest accrues, so eligibility
/// arrives purely with time.
fn aged_position(sleep_days: u64) -> (Controller, u128, u64) {
    let (mut c, _oracle) = market();
    let debt0 = max_loan_fully_converted(&mut c, USER, WAD);

    let h_before = c.health(USER, false, 0).unwrap();
    // conversion at band floors realizes exactly the health-model value
    assert!(h_before.unsigned_abs() < 7 * WAD / 200);

    c.set_rate(FULL_APR, 0).unwrap();
    let now = sleep_days * DAY;
    c.set_rate(0, now).unwrap();
    (c, debt0, now)
}

#[test]
fn health_decays_monotonically_under_interest() {
    let (mut c, _oracle) = market();
    max_loan_fully_converted(&mut c, USER, WAD);
    c.set_rate(FULL_APR, 0).unwrap();

    let mut prev = c.health(USER, false, 0).unwrap();
    assert!(prev > 0);
    for days in [7, 20, 40, 80] {
        let h = c.health(USER, false, days * DAY).unwrap();
        assert!(h < prev);
        prev = h;
    }
    assert!(prev < 0, "eventually liquidatable");
}

#[test]
fn accrued_fees_equal_tokens_to_liquidate() {
    let (mut c, debt0, now) = aged_position(80);

    let to_liquidate = c.tokens_to_liquidate(USER, now).unwrap();
    assert!(to_liquidate > 0);
    let fees = c.collect_fees(now).unwrap();
    assert_eq!(fees, to_liquidate);
    assert_eq!(c.debt(USER, now).unwrap(), debt0 + fees);
}

#[test]
fn liquidation_pays_out_exactly_the_position_stable() {
    let (mut c, _debt0, now) = aged_position(80);
    assert!(c.health(USER, true, now).unwrap() < 0);

    let (x, _y) = c.amm().get_sum_xy(USER).unwrap();
    assert_eq!(
        c.liquidate(LIQUIDATOR, USER, x + 1, now),
        Err(CascadeError::Slippage)
    );

    let outcome = c.liquidate(LIQUIDATOR, USER, x, now).unwrap();
    assert_eq!(outcome.stable_from_amm, x);
    assert!(outcome.stable_due_from_caller > 0);
    assert!(!c.loan_exists(USER));
    assert_eq!(c.total_debt(now).unwrap(), 0);
    assert!(!c.amm().has_deposit(USER));
}

#[test]
fn healthy_positions_cannot_be_liquidated_by_others() {
    // a week of interest: at risk, but health still positive
    let (mut c, _debt0, now) = aged_position(7);
    let h = c.health(USER, true, now).unwrap();
    assert!(h > 0);

    assert_eq!(
        c.liquidate(LIQUIDATOR, USER, 0, now),
        Err(CascadeError::NotEligible)
    );

    // the owner may always close through the liquidation path
    let (x, _) = c.amm().get_sum_xy(USER).unwrap();
    assert_eq!(
        c.liquidate(USER, USER, x + 1, now),
        Err(CascadeError::Slippage)
    );
    c.liquidate(USER, USER, x, now).unwrap();
    assert!(!c.loan_exists(USER));
}

#[test]
fn partial_fractions_converge_to_one_full_liquidation() {
    let (mut split, _d0, now) = aged_position(80);
    let (mut whole, _d1, _) = aged_position(80);

    let debt_at_now = split.debt(USER, now).unwrap();

    let mut repaid_sum = 0u128;
    for frac in [WAD / 4, WAD / 4, WAD / 2] {
        let outcome = split
            .liquidate_extended(USER, USER, 0, frac, None, &[], now)
            .unwrap();
        repaid_sum += outcome.debt_repaid;
    }
    let single = whole.liquidate(USER, USER, 0, now).unwrap();

    assert_eq!(repaid_sum, debt_at_now);
    assert_eq!(repaid_sum, single.debt_repaid);
    assert!(!split.loan_exists(USER) && !whole.loan_exists(USER));
    assert!(!split.amm().has_deposit(USER));
    assert_eq!(split.total_debt(now).unwrap(), 0);
    assert_eq!(whole.total_debt(now).unwrap(), 0);

    // nothing left to liquidate past 100%
    assert_eq!(
        split.liquidate_extended(USER, USER, 0, WAD, None, &[], now),
        Err(CascadeError::NoLoan)
    );
}

#[test]
fn zero_fraction_on_missing_loan_is_distinct() {
    let (mut c, _oracle) = market();
    assert_eq!(
        c.liquidate_extended(USER, USER, 0, 0, None, &[], 0),
        Err(CascadeError::NoLoan)
    );

    max_loan_fully_converted(&mut c, USER, WAD);
    assert_eq!(
        c.liquidate_extended(USER, USER, 0, 0, None, &[], 0),
        Err(CascadeError::AmountZero)
    );
}

#[test]
fn callback_covers_the_shortfall() {
    let (mut c, debt0, now) = aged_position(80);
    let shortfall = c.tokens_to_liquidate(USER, now).unwrap();
    assert!(shortfall > 0);

    let mut leverage = FakeLeverage::new(10 * debt0);
    let outcome = c
        .liquidate_extended(USER, USER, 0, WAD, Some(&mut leverage), &[], now)
        .unwrap();

    assert_eq!(outcome.stable_due_from_caller, 0);
    assert_eq!(leverage.stable, 10 * debt0 - shortfall);
    assert_eq!(leverage.collateral_received, outcome.collateral_to_caller);
    assert!(!c.loan_exists(USER));
}

#[test]
fn callback_shortfall_is_fatal_and_clean() {
    let (mut c, _debt0, now) = aged_position(80);
    let debt_before = c.debt(USER, now).unwrap();
    let xy_before = c.amm().get_sum_xy(USER).unwrap();

    let mut stingy = StingyCallback;
    assert_eq!(
        c.liquidate_extended(USER, USER, 0, WAD, Some(&mut stingy), &[], now),
        Err(CascadeError::CallbackShortfall)
    );

    let mut failing = FailingCallback;
    assert_eq!(
        c.liquidate_extended(USER, USER, 0, WAD, Some(&mut failing), &[], now),
        Err(CascadeError::CallbackFailed)
    );

    // no partial state was committed
    assert!(c.loan_exists(USER));
    assert_eq!(c.debt(USER, now).unwrap(), debt_before);
    assert_eq!(c.amm().get_sum_xy(USER).unwrap(), xy_before);
}

#[test]
fn partial_liquidation_with_callback_scales_the_split() {
    let (mut c, debt0, now) = aged_position(80);
    let debt_at_now = c.debt(USER, now).unwrap();
    let (x, y) = c.amm().get_sum_xy(USER).unwrap();

    let mut leverage = FakeLeverage::new(10 * debt0);
    let outcome = c
        .liquidate_extended(USER, USER, 0, WAD / 2, Some(&mut leverage), &[], now)
        .unwrap();

    // half the position, rounded in the protocol's favor
    assert!(outcome.debt_repaid >= debt_at_now / 2);
    assert!(outcome.debt_repaid <= debt_at_now / 2 + 1);
    assert!(outcome.stable_from_amm <= x / 2 + 1);
    assert!(outcome.collateral_to_caller <= y / 2 + 1);
    assert!(c.loan_exists(USER));
    assert_eq!(
        c.debt(USER, now).unwrap(),
        debt_at_now - outcome.debt_repaid
    );
}
