//! Loan lifecycle scenarios.

use cascade_common::{mul_div_down, CascadeError, WAD};
use cascade_controller::{Controller, ControllerParams};
use cascade_integration_tests::{market, BASE_PRICE};
use cascade_oracle::StaticOracle;
use proptest::prelude::*;
use std::rc::Rc;

#[test]
fn create_loan_walkthrough() {
    let (mut c, _oracle) = market();
    let user = 1;
    let collateral = 1000 * WAD;

    // far beyond any placement
    assert_eq!(
        c.create_loan(user, collateral, 2_000_000 * BASE_PRICE, 5, 0),
        Err(CascadeError::DebtTooHigh)
    );

    let debt = c.max_borrowable(collateral, 5).unwrap() / 4;
    assert_eq!(
        c.create_loan(user, collateral, debt, 4, 0),
        Err(CascadeError::TooFewBands)
    );
    assert_eq!(
        c.create_loan(user, collateral, debt, 400, 0),
        Err(CascadeError::TooManyBands)
    );
    assert_eq!(
        c.create_loan(user, collateral / 100, debt, 5, 0),
        Err(CascadeError::DebtTooHigh)
    );

    // the loan finally goes through
    let minted = c.create_loan(user, collateral, debt, 5, 0).unwrap();
    assert_eq!(minted, debt);
    assert_eq!(
        c.create_loan(user, collateral, 1, 5, 0),
        Err(CascadeError::LoanExists)
    );

    assert_eq!(c.debt(user, 0).unwrap(), debt);
    assert_eq!(c.total_debt(0).unwrap(), debt);

    // the average liquidation price sits inside the band range
    let (p_up, p_down) = c.user_prices(user).unwrap();
    let p_lim = mul_div_down(debt, WAD, collateral * 91 / 100).unwrap();
    assert!(p_down < p_lim && p_lim <= p_up);
    assert!(p_up < BASE_PRICE);

    // fresh positions are healthy but inside the loan discount margin
    let health = c.health(user, false, 0).unwrap();
    assert!(health > 0);
    assert!(health < (9 * WAD / 100) as i128);

    // full health also credits value above the band range, bounded by the
    // undiscounted oracle valuation
    let full = c.health(user, true, 0).unwrap();
    assert!(full > health);
    let ceiling = mul_div_down(collateral, BASE_PRICE, debt).unwrap() as i128 - WAD as i128;
    assert!(full < ceiling);
}

#[test]
fn repay_everything_returns_all_collateral() {
    let (mut c, _oracle) = market();
    let collateral = 10 * WAD;
    let debt = c.max_borrowable(collateral, 5).unwrap() / 2;
    c.create_loan(1, collateral, debt, 5, 0).unwrap();

    let outcome = c.repay(1, 1u128 << 100, 0).unwrap();
    assert_eq!(outcome.debt_repaid, debt);
    assert_eq!(outcome.collateral_returned, collateral);
    assert_eq!(outcome.stable_refund, 0);
    assert!(!c.loan_exists(1));
    assert_eq!(c.total_debt(0).unwrap(), 0);

    // the AMM keeps nothing behind
    let (n1, n2) = (1, 50);
    for n in n1..=n2 {
        let band = c.amm().band(n);
        assert_eq!((band.x, band.y), (0, 0));
    }
}

#[test]
fn collateral_moves_preserve_width_and_debt() {
    let (mut c, _oracle) = market();
    let collateral = 10 * WAD;
    let debt = c.max_borrowable(collateral, 10).unwrap() / 2;
    c.create_loan(1, collateral, debt, 10, 0).unwrap();
    let (n1_0, n2_0) = c.amm().read_user_tick_numbers(1).unwrap();
    assert_eq!(n2_0 - n1_0 + 1, 10);

    c.add_collateral(1, collateral, 0).unwrap();
    let (n1_1, n2_1) = c.amm().read_user_tick_numbers(1).unwrap();
    assert_eq!(n2_1 - n1_1 + 1, 10);
    assert!(n1_1 > n1_0);
    assert_eq!(c.debt(1, 0).unwrap(), debt);

    c.remove_collateral(1, collateral, 0).unwrap();
    let (n1_2, n2_2) = c.amm().read_user_tick_numbers(1).unwrap();
    assert_eq!((n1_2, n2_2), (n1_0, n2_0));
    assert_eq!(c.debt(1, 0).unwrap(), debt);
}

#[test]
fn borrow_more_moves_bands_shallower() {
    let (mut c, _oracle) = market();
    let collateral = 10 * WAD;
    let debt = c.max_borrowable(collateral, 5).unwrap() / 8;
    c.create_loan(1, collateral, debt, 5, 0).unwrap();
    let (n1_before, _) = c.amm().read_user_tick_numbers(1).unwrap();

    c.borrow_more(1, 0, 2 * debt, 0).unwrap();
    let (n1_after, n2_after) = c.amm().read_user_tick_numbers(1).unwrap();
    assert_eq!(n2_after - n1_after + 1, 5);
    assert!(n1_after < n1_before, "more debt means shallower bands");
    assert_eq!(c.debt(1, 0).unwrap(), 3 * debt);
}

fn fresh_market() -> Controller {
    let oracle = Rc::new(StaticOracle::new(BASE_PRICE));
    let params = ControllerParams {
        a: 25,
        base_price: BASE_PRICE,
        amm_fee: 0,
        loan_discount: 9 * WAD / 100,
        liquidation_discount: 6 * WAD / 100,
        rate: 0,
    };
    Controller::new(params, oracle, 0).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// `max_borrowable` is the exact boundary: the returned amount always
    /// places, a fraction more never does.
    #[test]
    fn max_borrowable_boundary(
        collateral in 1_000_000_000u128..100_000_000_000_000_000_000u128,
        n_bands in 5i32..=50,
    ) {
        let c = fresh_market();
        let max = c.max_borrowable(collateral, n_bands).unwrap();
        prop_assume!(max > 0);

        prop_assert!(c.calculate_debt_n1(collateral, max, n_bands).is_ok());
        prop_assert_eq!(
            c.calculate_debt_n1(collateral, max + max / 1000 + 1, n_bands),
            Err(CascadeError::DebtTooHigh)
        );
    }

    /// Creating at the exact maximum always succeeds and registers the debt.
    #[test]
    fn create_at_the_boundary(
        collateral in 1_000_000_000u128..100_000_000_000_000_000_000u128,
        n_bands in 5i32..=50,
    ) {
        let mut c = fresh_market();
        let max = c.max_borrowable(collateral, n_bands).unwrap();
        prop_assume!(max > 0);
        // the equal split must leave at least a wei per band
        prop_assume!(collateral / n_bands as u128 > 0);

        c.create_loan(1, collateral, max, n_bands, 0).unwrap();
        prop_assert_eq!(c.debt(1, 0).unwrap(), max);
        prop_assert_eq!(c.total_debt(0).unwrap(), max);
    }
}
