//! Demo world construction: one market, a few stabilization pools, and a
//! set of seeded borrower positions for the keeper to watch.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};
use cascade_common::{Timestamp, UserId, SECONDS_PER_YEAR, WAD};
use cascade_controller::{Controller, ControllerParams};
use cascade_oracle::{PriceOracle, StaticOracle};
use cascade_policy::mock::MockMarket;
use cascade_policy::{Factory, MonetaryPolicy, SharedDebtSource};

use crate::config::Config;

fn bps(value: u32) -> u128 {
    value as u128 * WAD / 10_000
}

pub struct World {
    pub controller: Rc<RefCell<Controller>>,
    pub factory: Rc<RefCell<Factory>>,
    pub policy: MonetaryPolicy,
    pub collateral_oracle: Rc<StaticOracle>,
    pub stable_oracle: Rc<StaticOracle>,
    pub borrowers: Vec<UserId>,
}

impl World {
    pub fn build(config: &Config, now: Timestamp) -> Result<Self> {
        let collateral_oracle = Rc::new(StaticOracle::new(
            config.market.base_price_tokens as u128 * WAD,
        ));
        let oracle_dyn: Rc<dyn PriceOracle> = collateral_oracle.clone();

        let params = ControllerParams {
            a: config.market.amplification,
            base_price: config.market.base_price_tokens as u128 * WAD,
            amm_fee: bps(config.market.amm_fee_bps),
            loan_discount: bps(config.market.loan_discount_bps),
            liquidation_discount: bps(config.market.liquidation_discount_bps),
            rate: bps(config.policy.rate0_apr_bps) / SECONDS_PER_YEAR,
        };
        let controller = Rc::new(RefCell::new(
            Controller::new(params, oracle_dyn, now).context("building controller")?,
        ));

        let factory = Rc::new(RefCell::new(Factory::new()));
        factory.borrow_mut().add_market(
            Rc::new(SharedDebtSource(controller.clone())),
            1_000_000 * WAD,
        );

        let peg_keepers: Vec<Rc<dyn cascade_common::DebtSource>> = (0..config.policy.peg_keepers)
            .map(|_| {
                Rc::new(MockMarket::new(
                    config.policy.peg_keeper_debt_tokens as u128 * WAD,
                )) as Rc<dyn cascade_common::DebtSource>
            })
            .collect();

        let stable_oracle = Rc::new(StaticOracle::new(WAD));
        let policy = MonetaryPolicy::new(
            stable_oracle.clone(),
            factory.clone(),
            peg_keepers,
            bps(config.policy.rate0_apr_bps) / SECONDS_PER_YEAR,
            bps(config.policy.sigma_bps),
            bps(config.policy.target_debt_fraction_bps),
        )
        .context("building monetary policy")?;

        // seed borrower positions; user 0 is reserved for the keeper itself
        let collateral = config.borrowers.collateral_tokens as u128 * WAD;
        let mut borrowers = Vec::new();
        for user in 1..=config.borrowers.count {
            let mut ctrl = controller.borrow_mut();
            let max = ctrl
                .max_borrowable(collateral, config.borrowers.n_bands)
                .context("sizing demo loan")?;
            let debt = max * config.borrowers.utilization_bps as u128 / 10_000;
            ctrl.create_loan(user, collateral, debt, config.borrowers.n_bands, now)
                .context("seeding demo loan")?;
            borrowers.push(user);
        }

        Ok(Self {
            controller,
            factory,
            policy,
            collateral_oracle,
            stable_oracle,
            borrowers,
        })
    }
}
