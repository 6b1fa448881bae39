//! Investor ledger: live state, staged mutations, and the ledger operations.
//!
//! Operations never touch [`LedgerState`] directly. They run against a
//! [`Staged`] copy-on-write view and return the [`TransferBatch`] their
//! change depends on. The caller decides whether the staged change is
//! committed (see [`Engine`](crate::engine::Engine)); on any error the view
//! is simply dropped, which is what makes every rejection atomic.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use omea_core::asset::TransferBatch;
use omea_core::error::LedgerError;
use omea_core::fees::{split_deposit, split_principal, PrincipalSplit};
use omea_core::store::{Changeset, LedgerSnapshot};
use omea_core::types::{Address, Amount, Deposit, Investor, ProtocolState};

use crate::config::EngineConfig;
use crate::protocol;
use crate::referral;
use crate::settlement::{pending_reward, settle};

/// The authoritative in-memory ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerState {
    investors: HashMap<Address, Investor>,
    protocol: ProtocolState,
    launched: bool,
}

impl LedgerState {
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            investors: snapshot.investors,
            protocol: snapshot.protocol,
            launched: snapshot.launched,
        }
    }

    pub fn investor(&self, address: &Address) -> Option<&Investor> {
        self.investors.get(address)
    }

    pub fn protocol(&self) -> &ProtocolState {
        &self.protocol
    }

    pub fn launched(&self) -> bool {
        self.launched
    }

    /// Number of records, including referrer-only and bonus-only addresses.
    pub fn record_count(&self) -> usize {
        self.investors.len()
    }

    /// Make a staged change live.
    pub fn apply(&mut self, changes: StagedChanges) {
        for (address, after, _) in changes.investors {
            self.investors.insert(address, after);
        }
        if let Some((after, _)) = changes.protocol {
            self.protocol = after;
        }
        if let Some((after, _)) = changes.launched {
            self.launched = after;
        }
    }
}

/// Copy-on-write view over a [`LedgerState`].
pub struct Staged<'a> {
    base: &'a LedgerState,
    investors: BTreeMap<Address, Investor>,
    protocol: Option<ProtocolState>,
    launched: Option<bool>,
}

impl<'a> Staged<'a> {
    pub fn new(base: &'a LedgerState) -> Self {
        Self {
            base,
            investors: BTreeMap::new(),
            protocol: None,
            launched: None,
        }
    }

    pub fn investor(&self, address: &Address) -> Option<&Investor> {
        self.investors
            .get(address)
            .or_else(|| self.base.investor(address))
    }

    /// Mutable record for `address`, created empty if it does not exist yet.
    pub fn investor_mut(&mut self, address: Address) -> &mut Investor {
        let base = self.base;
        self.investors
            .entry(address)
            .or_insert_with(|| base.investor(&address).cloned().unwrap_or_default())
    }

    pub fn protocol(&self) -> &ProtocolState {
        self.protocol.as_ref().unwrap_or(&self.base.protocol)
    }

    pub fn protocol_mut(&mut self) -> &mut ProtocolState {
        let base = self.base.protocol;
        self.protocol.get_or_insert(base)
    }

    pub fn launched(&self) -> bool {
        self.launched.unwrap_or(self.base.launched)
    }

    pub fn set_launched(&mut self, launched: bool) {
        self.launched = Some(launched);
    }

    /// Detach the staged writes, paired with their before-images.
    pub fn into_changes(self) -> StagedChanges {
        let base = self.base;
        StagedChanges {
            investors: self
                .investors
                .into_iter()
                .map(|(address, after)| {
                    let before = base.investor(&address).cloned();
                    (address, after, before)
                })
                .collect(),
            protocol: self.protocol.map(|after| (after, base.protocol)),
            launched: self.launched.map(|after| (after, base.launched)),
        }
    }
}

/// Owned result of a staged operation: every write with its before-image.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagedChanges {
    /// (address, after, before). `before` is `None` for new records.
    investors: Vec<(Address, Investor, Option<Investor>)>,
    protocol: Option<(ProtocolState, ProtocolState)>,
    launched: Option<(bool, bool)>,
}

impl StagedChanges {
    pub fn is_empty(&self) -> bool {
        self.investors.is_empty() && self.protocol.is_none() && self.launched.is_none()
    }

    /// The writes that make this change durable.
    pub fn changeset(&self) -> Changeset {
        Changeset {
            upserts: self
                .investors
                .iter()
                .map(|(address, after, _)| (*address, after.clone()))
                .collect(),
            deletes: Vec::new(),
            protocol: self.protocol.map(|(after, _)| after),
            launched: self.launched.map(|(after, _)| after),
        }
    }

    /// The writes that undo [`changeset`](Self::changeset).
    pub fn rollback(&self) -> Changeset {
        let mut undo = Changeset::default();
        for (address, _, before) in &self.investors {
            match before {
                Some(record) => undo.upserts.push((*address, record.clone())),
                None => undo.deletes.push(*address),
            }
        }
        undo.protocol = self.protocol.map(|(_, before)| before);
        undo.launched = self.launched.map(|(_, before)| before);
        undo
    }
}

/// A staged operation's return value and the transfers it depends on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Applied<T> {
    pub value: T,
    pub batch: TransferBatch,
}

/// What a deposit did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepositReceipt {
    pub net_principal: Amount,
    /// Reward folded into the claimable balance before the deposit.
    pub settled_reward: Amount,
    pub first_deposit: bool,
    /// Referrer edge created by this deposit, if any.
    pub referrer: Option<Address>,
}

/// Record a deposit of `gross` for `investor` at `now`.
pub fn deposit(
    staged: &mut Staged<'_>,
    config: &EngineConfig,
    investor: Address,
    gross: Amount,
    referrer: Option<Address>,
    now: u64,
) -> Result<Applied<DepositReceipt>, LedgerError> {
    if gross == 0 {
        return Err(LedgerError::InvalidAmount);
    }
    if !staged.launched() {
        return Err(LedgerError::NotLaunched);
    }

    let settled_reward = settle(staged.investor_mut(investor), now, config.accrual)?;
    let split = split_deposit(gross)?;

    let first_deposit = !staged.investor(&investor).is_some_and(Investor::has_deposited);
    let mut linked = None;
    if first_deposit {
        if let Some(referrer) = referrer.filter(|r| !r.is_zero()) {
            match referral::link(staged, investor, referrer) {
                Ok(()) => linked = Some(referrer),
                Err(e) => debug!(%investor, %referrer, "referrer ignored: {e}"),
            }
        }
    }

    let record = staged.investor_mut(investor);
    record.deposits.push(Deposit {
        amount: split.net_principal,
        timestamp: now,
    });
    record.total_invested = record
        .total_invested
        .checked_add(split.net_principal)
        .ok_or(LedgerError::ArithmeticOverflow)?;

    protocol::record_deposit(staged.protocol_mut(), first_deposit, split.net_principal)?;

    let batch = TransferBatch::new(config.custody)
        .pull(investor, config.custody, gross)
        .push(config.dev_wallet, split.dev_fee)
        .push(config.marketing_wallet, split.marketing_fee);

    Ok(Applied {
        value: DepositReceipt {
            net_principal: split.net_principal,
            settled_reward,
            first_deposit,
            referrer: linked,
        },
        batch,
    })
}

/// Pay out all settled reward plus unclaimed bonus.
pub fn claim_all_reward(
    staged: &mut Staged<'_>,
    config: &EngineConfig,
    investor: Address,
    now: u64,
) -> Result<Applied<Amount>, LedgerError> {
    if !staged.launched() {
        return Err(LedgerError::NotLaunched);
    }

    let record = staged.investor_mut(investor);
    settle(record, now, config.accrual)?;
    let total = record
        .claimable_amount
        .checked_add(record.unclaimed_bonus())
        .ok_or(LedgerError::ArithmeticOverflow)?;
    if total == 0 {
        return Err(LedgerError::NothingToClaim);
    }

    record.claimable_amount = 0;
    record.bonus_claimed = record.bonus;
    record.total_claimed = record
        .total_claimed
        .checked_add(total)
        .ok_or(LedgerError::ArithmeticOverflow)?;

    protocol::record_claim(staged.protocol_mut(), total)?;

    Ok(Applied {
        value: total,
        batch: TransferBatch::new(config.custody).push(investor, total),
    })
}

/// Grant `amount` of bonus to `investor`. Admin only.
///
/// Returns the investor's new lifetime bonus.
pub fn add_bonus(
    staged: &mut Staged<'_>,
    config: &EngineConfig,
    caller: Address,
    investor: Address,
    amount: Amount,
    now: u64,
) -> Result<Applied<Amount>, LedgerError> {
    if caller != config.admin {
        return Err(LedgerError::Unauthorized);
    }
    if amount == 0 {
        return Err(LedgerError::InvalidAmount);
    }

    let record = staged.investor_mut(investor);
    settle(record, now, config.accrual)?;
    let new_bonus = config.bonus_ceiling.check(record.bonus, amount)?;
    record.bonus = new_bonus;

    protocol::record_bonus(staged.protocol_mut(), amount)?;

    Ok(Applied {
        value: new_bonus,
        batch: TransferBatch::new(config.custody),
    })
}

/// Withdraw `amount` of principal, less the principal fee.
pub fn withdraw_principal(
    staged: &mut Staged<'_>,
    config: &EngineConfig,
    investor: Address,
    amount: Amount,
    now: u64,
) -> Result<Applied<PrincipalSplit>, LedgerError> {
    if !staged.launched() {
        return Err(LedgerError::NotLaunched);
    }
    if amount == 0 {
        return Err(LedgerError::InvalidAmount);
    }

    let record = staged.investor_mut(investor);
    settle(record, now, config.accrual)?;
    if amount > record.total_invested {
        return Err(LedgerError::InsufficientPrincipal {
            have: record.total_invested,
            need: amount,
        });
    }
    let split = split_principal(amount)?;
    record.total_invested -= amount;
    record.total_withdrawn = record
        .total_withdrawn
        .checked_add(amount)
        .ok_or(LedgerError::ArithmeticOverflow)?;

    protocol::record_withdrawal(staged.protocol_mut(), amount)?;

    Ok(Applied {
        value: split,
        batch: TransferBatch::new(config.custody).push(investor, split.payout),
    })
}

/// Open the protocol for deposits. Admin only, once.
pub fn launch(staged: &mut Staged<'_>, config: &EngineConfig, caller: Address) -> Result<Applied<()>, LedgerError> {
    if caller != config.admin {
        return Err(LedgerError::Unauthorized);
    }
    if staged.launched() {
        return Err(LedgerError::AlreadyLaunched);
    }
    staged.set_launched(true);
    Ok(Applied {
        value: (),
        batch: TransferBatch::new(config.custody),
    })
}

/// Reward `investor` would have at `now`: settled plus pending.
///
/// Unclaimed bonus is not included; it is paid on top by a claim.
pub fn claimable_at(state: &LedgerState, config: &EngineConfig, investor: &Address, now: u64) -> Result<Amount, LedgerError> {
    let Some(record) = state.investor(investor) else {
        return Ok(0);
    };
    let pending = pending_reward(record, now, config.accrual)?;
    record
        .claimable_amount
        .checked_add(pending)
        .ok_or(LedgerError::ArithmeticOverflow)
}
