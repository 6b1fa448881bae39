//! JSON-RPC server for the OMEA node.
//!
//! Uses jsonrpsee 0.24. Amounts travel as decimal strings of base units and
//! addresses as `0x`-prefixed hex. The caller of a mutating method is an
//! explicit parameter; authenticating it is left to the transport in front
//! of the node.

use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};

use omea_core::error::{LedgerError, OmeaError};
use omea_core::types::{Address, Amount, Deposit, Investor};

use crate::journal::JournalEntry;
use crate::node::Node;

// --- Error codes ---

const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;
/// A ledger rule rejected the call.
const LEDGER_REJECTED: i32 = -32000;
/// The caller is not the administrator.
const UNAUTHORIZED: i32 = -32001;
/// The asset transfer failed.
const TRANSFER_FAILED: i32 = -32002;

/// Largest page `getTransfers` returns.
const MAX_TRANSFER_PAGE: usize = 1_000;

/// JSON representation of a deposit receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DepositResultJson {
    pub net_principal: String,
    pub settled_reward: String,
    pub first_deposit: bool,
    pub referrer: Option<String>,
}

/// JSON representation of a principal withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalJson {
    pub fee: String,
    pub payout: String,
}

/// JSON representation of one deposit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DepositJson {
    pub amount: String,
    pub timestamp: u64,
}

impl From<&Deposit> for DepositJson {
    fn from(d: &Deposit) -> Self {
        Self {
            amount: d.amount.to_string(),
            timestamp: d.timestamp,
        }
    }
}

/// JSON representation of an investor record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InvestorJson {
    pub total_invested: String,
    pub claimable_amount: String,
    pub bonus: String,
    pub bonus_claimed: String,
    pub total_claimed: String,
    pub total_withdrawn: String,
    pub referrer: Option<String>,
    pub referral_count: u64,
    pub deposit_count: usize,
    pub last_settled: u64,
}

impl From<&Investor> for InvestorJson {
    fn from(i: &Investor) -> Self {
        Self {
            total_invested: i.total_invested.to_string(),
            claimable_amount: i.claimable_amount.to_string(),
            bonus: i.bonus.to_string(),
            bonus_claimed: i.bonus_claimed.to_string(),
            total_claimed: i.total_claimed.to_string(),
            total_withdrawn: i.total_withdrawn.to_string(),
            referrer: i.referrer.map(|r| r.to_string()),
            referral_count: i.referral_count,
            deposit_count: i.deposits.len(),
            last_settled: i.last_settled,
        }
    }
}

/// JSON representation of the investment summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentInfoJson {
    pub total_investors: u64,
    pub total_value_locked: String,
}

/// JSON representation of a journaled transfer batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransferJson {
    pub seq: u64,
    pub recorded_at: u64,
    pub custody: String,
    pub legs: Vec<serde_json::Value>,
}

impl From<&JournalEntry> for TransferJson {
    fn from(e: &JournalEntry) -> Self {
        use omea_core::asset::TransferLeg;
        let legs = e
            .batch
            .legs
            .iter()
            .map(|leg| match leg {
                TransferLeg::Pull { from, to, amount } => serde_json::json!({
                    "kind": "pull",
                    "from": from.to_string(),
                    "to": to.to_string(),
                    "amount": amount.to_string(),
                }),
                TransferLeg::Push { to, amount } => serde_json::json!({
                    "kind": "push",
                    "to": to.to_string(),
                    "amount": amount.to_string(),
                }),
            })
            .collect();
        Self {
            seq: e.seq,
            recorded_at: e.recorded_at,
            custody: e.batch.custody.to_string(),
            legs,
        }
    }
}

fn rpc_error(code: i32, msg: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, msg.to_string(), None::<()>)
}

/// Map an engine error to a JSON-RPC error object.
fn engine_error(e: OmeaError) -> ErrorObjectOwned {
    let code = match &e {
        OmeaError::Ledger(LedgerError::Unauthorized) => UNAUTHORIZED,
        OmeaError::Ledger(_) | OmeaError::Referral(_) => LEDGER_REJECTED,
        OmeaError::Asset(_) => TRANSFER_FAILED,
        OmeaError::Address(_) => INVALID_PARAMS,
        OmeaError::Storage(_) | OmeaError::Config(_) => INTERNAL_ERROR,
    };
    rpc_error(code, &e.to_string())
}

/// Parse a `0x`-prefixed hex address.
fn parse_address(s: &str) -> Result<Address, ErrorObjectOwned> {
    s.parse()
        .map_err(|e| rpc_error(INVALID_PARAMS, &format!("invalid address {s:?}: {e}")))
}

/// Parse an optional referrer. Absent, empty and blank strings mean none.
fn parse_referrer(s: Option<&str>) -> Result<Option<Address>, ErrorObjectOwned> {
    match s.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_address(s).map(Some),
    }
}

/// Parse a decimal base-unit amount.
fn parse_amount(s: &str) -> Result<Amount, ErrorObjectOwned> {
    s.trim()
        .parse()
        .map_err(|_| rpc_error(INVALID_PARAMS, &format!("invalid amount {s:?}: expected a decimal integer")))
}

/// The OMEA JSON-RPC interface.
#[rpc(server)]
pub trait OmeaRpc {
    /// Deposits `amount` for `caller`, optionally naming a referrer.
    #[method(name = "deposit")]
    async fn deposit(
        &self,
        caller: String,
        amount: String,
        referrer: Option<String>,
    ) -> Result<DepositResultJson, ErrorObjectOwned>;

    /// Pays out all reward and bonus. Returns the amount paid.
    #[method(name = "claimAllReward")]
    async fn claim_all_reward(&self, caller: String) -> Result<String, ErrorObjectOwned>;

    /// Withdraws principal less the withdrawal fee.
    #[method(name = "withdrawPrincipal")]
    async fn withdraw_principal(&self, caller: String, amount: String) -> Result<WithdrawalJson, ErrorObjectOwned>;

    /// Grants bonus (administrator only). Returns the new lifetime bonus.
    #[method(name = "addBonus")]
    async fn add_bonus(&self, caller: String, investor: String, amount: String) -> Result<String, ErrorObjectOwned>;

    /// Opens the protocol for deposits (administrator only, once).
    #[method(name = "launchContract")]
    async fn launch_contract(&self, caller: String) -> Result<bool, ErrorObjectOwned>;

    /// Returns the hourly rate in basis points for a principal of `amount`.
    #[method(name = "getHPR")]
    async fn get_hpr(&self, amount: String) -> Result<u64, ErrorObjectOwned>;

    /// Returns an investor's settled plus pending reward right now.
    #[method(name = "getClaimableAmount")]
    async fn get_claimable_amount(&self, investor: String) -> Result<String, ErrorObjectOwned>;

    /// Returns an investor's deposit history.
    #[method(name = "depositsOf")]
    async fn deposits_of(&self, investor: String) -> Result<Vec<DepositJson>, ErrorObjectOwned>;

    /// Returns an investor record, or null for an unknown address.
    #[method(name = "investors")]
    async fn investors(&self, investor: String) -> Result<Option<InvestorJson>, ErrorObjectOwned>;

    /// Returns the protocol-wide investment summary.
    #[method(name = "getInvestmentInfo")]
    async fn get_investment_info(&self) -> Result<InvestmentInfoJson, ErrorObjectOwned>;

    /// Returns journaled transfer batches starting at sequence `from`.
    #[method(name = "getTransfers")]
    async fn get_transfers(&self, from: u64, limit: Option<usize>) -> Result<Vec<TransferJson>, ErrorObjectOwned>;

    /// Records an inbound transfer of the asset (administrator only).
    /// Returns the owner's new balance.
    #[method(name = "creditBalance")]
    async fn credit_balance(&self, caller: String, owner: String, amount: String) -> Result<String, ErrorObjectOwned>;

    /// Sets the allowance `caller` grants to `spender`.
    #[method(name = "approve")]
    async fn approve(&self, caller: String, spender: String, amount: String) -> Result<bool, ErrorObjectOwned>;

    /// Returns an account's balance in the node's asset book.
    #[method(name = "balanceOf")]
    async fn balance_of(&self, owner: String) -> Result<String, ErrorObjectOwned>;
}

/// Implementation of the OMEA JSON-RPC server.
pub struct RpcServerImpl {
    node: Arc<Node>,
}

impl RpcServerImpl {
    /// Create a new RPC server implementation wrapping the given node.
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }
}

#[async_trait]
impl OmeaRpcServer for RpcServerImpl {
    async fn deposit(
        &self,
        caller: String,
        amount: String,
        referrer: Option<String>,
    ) -> Result<DepositResultJson, ErrorObjectOwned> {
        let caller = parse_address(&caller)?;
        let amount = parse_amount(&amount)?;
        let referrer = parse_referrer(referrer.as_deref())?;
        let receipt = self.node.deposit(caller, amount, referrer).map_err(engine_error)?;
        Ok(DepositResultJson {
            net_principal: receipt.net_principal.to_string(),
            settled_reward: receipt.settled_reward.to_string(),
            first_deposit: receipt.first_deposit,
            referrer: receipt.referrer.map(|r| r.to_string()),
        })
    }

    async fn claim_all_reward(&self, caller: String) -> Result<String, ErrorObjectOwned> {
        let caller = parse_address(&caller)?;
        let paid = self.node.claim_all_reward(caller).map_err(engine_error)?;
        Ok(paid.to_string())
    }

    async fn withdraw_principal(&self, caller: String, amount: String) -> Result<WithdrawalJson, ErrorObjectOwned> {
        let caller = parse_address(&caller)?;
        let amount = parse_amount(&amount)?;
        let split = self.node.withdraw_principal(caller, amount).map_err(engine_error)?;
        Ok(WithdrawalJson {
            fee: split.fee.to_string(),
            payout: split.payout.to_string(),
        })
    }

    async fn add_bonus(&self, caller: String, investor: String, amount: String) -> Result<String, ErrorObjectOwned> {
        let caller = parse_address(&caller)?;
        let investor = parse_address(&investor)?;
        let amount = parse_amount(&amount)?;
        let total = self.node.add_bonus(caller, investor, amount).map_err(engine_error)?;
        Ok(total.to_string())
    }

    async fn launch_contract(&self, caller: String) -> Result<bool, ErrorObjectOwned> {
        let caller = parse_address(&caller)?;
        self.node.launch(caller).map_err(engine_error)?;
        Ok(true)
    }

    async fn get_hpr(&self, amount: String) -> Result<u64, ErrorObjectOwned> {
        let amount = parse_amount(&amount)?;
        u64::try_from(self.node.get_hpr(amount)).map_err(|e| rpc_error(INTERNAL_ERROR, &e.to_string()))
    }

    async fn get_claimable_amount(&self, investor: String) -> Result<String, ErrorObjectOwned> {
        let investor = parse_address(&investor)?;
        let amount = self.node.get_claimable_amount(&investor).map_err(engine_error)?;
        Ok(amount.to_string())
    }

    async fn deposits_of(&self, investor: String) -> Result<Vec<DepositJson>, ErrorObjectOwned> {
        let investor = parse_address(&investor)?;
        Ok(self.node.deposits_of(&investor).iter().map(DepositJson::from).collect())
    }

    async fn investors(&self, investor: String) -> Result<Option<InvestorJson>, ErrorObjectOwned> {
        let investor = parse_address(&investor)?;
        Ok(self.node.investor(&investor).as_ref().map(InvestorJson::from))
    }

    async fn get_investment_info(&self) -> Result<InvestmentInfoJson, ErrorObjectOwned> {
        let info = self.node.investment_info();
        Ok(InvestmentInfoJson {
            total_investors: info.total_investors,
            total_value_locked: info.total_value_locked.to_string(),
        })
    }

    async fn get_transfers(&self, from: u64, limit: Option<usize>) -> Result<Vec<TransferJson>, ErrorObjectOwned> {
        let limit = limit.unwrap_or(100).min(MAX_TRANSFER_PAGE);
        let entries = self.node.transfers(from, limit).map_err(engine_error)?;
        Ok(entries.iter().map(TransferJson::from).collect())
    }

    async fn credit_balance(&self, caller: String, owner: String, amount: String) -> Result<String, ErrorObjectOwned> {
        let caller = parse_address(&caller)?;
        let owner = parse_address(&owner)?;
        let amount = parse_amount(&amount)?;
        let balance = self.node.credit(caller, owner, amount).map_err(engine_error)?;
        Ok(balance.to_string())
    }

    async fn approve(&self, caller: String, spender: String, amount: String) -> Result<bool, ErrorObjectOwned> {
        let caller = parse_address(&caller)?;
        let spender = parse_address(&spender)?;
        let amount = parse_amount(&amount)?;
        self.node.approve(caller, spender, amount).map_err(engine_error)?;
        Ok(true)
    }

    async fn balance_of(&self, owner: String) -> Result<String, ErrorObjectOwned> {
        let owner = parse_address(&owner)?;
        let balance = self.node.balance_of(&owner).map_err(engine_error)?;
        Ok(balance.to_string())
    }
}

/// Start the JSON-RPC server on the given address.
///
/// Returns a [`ServerHandle`] that can be used to stop the server.
pub async fn start_rpc_server(addr: &str, node: Arc<Node>) -> Result<ServerHandle, OmeaError> {
    let server = Server::builder()
        .build(addr)
        .await
        .map_err(|e| OmeaError::Config(format!("RPC server error: {e}")))?;

    let rpc_impl = RpcServerImpl::new(node);
    let handle = server.start(rpc_impl.into_rpc());

    Ok(handle)
}
