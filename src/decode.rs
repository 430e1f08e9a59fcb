//! Decoding of raw indexer responses into the typed entities of [`crate::model`].
//!
//! Backward references (a block's parent, a transaction's block) are truncated
//! to stubs carrying only hash and height. Forward references (a block's
//! transactions, a transaction's contract actions) are decoded in full.
//!
//! Contract actions and wallet events are resolved from the fields present in
//! the fragment:
//! - a contract action with an `entryPoint` field is a call, even when a
//!   `__typename` says otherwise; else `__typename == "ContractDeploy"` makes
//!   it a deploy; anything else is an update.
//! - a wallet event with a `highestIndex` field is a progress update,
//!   anything else is a relevant transaction.

use displaydoc::Display;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use crate::model::{
    Block, ContractAction, ContractActionKind, ContractCall, ContractDeploy, ContractUpdate,
    MerkleTreeCollapsedUpdate, ProgressUpdate, RelevantTransaction, Transaction, WalletSyncEvent,
};

/// Represents errors raised when a response fragment does not match the expected shape.
#[derive(Debug, Display, Error)]
pub enum DecodeError {
    /// Response has no `{field}` field
    MissingRoot { field: &'static str },
    /// Missing field `{field}` for {entity}
    MissingField {
        entity: &'static str,
        field: &'static str,
    },
    /// Expected a list of {entity}
    NotAList { entity: &'static str },
    /// Malformed {entity} fragment: {source}
    Malformed {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Type discriminator value marking a deploy action.
const CONTRACT_DEPLOY_TYPENAME: &str = "ContractDeploy";

/// Looks up the root field of a response.
/// Returns `Ok(None)` when the field is `null`, an error when it is missing.
pub fn root<'a>(data: &'a Value, field: &'static str) -> Result<Option<&'a Value>, DecodeError> {
    match data.get(field) {
        Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(value)),
        None => Err(DecodeError::MissingRoot { field }),
    }
}

/// Like [`root`], but a `null` value is an error too.
pub fn required_root<'a>(data: &'a Value, field: &'static str) -> Result<&'a Value, DecodeError> {
    root(data, field)?.ok_or(DecodeError::MissingRoot { field })
}

/// Decodes a block fragment.
pub fn decode_block(value: &Value) -> Result<Block, DecodeError> {
    from_fragment::<RawBlock>("block", value)?.try_into()
}

/// Decodes a transaction fragment.
pub fn decode_transaction(value: &Value) -> Result<Transaction, DecodeError> {
    from_fragment::<RawTransaction>("transaction", value)?.try_into()
}

/// Decodes a contract action fragment into its resolved variant.
pub fn decode_contract_action(value: &Value) -> Result<ContractAction, DecodeError> {
    from_fragment::<RawContractAction>("contract action", value)?.try_into()
}

/// Decodes a wallet event fragment into its resolved variant.
pub fn decode_wallet_event(value: &Value) -> Result<WalletSyncEvent, DecodeError> {
    from_fragment::<RawWalletEvent>("wallet event", value)?.try_into()
}

/// Decodes a list of transactions. `null` is an empty list.
pub fn decode_transactions(value: Option<&Value>) -> Result<Vec<Transaction>, DecodeError> {
    match value {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items.iter().map(decode_transaction).collect(),
        Some(_) => Err(DecodeError::NotAList {
            entity: "transactions",
        }),
    }
}

/// Decodes the session id returned when connecting a wallet.
pub fn decode_session_id(value: &Value) -> Result<String, DecodeError> {
    from_fragment("session id", value)
}

/// Decodes a collapsed merkle tree update fragment.
pub fn decode_merkle_tree_update(value: &Value) -> Result<MerkleTreeCollapsedUpdate, DecodeError> {
    let raw: RawMerkleTreeUpdate = from_fragment("merkle tree update", value)?;
    Ok(MerkleTreeCollapsedUpdate {
        protocol_version: raw.protocol_version,
        start: raw.start,
        end: raw.end,
        update: raw.update,
    })
}

fn from_fragment<'a, T: Deserialize<'a>>(
    entity: &'static str,
    value: &'a Value,
) -> Result<T, DecodeError> {
    T::deserialize(value).map_err(|source| DecodeError::Malformed { entity, source })
}

/// Deserializes a field that is present, distinguishing `null` from absence.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
struct RawBlockRef {
    hash: String,
    height: u64,
}

impl From<RawBlockRef> for Block {
    fn from(raw: RawBlockRef) -> Self {
        Block::stub(raw.hash, raw.height)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlock {
    hash: String,
    height: u64,
    protocol_version: u32,
    timestamp: u64,
    author: Option<String>,
    parent: Option<RawBlockRef>,
    transactions: Vec<RawTransaction>,
}

impl TryFrom<RawBlock> for Block {
    type Error = DecodeError;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        Ok(Block {
            hash: raw.hash,
            height: raw.height,
            protocol_version: raw.protocol_version,
            timestamp: raw.timestamp,
            author: raw.author,
            parent: raw.parent.map(|p| Box::new(p.into())),
            transactions: raw
                .transactions
                .into_iter()
                .map(Transaction::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransaction {
    hash: String,
    protocol_version: u32,
    apply_stage: String,
    identifiers: Vec<String>,
    raw: String,
    merkle_tree_root: String,
    #[serde(default)]
    contract_actions: Vec<RawContractAction>,
    block: Option<RawBlockRef>,
}

impl TryFrom<RawTransaction> for Transaction {
    type Error = DecodeError;

    fn try_from(raw: RawTransaction) -> Result<Self, Self::Error> {
        Ok(Transaction {
            hash: raw.hash,
            protocol_version: raw.protocol_version,
            apply_stage: raw.apply_stage,
            identifiers: raw.identifiers,
            raw: raw.raw,
            merkle_tree_root: raw.merkle_tree_root,
            contract_actions: raw
                .contract_actions
                .into_iter()
                .map(ContractAction::try_from)
                .collect::<Result<_, _>>()?,
            block: raw.block.map(|b| Box::new(b.into())),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContractAction {
    address: String,
    state: String,
    chain_state: String,
    transaction: Option<Box<RawTransaction>>,
    #[serde(default, deserialize_with = "present")]
    entry_point: Option<Option<String>>,
    #[serde(rename = "__typename")]
    typename: Option<String>,
    deploy: Option<Box<RawContractAction>>,
}

impl RawContractAction {
    fn kind(&self) -> ContractActionKind {
        if self.entry_point.is_some() {
            ContractActionKind::Call
        } else if self.typename.as_deref() == Some(CONTRACT_DEPLOY_TYPENAME) {
            ContractActionKind::Deploy
        } else {
            ContractActionKind::Update
        }
    }

    fn into_deploy(self) -> Result<ContractDeploy, DecodeError> {
        Ok(ContractDeploy {
            transaction: decode_owning_transaction("contract deploy", self.transaction)?,
            address: self.address,
            state: self.state,
            chain_state: self.chain_state,
        })
    }
}

fn decode_owning_transaction(
    entity: &'static str,
    raw: Option<Box<RawTransaction>>,
) -> Result<Box<Transaction>, DecodeError> {
    let raw = raw.ok_or(DecodeError::MissingField {
        entity,
        field: "transaction",
    })?;
    Ok(Box::new(Transaction::try_from(*raw)?))
}

impl TryFrom<RawContractAction> for ContractAction {
    type Error = DecodeError;

    fn try_from(raw: RawContractAction) -> Result<Self, Self::Error> {
        match raw.kind() {
            ContractActionKind::Call => {
                let entry_point = raw.entry_point.flatten().ok_or(DecodeError::MissingField {
                    entity: "contract call",
                    field: "entryPoint",
                })?;
                Ok(ContractAction::Call(ContractCall {
                    transaction: decode_owning_transaction("contract call", raw.transaction)?,
                    deploy: raw
                        .deploy
                        .map(|d| (*d).into_deploy().map(Box::new))
                        .transpose()?,
                    address: raw.address,
                    state: raw.state,
                    chain_state: raw.chain_state,
                    entry_point,
                }))
            }
            ContractActionKind::Deploy => Ok(ContractAction::Deploy(raw.into_deploy()?)),
            ContractActionKind::Update => Ok(ContractAction::Update(ContractUpdate {
                transaction: decode_owning_transaction("contract update", raw.transaction)?,
                address: raw.address,
                state: raw.state,
                chain_state: raw.chain_state,
            })),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWalletEvent {
    #[serde(default, deserialize_with = "present")]
    highest_index: Option<Option<u64>>,
    highest_relevant_index: Option<u64>,
    highest_relevant_wallet_index: Option<u64>,
    transaction: Option<RawTransaction>,
    start: Option<u64>,
    end: Option<u64>,
}

impl TryFrom<RawWalletEvent> for WalletSyncEvent {
    type Error = DecodeError;

    fn try_from(raw: RawWalletEvent) -> Result<Self, Self::Error> {
        fn required<T>(
            value: Option<T>,
            entity: &'static str,
            field: &'static str,
        ) -> Result<T, DecodeError> {
            value.ok_or(DecodeError::MissingField { entity, field })
        }

        const PROGRESS: &str = "progress update";
        const RELEVANT: &str = "relevant transaction";

        if let Some(highest_index) = raw.highest_index {
            return Ok(WalletSyncEvent::ProgressUpdate(ProgressUpdate {
                highest_index: required(highest_index, PROGRESS, "highestIndex")?,
                highest_relevant_index: required(
                    raw.highest_relevant_index,
                    PROGRESS,
                    "highestRelevantIndex",
                )?,
                highest_relevant_wallet_index: required(
                    raw.highest_relevant_wallet_index,
                    PROGRESS,
                    "highestRelevantWalletIndex",
                )?,
            }));
        }

        Ok(WalletSyncEvent::RelevantTransaction(RelevantTransaction {
            transaction: required(raw.transaction, RELEVANT, "transaction")?.try_into()?,
            start: required(raw.start, RELEVANT, "start")?,
            end: required(raw.end, RELEVANT, "end")?,
        }))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMerkleTreeUpdate {
    protocol_version: u32,
    start: u64,
    end: u64,
    update: String,
}
