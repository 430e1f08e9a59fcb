use chrono::{DateTime, Utc};
use serde::Serialize;

/// A block as reported by the indexer.
///
/// `parent` is always a stub carrying only `hash` and `height`, so a decoded
/// block never expands into its ancestors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Block {
    /// Hex-encoded block hash.
    pub hash: String,
    /// Height of the block.
    pub height: u64,
    /// Protocol version the block was produced with.
    pub protocol_version: u32,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Hex-encoded author, if any.
    pub author: Option<String>,
    /// Stub of the parent block.
    pub parent: Option<Box<Block>>,
    /// Transactions included in the block, in order.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a stub block carrying only its hash and height.
    pub fn stub(hash: impl Into<String>, height: u64) -> Self {
        Self {
            hash: hash.into(),
            height,
            ..Default::default()
        }
    }

    /// Returns `true` if only hash and height are populated.
    pub fn is_stub(&self) -> bool {
        self.protocol_version == 0
            && self.timestamp == 0
            && self.author.is_none()
            && self.parent.is_none()
            && self.transactions.is_empty()
    }

    /// Wall-clock time of the block, derived from `timestamp`.
    /// Returns `None` if the timestamp is outside the representable range.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.timestamp).ok()?;
        DateTime::from_timestamp(secs, 0)
    }
}

/// A transaction as reported by the indexer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transaction {
    /// Hex-encoded transaction hash.
    pub hash: String,
    /// Protocol version of the transaction.
    pub protocol_version: u32,
    /// Outcome of applying the transaction, e.g. `SucceedEntirely`.
    pub apply_stage: String,
    /// Hex-encoded identifiers of the transaction.
    pub identifiers: Vec<String>,
    /// Hex-encoded raw transaction.
    pub raw: String,
    /// Hex-encoded merkle tree root.
    pub merkle_tree_root: String,
    /// Contract actions performed by the transaction, in order.
    pub contract_actions: Vec<ContractAction>,
    /// Stub of the block containing the transaction.
    pub block: Option<Box<Block>>,
}

/// Discriminant of a [`ContractAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContractActionKind {
    Call,
    Deploy,
    Update,
}

/// An action performed on a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ContractAction {
    /// A call of a contract entry point.
    Call(ContractCall),
    /// The deployment of a contract.
    Deploy(ContractDeploy),
    /// A maintenance update of a contract.
    Update(ContractUpdate),
}

/// A call of a contract entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractCall {
    /// Hex-encoded contract address.
    pub address: String,
    /// Hex-encoded contract state.
    pub state: String,
    /// Hex-encoded chain state.
    pub chain_state: String,
    /// The transaction that performed the call.
    pub transaction: Box<Transaction>,
    /// Hex-encoded entry point that was invoked.
    pub entry_point: String,
    /// The deployment of the called contract, when the server included it.
    pub deploy: Option<Box<ContractDeploy>>,
}

/// The deployment of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractDeploy {
    /// Hex-encoded contract address.
    pub address: String,
    /// Hex-encoded contract state.
    pub state: String,
    /// Hex-encoded chain state.
    pub chain_state: String,
    /// The transaction that deployed the contract.
    pub transaction: Box<Transaction>,
}

/// A maintenance update of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractUpdate {
    /// Hex-encoded contract address.
    pub address: String,
    /// Hex-encoded contract state.
    pub state: String,
    /// Hex-encoded chain state.
    pub chain_state: String,
    /// The transaction that performed the update.
    pub transaction: Box<Transaction>,
}

impl ContractAction {
    /// Which variant this action is.
    pub fn kind(&self) -> ContractActionKind {
        match self {
            ContractAction::Call(_) => ContractActionKind::Call,
            ContractAction::Deploy(_) => ContractActionKind::Deploy,
            ContractAction::Update(_) => ContractActionKind::Update,
        }
    }

    /// Hex-encoded contract address.
    pub fn address(&self) -> &str {
        match self {
            ContractAction::Call(c) => &c.address,
            ContractAction::Deploy(d) => &d.address,
            ContractAction::Update(u) => &u.address,
        }
    }

    /// Hex-encoded contract state.
    pub fn state(&self) -> &str {
        match self {
            ContractAction::Call(c) => &c.state,
            ContractAction::Deploy(d) => &d.state,
            ContractAction::Update(u) => &u.state,
        }
    }

    /// Hex-encoded chain state.
    pub fn chain_state(&self) -> &str {
        match self {
            ContractAction::Call(c) => &c.chain_state,
            ContractAction::Deploy(d) => &d.chain_state,
            ContractAction::Update(u) => &u.chain_state,
        }
    }

    /// The transaction that performed the action.
    pub fn transaction(&self) -> &Transaction {
        match self {
            ContractAction::Call(c) => &c.transaction,
            ContractAction::Deploy(d) => &d.transaction,
            ContractAction::Update(u) => &u.transaction,
        }
    }
}

/// Progress of the wallet indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    /// Highest zswap state index seen by the indexer.
    pub highest_index: u64,
    /// Highest index relevant to any connected wallet.
    pub highest_relevant_index: u64,
    /// Highest index relevant to this wallet.
    pub highest_relevant_wallet_index: u64,
}

/// A transaction relevant to the wallet, with the index range `[start, end)` it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelevantTransaction {
    /// The relevant transaction.
    pub transaction: Transaction,
    /// First index covered.
    pub start: u64,
    /// End of the covered range, exclusive.
    pub end: u64,
}

/// Event emitted by the wallet subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum WalletSyncEvent {
    /// Indexing progress for the session.
    ProgressUpdate(ProgressUpdate),
    /// A transaction relevant to the wallet.
    RelevantTransaction(RelevantTransaction),
}

impl WalletSyncEvent {
    /// Returns the progress update, if this is one.
    pub fn as_progress(&self) -> Option<&ProgressUpdate> {
        match self {
            WalletSyncEvent::ProgressUpdate(p) => Some(p),
            WalletSyncEvent::RelevantTransaction(_) => None,
        }
    }

    /// Returns the relevant transaction, if this is one.
    pub fn as_relevant_transaction(&self) -> Option<&RelevantTransaction> {
        match self {
            WalletSyncEvent::RelevantTransaction(t) => Some(t),
            WalletSyncEvent::ProgressUpdate(_) => None,
        }
    }
}

/// Collapsed merkle tree update for the index range `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MerkleTreeCollapsedUpdate {
    /// Protocol version of the update.
    pub protocol_version: u32,
    /// First index covered.
    pub start: u64,
    /// End of the covered range, exclusive.
    pub end: u64,
    /// Hex-encoded update.
    pub update: String,
}
