//! GraphQL documents sent to the indexer.

macro_rules! transaction_fields {
    () => {
        "hash protocolVersion applyStage identifiers raw merkleTreeRoot"
    };
}

macro_rules! block_fields {
    () => {
        concat!(
            "hash height protocolVersion timestamp author parent { hash height } transactions { ",
            transaction_fields!(),
            " }"
        )
    };
}

macro_rules! contract_action_fields {
    () => {
        concat!(
            "__typename address state chainState transaction { ",
            transaction_fields!(),
            " } ... on ContractCall { entryPoint deploy { __typename address state chainState transaction { ",
            transaction_fields!(),
            " } } }"
        )
    };
}

pub(crate) const LATEST_BLOCK: &str = concat!("query { block { ", block_fields!(), " } }");

pub(crate) const BLOCK_BY_HASH: &str = concat!(
    "query ($hash: HexEncoded!) { block(offset: { hash: $hash }) { ",
    block_fields!(),
    " } }"
);

pub(crate) const BLOCK_BY_HEIGHT: &str = concat!(
    "query ($height: Int!) { block(offset: { height: $height }) { ",
    block_fields!(),
    " } }"
);

pub(crate) const CONTRACT_ACTION: &str = concat!(
    "query ($address: HexEncoded!) { contractAction(address: $address) { ",
    contract_action_fields!(),
    " } }"
);

pub(crate) const CONTRACT_ACTION_AT_BLOCK: &str = concat!(
    "query ($address: HexEncoded!, $hash: HexEncoded!) { ",
    "contractAction(address: $address, offset: { blockOffset: { hash: $hash } }) { ",
    contract_action_fields!(),
    " } }"
);

pub(crate) const TRANSACTIONS_BY_IDENTIFIER: &str = concat!(
    "query ($identifier: HexEncoded!) { transactions(offset: { identifier: $identifier }) { ",
    transaction_fields!(),
    " block { hash height } contractActions { ",
    contract_action_fields!(),
    " } } }"
);

pub(crate) const CONNECT: &str =
    "mutation ($viewingKey: ViewingKey!) { connect(viewingKey: $viewingKey) }";

pub(crate) const DISCONNECT: &str =
    "mutation ($sessionId: HexEncoded!) { disconnect(sessionId: $sessionId) }";

pub(crate) const BLOCKS_SUBSCRIPTION: &str = concat!(
    "subscription ($offset: BlockOffset) { blocks(offset: $offset) { ",
    block_fields!(),
    " } }"
);

pub(crate) const CONTRACT_ACTIONS_SUBSCRIPTION: &str = concat!(
    "subscription ($address: HexEncoded!, $offset: BlockOffset) { ",
    "contractActions(address: $address, offset: $offset) { ",
    contract_action_fields!(),
    " } }"
);

pub(crate) const WALLET_SUBSCRIPTION: &str = concat!(
    "subscription ($sessionId: HexEncoded!, $index: Int, $sendProgressUpdates: Boolean) { ",
    "wallet(sessionId: $sessionId, index: $index, sendProgressUpdates: $sendProgressUpdates) { ",
    "... on ProgressUpdate { highestIndex highestRelevantIndex highestRelevantWalletIndex } ",
    "... on RelevantTransaction { transaction { ",
    transaction_fields!(),
    " } start end } } }"
);
