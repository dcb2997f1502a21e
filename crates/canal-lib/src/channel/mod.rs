//! Bidirectional off-chain payment channels with on-chain settlement and
//! arbitration.

pub mod actions;
pub mod bill;
pub mod interest;
pub mod model;

#[cfg(test)]
mod tests;

pub use actions::{
    ChallengeBySubmitBill, ChannelAction, ChannelOnchainAtomicExchange, CloseChannel,
    CloseChannelBySetupAmount, CloseChannelBySetupOnlyLeft, FinalArbitrationSettlement,
    OpenChannel, TxSigners, UnilateralCloseByBill, UnilateralCloseByNothing,
};
pub use bill::{
    ChannelChainTransferProof, ChannelChainTransferProveBody, MustSign, OffChainBill,
    PayDirection, RealtimeReconciliation, MUST_SIGN_MAX, MUST_SIGN_MIN, TRANSFER_HOP_MAX,
    TRANSFER_HOP_MIN,
};
pub use interest::{accrue_interest, InterestOutcome, INTEREST_ERA_HEIGHT};
pub use model::{
    check_channel_create, Channel, ChannelArbitration, ChannelMark, ChannelSide, ChannelStatus,
    CHANNEL_AMOUNT_WIDTH, CHANNEL_LOCK_BLOCK,
};
