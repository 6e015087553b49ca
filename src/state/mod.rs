//! Pure game rules: the state machine, the turn resolver, and room codes.
//!
//! Everything in this module computes over snapshots and returns patches
//! or verdicts; the services layer is responsible for fetching fresh
//! snapshots and writing the results back to the store.

pub mod codes;
pub mod machine;
pub mod order;

pub use machine::{
    InvalidTransition, REVEAL_HOLD_MS, RoomOp, ScoreAward, Settlement, StartBlocked,
    advance_patch, check_op, restart_batch, score_round, start_patch,
};
pub use order::{OwnerMatch, current_asker, is_owner, owner_match, resolve_order};
