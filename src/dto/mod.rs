//! Request payloads and derived view projections.

pub mod requests;
pub mod validation;
pub mod view;

pub use requests::{CreateRoomRequest, JoinRoomRequest, QuestionInput};
pub use view::{ReadyCount, RoomView, StandingRow, VoteProgress};
