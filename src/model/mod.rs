pub mod feedback;
pub mod interaction;
pub mod message;
pub mod user;

pub use feedback::{CommentEntry, FeedbackRecord, FeedbackUpdate};
pub use interaction::{derive_interactions, Interaction, InteractionUser};
pub use message::{canonical_message_id, Message, Rating, Role};
pub use user::{SessionSummary, UserSummary};
