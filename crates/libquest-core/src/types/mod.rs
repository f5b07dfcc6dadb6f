pub mod ids;
pub mod event;
pub mod quest;

pub use ids::{QuestId, QuestStep};
pub use event::{EventContext, QuestEvent, QuestEventType};
pub use quest::{ActiveQuest, BatchUpdate, QuestProgressState, QuestSnapshot};
