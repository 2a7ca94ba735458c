pub mod due_queue;
pub mod engine;
pub mod evaluator;
pub mod scheduler;
pub mod session;

pub use crate::domain::model::{Card, CardId, OwnerId, Quality, SchedulingState};
pub use crate::domain::ports::{CardStore, Clock, ConfigProvider, Scorer};
pub use crate::utils::error::Result;
