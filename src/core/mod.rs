pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::WarConfig;
pub use error::{Result, TribeWarError};
pub use types::{ActorId, FactionId, Timestamp, WarId};
