//! War state: records, registry, damage rules and the timer

pub mod abandoned;
pub mod authorization;
pub mod record;
pub mod registry;
pub mod timer;

pub use abandoned::AbandonedTracker;
pub use authorization::{DamageAuthorizer, DamageDecision, DamageTarget};
pub use record::{phase, Phase, Side, WarRecord};
pub use registry::{AcceptOutcome, CancelRequested, RegistrySnapshot, SideView, WarRegistry};
pub use timer::{TickReport, TimerDriver};
