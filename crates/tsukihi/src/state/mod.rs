//! Patient state: eight plain state groups owned by [`Patient`].
//!
//! Fields are public for reading; mutable access is only reachable
//! through the crate-private accessors on [`Patient`], so every write
//! goes through the updater layer.

pub mod art;
pub mod disease;
pub mod general;
pub mod monitoring;
pub mod patient;
pub mod peds;
pub mod proph;
pub mod tb;

pub use art::{ArtState, Cd4Envelope, ToxicityEffect};
pub use disease::DiseaseState;
pub use general::GeneralState;
pub use monitoring::{MonitoringState, PendingLabResult};
pub use patient::Patient;
pub use peds::{PedsState, PendingEidResult};
pub use proph::ProphState;
pub use tb::TbPatientState;
