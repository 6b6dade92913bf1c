//! Services module

pub mod background_sync;
pub mod registration;
pub mod scheduler;

#[cfg(test)]
mod test_support;

pub use background_sync::{RecordFailure, SyncOutcome, SyncReport, UserSyncTask};
pub use registration::RegistrationRepository;
pub use scheduler::{SchedulerStatus, SyncScheduler};
