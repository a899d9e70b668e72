//! Agendo Session — identity, business onboarding, license lifecycle,
//! real-time license monitoring, bookings, digital records and the
//! per-user session state machine.
//!
//! Every service is generic over [`agendo_core::store::Store`] and is
//! constructed explicitly with the store handle and a clock.

pub mod appointments;
pub mod business;
pub mod config;
pub mod error;
pub mod guard;
pub mod identity;
pub mod license;
pub mod monitor;
pub mod password;
pub mod records;
pub mod session;

pub use appointments::AppointmentBook;
pub use business::BusinessDirectory;
pub use config::SessionConfig;
pub use error::IdentityError;
pub use identity::{Identity, IdentityProvider, LocalIdentityProvider};
pub use license::{LicenseManager, SweepReport, spawn_license_sweeper};
pub use monitor::{LicenseMonitor, LicenseWatch};
pub use records::RecordBook;
pub use session::{Registration, Session, SessionState};
