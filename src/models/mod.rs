pub mod audit_event;
pub mod check_in;
pub mod event;
pub mod organization;
pub mod user;

pub use audit_event::AuditEvent;
pub use check_in::CheckIn;
pub use event::Event;
pub use organization::{Branch, Organization};
pub use user::{User, UserRow};
