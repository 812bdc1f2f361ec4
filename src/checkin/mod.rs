//! QR check-in windows for a single event or service.
//!
//! A [`CheckInSession`] is an in-memory object owned by whoever opened it.
//! Its phase and expiry are derived from the wall clock on every query and
//! are never stored. Durable storage of records happens outside this module.

pub mod payload;
pub mod qr;
pub mod registry;
pub mod session;

pub use payload::{CheckInSubject, GRACE_PERIOD_MINUTES, QrPayload, check_in_url, grace_period};
pub use qr::{QrEncoder, QrImage, SvgQrEncoder};
pub use registry::SessionRegistry;
pub use session::{
    CapacityStatus, CheckInMethod, CheckInRecord, CheckInSession, SessionPhase, capacity_status,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckInError {
    #[error("check-in session has no QR code yet")]
    NotMaterialized,
    #[error("QR code could not be generated: {0}")]
    Encoding(String),
}
