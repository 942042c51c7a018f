//! Data layer: the consultation record and the identities acting on it.

pub mod consultation;
pub mod identity;

pub use consultation::{Consultation, ConsultationPatch, NewConsultation};
pub use identity::{Capability, CurrentUser, IdentityProvider, StaticIdentity};
