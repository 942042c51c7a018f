#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # AgriLink Core
//!
//! Rust core for the consultation lifecycle and real-time assignment engine
//! behind the AgriLink farmer/expert platform.
//!
//! ## Overview
//!
//! A consultation request moves from creation through assignment to a live
//! session and a terminal state. This crate owns the hard guarantees along
//! that path: at-most-one assignment under concurrent claims, a transition
//! order that survives retries and partial failures, and real-time fan-out
//! of state changes to farmers, experts, and administrators without
//! duplication or loss.
//!
//! The platform's UI, authentication, media transport, and persistent store
//! are external collaborators consumed behind traits.
//!
//! ## Architecture
//!
//! - **StateMachine**: pure validation and application of status transitions
//! - **ClaimCoordinator**: race-free accept of pending requests through
//!   conditional writes; exactly one winner per request
//! - **EventRouter**: per-observer delivery of store change events, exactly
//!   once per record version, with reconnect-replay dedup
//! - **NotificationPolicy**: per-role notification rules with actor
//!   self-suppression
//! - **SessionController**: keeps the live call and the record status in
//!   step, compensating when media acquisition fails
//! - **ConsultationEngine**: the per-client facade wiring it all together
//!
//! ## Module Organization
//!
//! - [`models`] - Consultation record, identities, capabilities
//! - [`state_machine`] - Transition table, events, guards
//! - [`store`] - Store trait, change feed, in-memory stand-in
//! - [`claim`] - Claim coordination
//! - [`events`] - Event routing and subscriptions
//! - [`notify`] - Notification policy
//! - [`session`] - Live-session orchestration
//! - [`engine`] - The exposed facade
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agrilink_core::config::EngineConfig;
//! use agrilink_core::engine::ConsultationEngine;
//! use agrilink_core::models::{CurrentUser, StaticIdentity};
//! use agrilink_core::store::InMemoryConsultationStore;
//! # use agrilink_core::session::{MediaError, MediaSessionProvider, SessionHandle};
//! # struct NoMedia;
//! # #[async_trait::async_trait]
//! # impl MediaSessionProvider for NoMedia {
//! #     async fn acquire(&self, consultation_id: uuid::Uuid) -> Result<SessionHandle, MediaError> {
//! #         Ok(SessionHandle { session_id: uuid::Uuid::new_v4(), consultation_id })
//! #     }
//! #     async fn release(&self, _handle: SessionHandle) -> Result<(), MediaError> { Ok(()) }
//! # }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryConsultationStore::default());
//! let identity = Arc::new(StaticIdentity(CurrentUser::farmer(uuid::Uuid::new_v4())));
//! let engine = ConsultationEngine::new(store, Arc::new(NoMedia), identity, EngineConfig::default());
//!
//! let request = engine.request_consultation("pest on tomato leaves", None).await?;
//! println!("requested consultation {}", request.consultation_id);
//! # Ok(())
//! # }
//! ```

pub mod claim;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod notify;
pub mod session;
pub mod state_machine;
pub mod store;

pub use claim::{ClaimCoordinator, ClaimError};
pub use config::{ConfigManager, EngineConfig, EventConfig, SessionConfig};
pub use engine::ConsultationEngine;
pub use error::{AgrilinkError, Result};
pub use events::{EventObserver, EventRouter, Interest, SubscriptionHandle};
pub use models::{Capability, Consultation, CurrentUser, IdentityProvider, NewConsultation};
pub use notify::NotificationPolicy;
pub use session::{MediaSessionProvider, SessionController, SessionError, SessionHandle};
pub use state_machine::{ConsultationEvent, ConsultationStatus, TransitionError};
pub use store::{ChangeEvent, ChangeKind, ConsultationStore, InMemoryConsultationStore, StoreError};
