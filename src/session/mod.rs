pub mod controller;

pub use controller::{
    MediaError, MediaSessionProvider, SessionController, SessionError, SessionHandle,
};
