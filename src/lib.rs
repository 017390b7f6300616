//! ragchat - conversation client for a retrieval-augmented chat backend
//!
//! The core is a session manager driven by a pure state machine: it keeps
//! an ordered transcript of user and assistant turns, sends each question
//! with the prior turns as history, and records backend failures as a
//! single displayable error. PDF upload to the backend's index sits beside
//! it and never touches the transcript.

pub mod config;
pub mod gateway;
pub mod session;
pub mod state_machine;
pub mod transcript;
pub mod upload;

pub use config::ClientConfig;
pub use gateway::{DocumentIngest, Gateway, GatewayError, HttpGateway, LoggingGateway};
pub use session::{ExchangeOutcome, SessionError, SessionEvent, SessionManager, SessionSnapshot};
pub use transcript::{Citation, Role, Turn};
pub use upload::{UploadError, UploadStatus, UploadTracker};
