mod publish_session;
mod session_runner;

pub use publish_session::{
    PublishSession, SessionPorts, AUTH_FAILED_REASON, CONNECTION_CLOSED_REASON,
};
pub use session_runner::{SessionCommand, SessionHandle, SessionRunner};
