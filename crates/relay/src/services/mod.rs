pub mod push_service;
pub mod relay_service;

pub use push_service::{FcmClient, PushDispatcher, PushError, PushProvider};
pub use relay_service::RelayService;
