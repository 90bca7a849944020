mod publish_lifecycle;

pub use publish_lifecycle::{PublishLifecycle, StateTransition};
