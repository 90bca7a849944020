pub mod gstreamer;
pub mod metrics;
pub mod observers;
pub mod scheduling;
