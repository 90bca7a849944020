use crate::domain::value_objects::VideoConfig;

/// Port for camera/microphone capture and encoding.
///
/// Encoded output leaves the pipeline through the frame channel the
/// implementation was built with, never through this trait.
pub trait MediaPipeline: Send {
    /// Check that audio capture and encoding can start
    fn prepare_audio(&mut self) -> bool;

    /// Configure video capture and encoding for the given geometry and bitrate
    fn prepare_video(&mut self, config: &VideoConfig) -> bool;

    fn start_preview(&mut self);

    fn stop_preview(&mut self);

    fn switch_camera(&mut self);

    /// Change the encoder bitrate on the fly (bits per second)
    fn set_bitrate(&mut self, bitrate: u32);

    /// Start producing encoded audio+video frames
    fn start_stream(&mut self);

    fn stop_stream(&mut self);

    /// Hold encoded output back without stopping the encoder
    fn pause_forwarding(&mut self);

    fn resume_forwarding(&mut self);

    fn is_streaming(&self) -> bool;
}
