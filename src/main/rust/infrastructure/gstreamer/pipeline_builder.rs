use crate::domain::value_objects::{PublishUrl, VideoConfig};

/// Element names the adapters look up after parsing
pub const VIDEO_ENCODER_NAME: &str = "venc";
pub const VIDEO_VALVE_NAME: &str = "videovalve";
pub const AUDIO_VALVE_NAME: &str = "audiovalve";
pub const ENCODED_SINK_NAME: &str = "encsink";
pub const TRANSPORT_SOURCE_NAME: &str = "flvsrc";
pub const TRANSPORT_SINK_NAME: &str = "rtmpsink";

/// Media buffered ahead of the RTMP sink while it connects
const TRANSPORT_QUEUE_TIME_NS: u64 = 3_000_000_000;

/// AAC bitrate for the microphone branch
const AUDIO_BITRATE: u32 = 128_000;

/// Keyframe every two seconds at 30 fps
const KEYFRAME_INTERVAL: u32 = 60;

/// What the capture pipeline is built from
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureLayout<'a> {
    pub device: Option<&'a str>,
    pub preview_sink: &'a str,
    pub video: &'a VideoConfig,
    pub with_audio: bool,
}

pub struct PipelineBuilder;

impl PipelineBuilder {
    /// Camera preview and encoder in one pipeline.
    ///
    /// A tee keeps the preview running while publishing; the encoder branches
    /// sit behind valves that stay closed until the stream starts. Muxed FLV
    /// leaves through an appsink.
    pub fn build_capture_pipeline(layout: &CaptureLayout<'_>) -> String {
        let source = match layout.device {
            Some(device) => format!("v4l2src device={}", device),
            None => "autovideosrc".to_string(),
        };

        let mut pipeline = format!(
            "{source} ! videoconvert ! tee name=t \
             t. ! queue ! videoconvert ! {preview} \
             t. ! queue leaky=downstream max-size-buffers=5 ! \
             valve name={video_valve} drop=true ! \
             videoscale ! videoconvert ! \
             video/x-raw,format=I420,width={width},height={height} ! \
             x264enc name={encoder} bitrate={kbps} tune=zerolatency speed-preset=veryfast key-int-max={gop} ! \
             h264parse config-interval=-1 ! queue ! mux. ",
            source = source,
            preview = layout.preview_sink,
            video_valve = VIDEO_VALVE_NAME,
            width = layout.video.width(),
            height = layout.video.height(),
            encoder = VIDEO_ENCODER_NAME,
            kbps = layout.video.bitrate_kbps(),
            gop = KEYFRAME_INTERVAL,
        );

        if layout.with_audio {
            pipeline.push_str(&format!(
                "autoaudiosrc ! audioconvert ! audioresample ! \
                 valve name={audio_valve} drop=true ! \
                 voaacenc bitrate={audio_bitrate} ! aacparse ! queue ! mux. ",
                audio_valve = AUDIO_VALVE_NAME,
                audio_bitrate = AUDIO_BITRATE,
            ));
        }

        pipeline.push_str(&format!(
            "flvmux name=mux streamable=true ! appsink name={} sync=false",
            ENCODED_SINK_NAME
        ));

        pipeline
    }

    /// Muxed FLV in through an appsrc, out to the RTMP server.
    ///
    /// The queue holds a few seconds of media while the sink connects and
    /// drops the oldest buffers beyond that.
    pub fn build_transport_pipeline(url: &PublishUrl) -> String {
        format!(
            "appsrc name={source} is-live=true format=bytes caps=video/x-flv ! \
             queue leaky=downstream max-size-buffers=0 max-size-bytes=0 max-size-time={queue_ns} ! \
             rtmp2sink name={sink} location=\"{url}\"",
            source = TRANSPORT_SOURCE_NAME,
            queue_ns = TRANSPORT_QUEUE_TIME_NS,
            sink = TRANSPORT_SINK_NAME,
            url = url.as_str()
        )
    }

    /// Elements the capture pipeline needs for video
    pub fn video_elements() -> &'static [&'static str] {
        &[
            "videoconvert",
            "videoscale",
            "tee",
            "valve",
            "x264enc",
            "h264parse",
            "flvmux",
            "appsink",
        ]
    }

    /// Elements the capture pipeline needs for audio
    pub fn audio_elements() -> &'static [&'static str] {
        &[
            "autoaudiosrc",
            "audioconvert",
            "audioresample",
            "voaacenc",
            "aacparse",
        ]
    }
}
