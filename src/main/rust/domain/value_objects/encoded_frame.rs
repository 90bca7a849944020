/// A chunk of muxed, encoded media ready to be sent to the server
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFrame {
    data: Vec<u8>,
    pts_us: Option<u64>,
    keyframe: bool,
    header: bool,
}

impl EncodedFrame {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pts_us: None,
            keyframe: false,
            header: false,
        }
    }

    pub fn with_pts_us(mut self, pts_us: u64) -> Self {
        self.pts_us = Some(pts_us);
        self
    }

    pub fn with_keyframe(mut self, keyframe: bool) -> Self {
        self.keyframe = keyframe;
        self
    }

    /// Stream header (codec configuration) rather than payload
    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn pts_us(&self) -> Option<u64> {
        self.pts_us
    }

    pub fn is_keyframe(&self) -> bool {
        self.keyframe
    }

    pub fn is_header(&self) -> bool {
        self.header
    }
}
