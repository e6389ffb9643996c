/// One unit of payload handed to a [`crate::Sink`]. Deliberately opaque —
/// the engine's file handlers decide what goes in here, the sink forwarder
/// only batches and delivers it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord(pub serde_json::Value);

impl FileRecord {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }
}

impl From<serde_json::Value> for FileRecord {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}
