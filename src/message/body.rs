use base64::Engine;
use serde::{Deserialize, Serialize};

/// Raw payload of a [`Message`](super::Message).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl MessageBody {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// Create a UTF-8 text body.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(value.into().into_bytes(), "text/plain")
    }

    /// Create a JSON body from any serializable value.
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_vec(value)?, "application/json"))
    }

    /// Create a body with bitcode (fast binary) serialization.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, bitcode::Error> {
        Ok(Self::new(bitcode::serialize(value)?, "application/x-bitcode"))
    }

    /// Decode a JSON body.
    pub fn to_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.bytes)
    }

    /// Decode a bitcode body.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, bitcode::Error> {
        bitcode::deserialize(&self.bytes)
    }

    /// The body as a string, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// Base64 rendering, used when the body is not printable.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Printable rendering for logs: UTF-8 when possible, base64 otherwise.
    pub fn display(&self) -> String {
        match self.as_str() {
            Some(text) => text.to_string(),
            None => format!("base64:{}", self.to_base64()),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
