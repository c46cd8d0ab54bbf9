//! Hush wire types.
//!
//! JSON message shapes for the two external surfaces: the authentication
//! endpoint and the WebSocket relay channel. The server routes on
//! `thread_id` and timestamps; everything else it carries is opaque
//! base64-encoded ciphertext that it never parses.
//!
//! # Relay channel
//!
//! Client → server: `subscribe`, `unsubscribe`, `message`, `ping`.
//! Server → client: `subscribed`, `unsubscribed`, `message` (with server-side
//! `id` and `created_at` routing metadata added), `error`, `pong`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default cap on a single relay frame, in bytes of raw JSON.
///
/// Bounds memory per connection before any decoding happens. Deployments can
/// lower this through server configuration.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// Length of an AES-GCM IV after base64 decoding.
const IV_LEN: usize = 12;

/// Errors from decoding or validating wire frames.
///
/// These are transport-shape errors, reported before any cryptography runs;
/// they carry no information about keys or plaintext.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// Frame exceeds the configured size cap.
    #[error("frame too large: {got} bytes exceeds limit of {limit}")]
    FrameTooLarge {
        /// Configured frame size limit
        limit: usize,
        /// Actual frame size received
        got: usize,
    },

    /// Frame is not valid JSON for any known message type.
    #[error("malformed frame")]
    Malformed,

    /// `thread_id` is not 64 lowercase hex characters.
    #[error("invalid thread id shape")]
    ThreadIdShape,

    /// `ciphertext` or `iv` is not valid base64, or the IV has wrong length.
    #[error("invalid blob encoding")]
    BlobEncoding,
}

/// Body of `POST /auth`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// The submitted 12-word passphrase, whitespace tolerated.
    pub words: String,
}

/// Successful authentication response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Capability token granting relay access (not decryption).
    pub token: String,
    /// Hex-encoded KDF salt for client-side vault key derivation.
    pub kdf_salt: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
}

/// Uniform rejection body.
///
/// Deliberately content-free: the same shape is returned for a wrong
/// passphrase regardless of how close the attempt was or how many attempts
/// remain. Blocked origins differ only in HTTP status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRejection {
    /// Stable machine-readable error tag.
    pub error: String,
}

impl AuthRejection {
    /// The rejection sent for any failed credential check.
    pub fn invalid_credentials() -> Self {
        Self { error: "invalid_credentials".to_string() }
    }

    /// The rejection sent to a blocked origin.
    pub fn blocked() -> Self {
        Self { error: "access_denied".to_string() }
    }

    /// The rejection sent when an origin exceeds the request rate.
    pub fn rate_limited() -> Self {
        Self { error: "rate_limited".to_string() }
    }
}

/// Messages a client sends on the relay channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Begin receiving messages published to a thread.
    Subscribe {
        /// Opaque thread identifier (64 hex chars).
        thread_id: String,
    },

    /// Stop receiving messages for a thread.
    Unsubscribe {
        /// Opaque thread identifier (64 hex chars).
        thread_id: String,
    },

    /// Publish an encrypted message to a thread.
    ///
    /// The server persists and forwards `ciphertext` and `iv` without
    /// inspection.
    Message {
        /// Opaque thread identifier (64 hex chars).
        thread_id: String,
        /// Base64 ciphertext including the GCM tag.
        ciphertext: String,
        /// Base64 12-byte IV.
        iv: String,
    },

    /// Keepalive probe.
    Ping,
}

/// Messages the server sends on the relay channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Subscription acknowledged.
    Subscribed {
        /// Thread the subscription now covers.
        thread_id: String,
    },

    /// Unsubscription acknowledged.
    Unsubscribed {
        /// Thread the subscription no longer covers.
        thread_id: String,
    },

    /// A message published to a subscribed thread.
    ///
    /// Identical blob to what the publisher sent, plus the routing metadata
    /// (`id`, `created_at`) the server adds when persisting.
    Message {
        /// Server-assigned opaque message id.
        id: String,
        /// Thread the message belongs to.
        thread_id: String,
        /// Base64 ciphertext including the GCM tag.
        ciphertext: String,
        /// Base64 12-byte IV.
        iv: String,
        /// Server receive time, unix milliseconds.
        created_at: u64,
    },

    /// Generic error notification. Content-free beyond a stable tag.
    Error {
        /// Short machine-readable description.
        message: String,
    },

    /// Keepalive reply.
    Pong,
}

/// Decode and shape-validate a client frame.
///
/// Enforces the size cap before parsing, then checks that any `thread_id` is
/// 64 lowercase-insensitive hex characters. Blob contents are *not* decoded —
/// the relay treats them as opaque.
///
/// # Errors
///
/// [`ProtoError::FrameTooLarge`], [`ProtoError::Malformed`], or
/// [`ProtoError::ThreadIdShape`].
pub fn decode_client_frame(raw: &str, max_bytes: usize) -> Result<ClientFrame, ProtoError> {
    if raw.len() > max_bytes {
        return Err(ProtoError::FrameTooLarge { limit: max_bytes, got: raw.len() });
    }

    let frame: ClientFrame = serde_json::from_str(raw).map_err(|_| ProtoError::Malformed)?;

    match &frame {
        ClientFrame::Subscribe { thread_id }
        | ClientFrame::Unsubscribe { thread_id }
        | ClientFrame::Message { thread_id, .. } => {
            if !is_hex_64(thread_id) {
                return Err(ProtoError::ThreadIdShape);
            }
        },
        ClientFrame::Ping => {},
    }

    Ok(frame)
}

/// Encode blob bytes into the wire form.
pub fn encode_blob(ciphertext: &[u8], iv: &[u8; IV_LEN]) -> (String, String) {
    (BASE64.encode(ciphertext), BASE64.encode(iv))
}

/// Decode a wire blob back into bytes.
///
/// Used by receiving clients before decryption. The IV must decode to exactly
/// 12 bytes.
///
/// # Errors
///
/// Returns [`ProtoError::BlobEncoding`] for invalid base64 or a wrong-length
/// IV.
pub fn decode_blob(ciphertext: &str, iv: &str) -> Result<(Vec<u8>, [u8; IV_LEN]), ProtoError> {
    let ciphertext = BASE64.decode(ciphertext).map_err(|_| ProtoError::BlobEncoding)?;
    let iv_bytes = BASE64.decode(iv).map_err(|_| ProtoError::BlobEncoding)?;
    let iv: [u8; IV_LEN] = iv_bytes.try_into().map_err(|_| ProtoError::BlobEncoding)?;
    Ok((ciphertext, iv))
}

fn is_hex_64(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}
