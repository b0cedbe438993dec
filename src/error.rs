//! Error types for the bridge's network and protocol operations
//!
//! This module defines the error types that can occur while talking to the
//! GPS daemon, the remote platform, or the message bus.

/// Main error type for bridge operations
///
/// This enum represents all possible errors that can occur during
/// communication with the GPS daemon, the platform's REST API, or the
/// MQTT message bus.
#[derive(Debug)]
pub enum BridgeError {
    /// I/O error occurred during network communication
    ///
    /// This typically happens when the connection to the GPS daemon is lost,
    /// the daemon is unreachable, or there are network-related issues.
    Io(std::io::Error),

    /// JSON serialization/deserialization error
    ///
    /// Occurs when the GPS daemon sends malformed JSON or when a response
    /// doesn't match the expected message structure.
    Json(serde_json::Error),

    /// GPS daemon protocol-level error
    ///
    /// Indicates an error in the daemon protocol exchange, such as an
    /// unexpected message sequence or a missing acknowledgement.
    Daemon(&'static str),

    /// GPS daemon protocol version is not supported
    ///
    /// The tuple contains (major, minor) version numbers.
    /// The bridge requires protocol version 3.x compatibility.
    UnsupportedProtocolVersion((i32, i32)),

    /// The platform rejected the device authentication attempt
    Auth(String),

    /// The platform's REST API returned an unexpected response
    Platform(String),

    /// Transport error while calling the platform's REST API
    Http(reqwest::Error),

    /// A malformed network address was supplied
    Address(String),

    /// The message-bus connection could not be established
    Connect(rumqttc::ConnectionError),

    /// A message could not be handed to the message-bus client
    Publish(rumqttc::ClientError),
}

impl core::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::Io(err) => write!(f, "IoError: {}", err),
            BridgeError::Json(err) => write!(f, "JsonError: {}", err),
            BridgeError::Daemon(msg) => write!(f, "DaemonError: {}", msg),
            BridgeError::UnsupportedProtocolVersion((major, minor)) => {
                write!(f, "UnsupportedProtocolVersion: {}.{}", major, minor)
            }
            BridgeError::Auth(msg) => write!(f, "AuthError: {}", msg),
            BridgeError::Platform(msg) => write!(f, "PlatformError: {}", msg),
            BridgeError::Http(err) => write!(f, "HttpError: {}", err),
            BridgeError::Address(msg) => write!(f, "AddressError: {}", msg),
            BridgeError::Connect(err) => write!(f, "ConnectError: {}", err),
            BridgeError::Publish(err) => write!(f, "PublishError: {}", err),
        }
    }
}

impl core::error::Error for BridgeError {}
