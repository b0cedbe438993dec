//! # gpsd-bridge
//!
//! A bridge daemon that consumes position fix reports from GPSD (GPS Service
//! Daemon) and republishes them, as JSON, onto an IoT platform's MQTT message
//! bus.
//!
//! ## Overview
//!
//! GPSD is a service daemon that monitors one or more GPSes attached to a host
//! computer, making all data on the location/course/velocity of the sensors
//! available on TCP port 2947 of the host computer.
//!
//! This crate implements the forwarding core of the bridge: it authenticates
//! with the remote platform (retrying indefinitely until the platform accepts
//! the device), fetches the adapter's remote configuration record on a
//! best-effort basis, connects to the platform's MQTT bus, and then streams
//! TPV (time/position/velocity) reports from GPSD to the configured topic for
//! the lifetime of the process.
//!
//! ## Example
//!
//! ```ignore
//! use gpsd_bridge::config::AdapterConfig;
//! use gpsd_bridge::{bus, forwarder};
//!
//! async fn example() -> gpsd_bridge::Result<()> {
//!     let config = AdapterConfig::default();
//!     let (handle, _events) = bus::connect("localhost:1883", "bridge-42").await?;
//!     forwarder::start(config, handle).await
//! }
//! ```

use crate::error::BridgeError;

/// Message-bus connection handling and the publish seam
pub mod bus;

/// In-memory adapter configuration with defaults and remote merge rules
pub mod config;

/// Client for the GPS daemon's JSON protocol
pub mod daemon;

/// Error types used throughout the crate
pub mod error;

/// The report forwarding loop bridging GPSD and the message bus
pub mod forwarder;

/// Best-effort remote configuration loading
pub mod loader;

/// REST client for platform authentication and collection queries
pub mod platform;

/// Fixed-delay retry policy for the startup sequence
pub mod retry;

/// Convenience type alias for Results with BridgeError
pub type Result<T> = core::result::Result<T, BridgeError>;
