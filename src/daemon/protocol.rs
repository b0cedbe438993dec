//! GPS daemon JSON protocol subset
//!
//! The daemon speaks newline-delimited JSON over TCP: commands start with
//! '?' and end with ';', responses are JSON objects with a "class" field
//! indicating message type. The bridge only needs the slice of protocol
//! version 3 that covers subscribing to the report stream and recognizing
//! TPV fix reports; every other report class is carried as an opaque value
//! and ignored by the forwarding loop.
//!
//! # References
//!
//! - [GPSD Protocol Documentation](https://gpsd.io/gpsd_json.html)

use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use serde_with::skip_serializing_none;

use crate::{Result, error::BridgeError};

/// GPS fix mode reported in a TPV message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum FixMode {
    NotSeen = 0,
    NoFix = 1,
    Fix2D = 2,
    Fix3D = 3,
}

/// GPS fix status (standard, DGPS, RTK, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum FixStatus {
    /// Unknown status
    Unknown = 0,
    Gps = 1,
    /// with DGPS
    DGps = 2,
    /// with RTK Fixed
    RTKFixed = 3,
    /// with RTK Float
    RTKFloat = 4,
    /// with dead reckoning
    DR = 5,
    /// with GNSS + dead reckoning
    GnssDR = 6,
    /// time only (surveyed in, manual)
    Time = 7,
    /// simulated
    Simulated = 8,
    /// Precise Positioning Service (PPS)
    PpsFix = 9,
}

/// Time-Position-Velocity (TPV) report
///
/// The core GPS fix report, containing time, position, and velocity data.
/// The bridge treats it as a pass-through value: fields are decoded for
/// transport and re-encoded verbatim, and any field not modeled here is
/// preserved through the flattened `extra` map.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tpv {
    /// Device path that provided this data
    pub device: Option<String>,
    /// GPS time of fix
    pub time: Option<DateTime<Utc>>,
    /// GPS fix mode (NoFix, 2D, 3D)
    pub mode: FixMode,
    /// GPS fix status
    pub status: Option<FixStatus>,
    /// Latitude in degrees (positive = North)
    pub lat: Option<f64>,
    /// Longitude in degrees (positive = East)
    pub lon: Option<f64>,
    /// Altitude in meters (deprecated, use altMSL or altHAE)
    pub alt: Option<f64>,
    /// Altitude, height above ellipsoid, in meters
    #[serde(rename = "altHAE")]
    pub alt_hae: Option<f64>,
    /// Altitude, MSL (mean sea level) in meters
    #[serde(rename = "altMSL")]
    pub alt_msl: Option<f64>,
    /// Speed over ground in meters/second
    pub speed: Option<f64>,
    /// Climb/sink rate in meters per second
    pub climb: Option<f64>,
    /// True track (course over ground) in degrees
    pub track: Option<f64>,
    /// Magnetic track in degrees
    pub magtrack: Option<f64>,
    /// Estimated time error in seconds
    pub ept: Option<f64>,
    /// Longitude error estimate in meters
    pub epx: Option<f64>,
    /// Latitude error estimate in meters
    pub epy: Option<f64>,
    /// Estimated vertical error in meters
    pub epv: Option<f64>,
    /// Estimated horizontal position error in meters
    pub eph: Option<f64>,
    /// Estimated speed error in meters/second
    pub eps: Option<f64>,
    /// Estimated climb error in meters/second
    pub epc: Option<f64>,
    /// Estimated track error in degrees
    pub epd: Option<f64>,
    /// Spherical error probability in meters
    pub sep: Option<f64>,
    /// Current leap seconds (GPS-UTC offset)
    pub leapseconds: Option<i32>,
    /// Fields not modeled above, carried through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Daemon version banner
///
/// Sent once when a client connects; also answers `?VERSION;`.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
    /// Daemon release version string
    pub release: String,
    /// Git revision hash
    pub rev: String,
    /// Protocol major version number
    pub proto_major: i32,
    /// Protocol minor version number
    pub proto_minor: i32,
    /// Remote server URL (if applicable)
    pub remote: Option<String>,
}

/// Watch policy, used both to request streaming and in the acknowledgement
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Watch {
    pub device: Option<String>,
    pub enable: Option<bool>,
    pub json: Option<bool>,
    pub nmea: Option<bool>,
    pub pps: Option<bool>,
    pub raw: Option<i32>,
    pub scaled: Option<bool>,
    pub split24: Option<bool>,
    pub timing: Option<bool>,
    pub remote: Option<String>,
}

impl Watch {
    /// Policy enabling the JSON report stream
    pub fn json() -> Self {
        Self {
            enable: Some(true),
            json: Some(true),
            ..Default::default()
        }
    }
}

/// Device list sent alongside watch acknowledgements
///
/// The bridge does not inspect individual devices, so they stay opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Devices {
    pub devices: Vec<serde_json::Value>,
}

/// Error notification from the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Error message text
    pub message: String,
}

/// Daemon response messages, dispatched on the "class" field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "UPPERCASE")]
pub enum Report {
    /// Time-Position-Velocity report
    Tpv(Tpv),
    /// Daemon version information
    Version(Version),
    /// Current watch settings
    Watch(Watch),
    /// List of available GPS devices
    Devices(Devices),
    /// Error message from the daemon
    Error(ErrorReport),
    /// Any report class the bridge does not model (SKY, GST, ...)
    #[serde(untagged)]
    Other(serde_json::Value),
}

/// Formats a watch policy as a `?WATCH={...};` command
pub fn watch_command(watch: &Watch) -> String {
    format!("?WATCH={};", serde_json::to_string(watch).unwrap())
}

/// Line-by-line report decoding over an async buffered reader
///
/// `buf` accumulates one newline-terminated line across polls; a complete
/// line is decoded as a [`Report`] and the buffer cleared for the next one.
pub(crate) trait DecodeReport: futures_io::AsyncBufRead {
    fn poll_report(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut Vec<u8>,
    ) -> Poll<Result<Option<Report>>>
    where
        Self: Sized,
    {
        loop {
            let available = match self.as_mut().poll_fill_buf(cx) {
                Poll::Ready(Ok(available)) => available,
                Poll::Ready(Err(err)) => return Poll::Ready(Err(BridgeError::Io(err))),
                Poll::Pending => return Poll::Pending,
            };

            if available.is_empty() {
                // EOF; a partial trailing line is discarded.
                return Poll::Ready(Ok(None));
            }

            if let Some(newline) = available.iter().position(|&byte| byte == b'\n') {
                buf.extend_from_slice(&available[..=newline]);
                self.as_mut().consume(newline + 1);
                let report = serde_json::from_slice(buf).map_err(BridgeError::Json);
                buf.clear();
                return Poll::Ready(report.map(Some));
            }

            let len = available.len();
            buf.extend_from_slice(available);
            self.as_mut().consume(len);
        }
    }
}

impl<R: futures_io::AsyncBufRead + ?Sized> DecodeReport for R {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn watch_command_encodes_enabled_json_policy() {
        assert_eq!(
            watch_command(&Watch::json()),
            r#"?WATCH={"enable":true,"json":true};"#
        );
    }

    #[test]
    fn decodes_a_tpv_report_line() {
        let line = r#"{"class":"TPV","device":"/dev/pts/1",
            "time":"2005-06-08T10:34:48.283Z","ept":0.005,
            "lat":46.498293369,"lon":7.567411672,"alt":1343.127,
            "eph":36.000,"epv":32.321,"track":10.3788,"speed":0.091,
            "climb":-0.085,"mode":3}"#;
        let report: Report = serde_json::from_str(line).unwrap();
        let Report::Tpv(tpv) = report else {
            panic!("expected a TPV report, got {report:?}");
        };
        assert_eq!(tpv.mode, FixMode::Fix3D);
        assert_eq!(tpv.lat, Some(46.498293369));
        assert_eq!(tpv.lon, Some(7.567411672));
        assert_eq!(tpv.device.as_deref(), Some("/dev/pts/1"));
    }

    #[test]
    fn dispatches_version_and_watch_classes() {
        let banner = r#"{"class":"VERSION","release":"3.25","rev":"3.25",
            "proto_major":3,"proto_minor":14}"#;
        assert!(matches!(
            serde_json::from_str(banner).unwrap(),
            Report::Version(Version { proto_major: 3, .. })
        ));

        let ack = r#"{"class":"WATCH","enable":true,"json":true}"#;
        assert!(matches!(
            serde_json::from_str(ack).unwrap(),
            Report::Watch(Watch { enable: Some(true), .. })
        ));
    }

    #[test]
    fn unmodeled_classes_fall_through_as_opaque_values() {
        let line = r#"{"class":"SKY","device":"/dev/pts/1","satellites":[]}"#;
        let report: Report = serde_json::from_str(line).unwrap();
        let Report::Other(value) = report else {
            panic!("expected an opaque report, got {report:?}");
        };
        assert_eq!(value["class"], "SKY");
    }

    #[test]
    fn tpv_report_round_trips() {
        let line = r#"{"class":"TPV","device":"/dev/ttyS0",
            "time":"2020-01-01T00:00:30.500Z","mode":3,"status":2,
            "lat":12.5,"lon":-7.25,"altHAE":120.75,"speed":1.5,
            "climb":0.0,"track":359.9,"ept":0.005,"epx":4.0,"epy":3.5,
            "epv":10.0,"leapseconds":18}"#;
        let report: Report = serde_json::from_str(line).unwrap();
        let encoded = serde_json::to_string(&report).unwrap();
        let decoded: Report = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, report);
    }

    #[test]
    fn unmodeled_tpv_fields_survive_the_round_trip() {
        let line = r#"{"class":"TPV","mode":2,"lat":1.0,"lon":2.0,
            "ecefx":4138816.0,"datum":"WGS84"}"#;
        let report: Report = serde_json::from_str(line).unwrap();
        let Report::Tpv(ref tpv) = report else {
            panic!("expected a TPV report");
        };
        assert_eq!(tpv.extra["datum"], json!("WGS84"));

        let encoded = serde_json::to_string(&report).unwrap();
        assert!(encoded.contains("ecefx"));
        assert_eq!(serde_json::from_str::<Report>(&encoded).unwrap(), report);
    }
}
