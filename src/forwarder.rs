//! Report forwarding loop
//!
//! Bridges the daemon's report stream onto the message bus: each TPV report
//! is serialized to JSON and published fire-and-forget to the configured
//! topic. Individual reports are low-value and immediately superseded by the
//! next fix, so per-report failures are logged and dropped rather than
//! retried.

use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::bus::ReportSink;
use crate::config::AdapterConfig;
use crate::daemon::DaemonClient;
use crate::daemon::protocol::Report;
use crate::{Result, error::BridgeError};

/// Topic segment appended to the configured root for fix reports
const DATA_TOPIC_SUFFIX: &str = "gpsd-data";

/// Builds the publish topic for a given topic root
pub fn data_topic(topic_root: &str) -> String {
    format!("{topic_root}/{DATA_TOPIC_SUFFIX}")
}

/// Forwards TPV reports from a report stream to a [`ReportSink`]
pub struct Forwarder<S> {
    sink: S,
    topic: String,
}

impl<S: ReportSink> Forwarder<S> {
    pub fn new(config: &AdapterConfig, sink: S) -> Self {
        Self {
            sink,
            topic: data_topic(&config.topic_root),
        }
    }

    /// Consumes `reports` until the stream ends
    ///
    /// Only TPV reports are forwarded; other classes pass by unremarked.
    /// A line that fails to decode costs that line alone. The stream
    /// ending means the daemon connection is gone, which the bridge cannot
    /// recover from, so it is returned as an error for the caller to treat
    /// as fatal.
    pub async fn run<St>(&self, mut reports: St) -> Result<()>
    where
        St: Stream<Item = Result<Report>> + Unpin,
    {
        while let Some(next) = reports.next().await {
            match next {
                Ok(report @ Report::Tpv(_)) => self.forward(&report).await,
                Ok(_) => {}
                Err(BridgeError::Json(err)) => {
                    error!("failed to decode daemon report: {err}");
                }
                Err(err) => return Err(err),
            }
        }

        Err(BridgeError::Daemon("daemon closed the report stream"))
    }

    /// Serializes one report and publishes it fire-and-forget
    ///
    /// Both serialization and publish failures drop this single report and
    /// leave the loop running.
    async fn forward<T: Serialize>(&self, report: &T) {
        let payload = match serde_json::to_vec(report) {
            Ok(payload) => payload,
            Err(err) => {
                error!("failed to serialize fix report: {err}");
                return;
            }
        };

        debug!("publishing fix report to {}", self.topic);
        if let Err(err) = self.sink.publish(&self.topic, payload).await {
            error!("failed to publish fix report: {err}");
        }
    }
}

/// Connects to the GPS daemon and forwards its fix reports until the
/// connection ends
///
/// The connection attempt itself is propagated to the caller: without a fix
/// source the bridge has no purpose, and callers terminate on it.
pub async fn start<S: ReportSink>(config: AdapterConfig, sink: S) -> Result<()> {
    info!("connecting to gpsd at {}", config.settings.gpsd_address);
    let client = DaemonClient::connect(&config.settings.gpsd_address).await?;
    let stream = client.watch().await?;
    info!("forwarding gpsd fix reports to {}", data_topic(&config.topic_root));

    Forwarder::new(&config, sink).run(stream).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::protocol::{FixMode, Tpv};
    use async_trait::async_trait;
    use serde::Serializer;
    use std::sync::{Arc, Mutex};

    /// Sink that records every publish it sees
    #[derive(Clone, Default)]
    struct RecordingSink {
        published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    }

    #[async_trait]
    impl ReportSink for RecordingSink {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload));
            Ok(())
        }
    }

    /// Sink that refuses every publish
    #[derive(Clone, Default)]
    struct FailingSink {
        attempts: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl ReportSink for FailingSink {
        async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<()> {
            *self.attempts.lock().unwrap() += 1;
            Err(BridgeError::Io(std::io::Error::other("broker unreachable")))
        }
    }

    /// A report whose serialization always fails
    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> core::result::Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not serializable"))
        }
    }

    fn tpv(lat: f64, lon: f64) -> Report {
        Report::Tpv(Tpv {
            device: None,
            time: None,
            mode: FixMode::Fix3D,
            status: None,
            lat: Some(lat),
            lon: Some(lon),
            alt: None,
            alt_hae: None,
            alt_msl: None,
            speed: Some(0.25),
            climb: None,
            track: None,
            magtrack: None,
            ept: None,
            epx: None,
            epy: None,
            epv: None,
            eph: None,
            eps: None,
            epc: None,
            epd: None,
            sep: None,
            leapseconds: None,
            extra: serde_json::Map::new(),
        })
    }

    fn config_with_root(root: &str) -> AdapterConfig {
        AdapterConfig {
            topic_root: root.to_string(),
            ..AdapterConfig::default()
        }
    }

    #[test]
    fn topic_substitutes_the_configured_root() {
        assert_eq!(data_topic("site1"), "site1/gpsd-data");
    }

    #[tokio::test]
    async fn publishes_tpv_reports_to_the_configured_topic() {
        let sink = RecordingSink::default();
        let forwarder = Forwarder::new(&config_with_root("site1"), sink.clone());
        let report = tpv(46.5, 7.5);

        let result = forwarder
            .run(futures::stream::iter(vec![Ok(report.clone())]))
            .await;
        // A finite stream ends like a dropped daemon connection.
        assert!(matches!(result, Err(BridgeError::Daemon(_))));

        let published = sink.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        let (topic, payload) = &published[0];
        assert_eq!(topic, "site1/gpsd-data");

        // The payload decodes back to a structurally identical report.
        let decoded: Report = serde_json::from_slice(payload).unwrap();
        assert_eq!(decoded, report);
    }

    #[tokio::test]
    async fn non_tpv_reports_are_not_published() {
        let sink = RecordingSink::default();
        let forwarder = Forwarder::new(&config_with_root("gpsd"), sink.clone());
        let reports = vec![
            Ok(Report::Other(serde_json::json!({"class":"SKY"}))),
            Ok(tpv(1.0, 2.0)),
        ];

        let _ = forwarder.run(futures::stream::iter(reports)).await;
        assert_eq!(sink.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn decode_errors_do_not_end_the_loop() {
        let bad_line = serde_json::from_str::<Report>("garbage").unwrap_err();
        let sink = RecordingSink::default();
        let forwarder = Forwarder::new(&config_with_root("gpsd"), sink.clone());
        let reports = vec![Err(BridgeError::Json(bad_line)), Ok(tpv(1.0, 2.0))];

        let _ = forwarder.run(futures::stream::iter(reports)).await;
        assert_eq!(sink.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn publish_failures_do_not_end_the_loop() {
        let sink = FailingSink::default();
        let forwarder = Forwarder::new(&config_with_root("gpsd"), sink.clone());
        let reports = vec![Ok(tpv(1.0, 2.0)), Ok(tpv(3.0, 4.0))];

        let result = forwarder.run(futures::stream::iter(reports)).await;
        // Every report was attempted despite the failures.
        assert_eq!(*sink.attempts.lock().unwrap(), 2);
        assert!(matches!(result, Err(BridgeError::Daemon(_))));
    }

    #[tokio::test]
    async fn unserializable_reports_are_skipped_without_a_publish() {
        let sink = RecordingSink::default();
        let forwarder = Forwarder::new(&config_with_root("gpsd"), sink.clone());

        forwarder.forward(&Unserializable).await;
        assert!(sink.published.lock().unwrap().is_empty());

        // Processing continues: the next report still goes out.
        forwarder.forward(&tpv(1.0, 2.0)).await;
        assert_eq!(sink.published.lock().unwrap().len(), 1);
    }
}
