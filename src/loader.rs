//! Best-effort remote configuration loading
//!
//! Configuration correctness is best-effort, not contractual: any failure
//! while fetching or interpreting the remote record degrades to the built-in
//! defaults instead of blocking startup.

use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::AdapterConfig;
use crate::platform::{PlatformClient, Session};

/// Loads the adapter configuration from the platform
///
/// Starts from defaults and merges in the single matching record from
/// `collection_id`, if there is exactly one. Never fails the caller; the
/// returned configuration is always usable.
pub async fn load(
    platform: &PlatformClient,
    session: &Session,
    collection_id: &str,
    adapter_name: &str,
) -> AdapterConfig {
    let mut config = AdapterConfig::default();
    debug!("loading adapter config from collection {collection_id}");

    match platform
        .adapter_config_records(session, collection_id, adapter_name)
        .await
    {
        Ok(records) => apply_records(&mut config, &records),
        Err(err) => {
            error!("failed to fetch adapter config: {err}");
            info!("using default adapter config: {config:?}");
        }
    }

    info!("adapter config loaded: {config:?}");
    config
}

/// Applies a query result to `config`
///
/// Anything other than exactly one matching record is an unexpected
/// cardinality: it is logged and the configuration is left unchanged, which
/// guards against ambiguous or missing records without requiring stale ones
/// to be deleted first.
fn apply_records(config: &mut AdapterConfig, records: &[Value]) {
    if let [record] = records {
        debug!("fetched adapter config record: {record}");
        config.apply_remote(record);
    } else {
        error!(
            "unexpected number of matching adapter configs: {}",
            records.len()
        );
        info!("using default adapter config: {config:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_records_leaves_defaults() {
        let mut config = AdapterConfig::default();
        apply_records(&mut config, &[]);
        assert_eq!(config, AdapterConfig::default());
    }

    #[test]
    fn multiple_records_leaves_defaults() {
        let mut config = AdapterConfig::default();
        let records = vec![
            json!({ "topic_root": "site1" }),
            json!({ "topic_root": "site2" }),
        ];
        apply_records(&mut config, &records);
        assert_eq!(config, AdapterConfig::default());
    }

    #[test]
    fn single_record_overrides_topic_root_only() {
        let mut config = AdapterConfig::default();
        apply_records(&mut config, &[json!({ "topic_root": "site1" })]);
        assert_eq!(config.topic_root, "site1");
        assert_eq!(
            config.settings.gpsd_address,
            crate::config::DEFAULT_GPSD_ADDRESS
        );
    }
}
