use {
    crate::GatewayError,
    config_parser::parse_config_with_prefix,
    renvm_chain::PollConfig,
    renvm_types::{DEFAULT_MAX_DEPTH, ExponentialBackoff},
    serde::{Deserialize, Serialize},
    serde_with::{DurationMilliSeconds, serde_as},
    std::{collections::BTreeMap, path::Path, time::Duration},
};

/// Prefix of environment variables overriding the config file, e.g.
/// `RENVM__POLLING__NETWORK_MAX=5000`.
pub const ENV_PREFIX: &str = "RENVM";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    pub confirmations: ConfirmationConfig,
    pub polling: PollingConfig,
    /// How many times a one-shot submission is attempted before the transfer
    /// fails. Only transient errors are retried.
    pub submit_attempts: u32,
    pub codec_max_depth: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            confirmations: ConfirmationConfig::default(),
            polling: PollingConfig::default(),
            submit_attempts: 5,
            codec_max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl GatewayConfig {
    pub fn load<P>(path: P) -> Result<Self, GatewayError>
    where
        P: AsRef<Path>,
    {
        Ok(parse_config_with_prefix(path, ENV_PREFIX)?)
    }

    pub fn source_confirmations(&self, asset: &str) -> u64 {
        lookup(&self.confirmations.source, asset).unwrap_or(self.confirmations.default_source)
    }

    pub fn destination_confirmations(&self, chain: &str) -> u64 {
        lookup(&self.confirmations.destination, chain)
            .unwrap_or(self.confirmations.default_destination)
    }

    pub fn confirmation_poll(&self) -> PollConfig {
        PollConfig {
            initial: self.polling.confirmation_initial,
            max: self.polling.confirmation_max,
        }
    }

    pub fn network_poll(&self) -> PollConfig {
        PollConfig {
            initial: self.polling.network_initial,
            max: self.polling.network_max,
        }
    }

    /// Backoff for re-establishing the deposit watch.
    pub fn watch_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.polling.retry_initial, self.polling.retry_max, 2, None)
    }

    /// Backoff for one-shot submissions, bounded by `submit_attempts`.
    pub fn submit_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            self.polling.retry_initial,
            self.polling.retry_max,
            2,
            Some(self.submit_attempts.saturating_sub(1)),
        )
    }
}

// Config sources may normalize key case, so asset and chain names are
// matched case-insensitively.
fn lookup(targets: &BTreeMap<String, u64>, key: &str) -> Option<u64> {
    targets
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .map(|(_, target)| *target)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Source confirmations required before a deposit is submitted.
    pub default_source: u64,
    /// Per-asset overrides of `default_source`.
    pub source: BTreeMap<String, u64>,
    /// Destination confirmations required before a transfer is settled.
    pub default_destination: u64,
    /// Per-chain overrides of `default_destination`.
    pub destination: BTreeMap<String, u64>,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            default_source: 6,
            source: BTreeMap::new(),
            default_destination: 1,
            destination: BTreeMap::new(),
        }
    }
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PollingConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub confirmation_initial: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub confirmation_max: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub network_initial: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub network_max: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub retry_initial: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub retry_max: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            confirmation_initial: Duration::from_secs(1),
            confirmation_max: Duration::from_secs(30),
            network_initial: Duration::from_secs(1),
            network_max: Duration::from_secs(15),
            retry_initial: Duration::from_millis(500),
            retry_max: Duration::from_secs(30),
        }
    }
}

impl PollingConfig {
    /// Millisecond-scale intervals, for tests.
    pub fn fast() -> Self {
        let ms = Duration::from_millis;
        Self {
            confirmation_initial: ms(1),
            confirmation_max: ms(5),
            network_initial: ms(1),
            network_max: ms(5),
            retry_initial: ms(1),
            retry_max: ms(5),
        }
    }
}

// ----------------------------------- tests -----------------------------------

#[cfg(test)]
mod tests {
    use {super::*, std::io::Write, test_case::test_case};

    #[test_case("BTC" => 3)]
    #[test_case("btc" => 3)]
    #[test_case("ZEC" => 6)]
    fn source_targets(asset: &str) -> u64 {
        let mut config = GatewayConfig::default();
        config.confirmations.source.insert("BTC".to_string(), 3);
        config.source_confirmations(asset)
    }

    #[test]
    fn submit_backoff_is_bounded() {
        let config = GatewayConfig {
            submit_attempts: 3,
            polling: PollingConfig::fast(),
            ..Default::default()
        };

        // The first attempt happens without delay.
        let mut backoff = config.submit_backoff();
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_none());
    }

    #[test]
    fn loads_file_with_env_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
submit_attempts = 2

[confirmations]
default_source = 2

[confirmations.destination]
ethereum = 12

[polling]
network_initial = 250
"#
        )
        .unwrap();

        std::env::set_var("RENVM__POLLING__NETWORK_MAX", "4000");

        let config = GatewayConfig::load(file.path()).unwrap();

        assert_eq!(config.submit_attempts, 2);
        assert_eq!(config.source_confirmations("BTC"), 2);
        assert_eq!(config.destination_confirmations("Ethereum"), 12);
        assert_eq!(config.destination_confirmations("Solana"), 1);
        assert_eq!(config.polling.network_initial, Duration::from_millis(250));
        assert_eq!(config.polling.network_max, Duration::from_millis(4000));
        assert_eq!(config.codec_max_depth, DEFAULT_MAX_DEPTH);
    }
}
