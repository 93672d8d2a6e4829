use {
    crate::Error,
    config::{Config, Environment, File},
    serde::de::DeserializeOwned,
    std::path::Path,
};

/// Read `path` and apply overrides from environment variables starting with
/// `{prefix}__`, with `__` separating nested keys (e.g.
/// `RENVM__POLLING__NETWORK_MAX=5000`).
pub fn parse_config_with_prefix<P, D>(path: P, prefix: &str) -> Result<D, Error>
where
    P: AsRef<Path>,
    D: DeserializeOwned,
{
    let env_override = Environment::with_prefix(prefix)
        .separator("__")
        .try_parsing(true);

    let config = Config::builder()
        .add_source(File::from(path.as_ref()))
        .add_source(env_override)
        .build()?;

    Ok(config.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use {super::*, assertor::*, serde::Deserialize};

    #[derive(Debug, Deserialize)]
    struct TestSettings {
        endpoint: String,
        polling: Polling,
    }

    #[derive(Debug, Deserialize)]
    struct Polling {
        network_initial: u64,
        network_max: u64,
    }

    #[test]
    fn test_parse_config_file() {
        std::env::set_var("CONFIG_PARSER_TEST__POLLING__NETWORK_MAX", "2500");

        let config: TestSettings =
            parse_config_with_prefix("fixtures/config_test1.toml", "CONFIG_PARSER_TEST")
                .expect("Failed to parse file");

        assert_that!(config.endpoint.as_str()).is_equal_to("http://localhost:18515");
        assert_that!(config.polling.network_initial).is_equal_to(500);
        assert_that!(config.polling.network_max).is_equal_to(2500);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = parse_config_with_prefix::<_, TestSettings>(
            "fixtures/does_not_exist.toml",
            "CONFIG_PARSER_TEST",
        );
        assert_that!(result.is_err()).is_true();
    }
}
