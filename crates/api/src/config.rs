// Server configuration loaded from the environment

use std::time::Duration;

use taskforge_executor::ConfigError;

/// HTTP server and simulation settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Listen address
    pub bind_address: String,

    /// How long each simulated collaborator call takes
    pub simulated_latency: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            simulated_latency: Duration::from_millis(5000),
        }
    }
}

impl ServerConfig {
    /// Load from environment variables
    ///
    /// - `BIND_ADDRESS`: HTTP listen address (default: 0.0.0.0:8080)
    /// - `SIMULATED_LATENCY_MS`: Collaborator latency (default: 5000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_address = std::env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address);
        let simulated_latency = match std::env::var("SIMULATED_LATENCY_MS") {
            Ok(value) => {
                let millis = value.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                    key: "SIMULATED_LATENCY_MS".to_string(),
                    reason: e.to_string(),
                    value: value.clone(),
                })?;
                Duration::from_millis(millis)
            }
            Err(_) => defaults.simulated_latency,
        };

        Ok(Self {
            bind_address,
            simulated_latency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.simulated_latency, Duration::from_secs(5));
    }
}
