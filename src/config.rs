//! Server configuration.
//!
//! Defaults are layered under `TAPROOM_*` environment variables; nested keys
//! use a double underscore:
//!
//! | Variable | Default |
//! |---|---|
//! | `TAPROOM_ADDR` | `0.0.0.0:3000` |
//! | `TAPROOM_SHUTDOWN_TIMEOUT` | `20s` |
//! | `TAPROOM_LOG__FORMAT` | `json` |
//! | `TAPROOM_LOG__LEVEL` | `info` |

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::logging::LoggingConfig;

pub const ENV_PREFIX: &str = "TAPROOM_";

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Grace period for in-flight requests once shutdown starts.
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    pub log: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 3000)),
            shutdown_timeout: Duration::from_secs(20),
            log: LoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults merged with the `TAPROOM_*` environment.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_figment(&Self::figment())
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ServerError> {
        figment.extract().map_err(|e| ServerError::Config(Box::new(e)))
    }
}
