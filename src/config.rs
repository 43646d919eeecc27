//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).
//!
//! | Variable                          | Default                    |
//! |-----------------------------------|----------------------------|
//! | `LISTEN_ADDR`                     | `0.0.0.0:3000`             |
//! | `EVENT_BUS_CAPACITY`              | `10000`                    |
//! | `EVENT_CHANNEL_NAME`              | `fleet-updates`            |
//! | `MANAGEMENT_URL_TEMPLATE`         | `ws://instance-{id}:25585` |
//! | `MANAGEMENT_REQUEST_TIMEOUT_SECS` | `10`                       |
//! | `OBSERVER_QUEUE_CAPACITY`         | `256`                      |
//! | `MIN_VIEWING_ROLE`                | `user`                     |
//! | `RECONNECT_BACKOFF_STEPS`         | `15=3,20=10,30=30`         |
//! | `RECONNECT_BACKOFF_CEILING_SECS`  | `60`                       |

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, bail};

use crate::domain::Role;
use crate::management::{BackoffPolicy, ChannelSettings};

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`FleetConfig::from_env`].
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Logical name of the event channel.
    pub event_channel_name: String,

    /// Management endpoint template; must contain `{id}`.
    pub management_url_template: String,

    /// Deadline for management handshakes and requests.
    pub management_request_timeout: Duration,

    /// Per-observer buffer between the filter task and the socket.
    pub observer_queue_capacity: usize,

    /// Minimum role required to see instance-scoped events.
    pub min_viewing_role: Role,

    /// Reconnect delay policy for instance channels.
    pub backoff: BackoffPolicy,
}

impl FleetConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value that cannot be
    /// used; see [`FleetConfig::from_lookup`].
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is not a socket address,
    /// `MANAGEMENT_URL_TEMPLATE` lacks `{id}`, the request timeout is zero,
    /// `MIN_VIEWING_ROLE` is not a role, or the backoff settings are
    /// malformed or not monotonic.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let listen_addr: SocketAddr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()
            .context("LISTEN_ADDR is not a socket address")?;

        let event_bus_capacity = parse_or(&lookup, "EVENT_BUS_CAPACITY", 10_000);
        let event_channel_name =
            lookup("EVENT_CHANNEL_NAME").unwrap_or_else(|| "fleet-updates".to_string());

        let management_url_template = lookup("MANAGEMENT_URL_TEMPLATE")
            .unwrap_or_else(|| ChannelSettings::default().url_template);
        if !management_url_template.contains("{id}") {
            bail!("MANAGEMENT_URL_TEMPLATE must contain {{id}}: {management_url_template}");
        }

        let management_request_timeout =
            Duration::from_secs(parse_or(&lookup, "MANAGEMENT_REQUEST_TIMEOUT_SECS", 10));
        if management_request_timeout.is_zero() {
            bail!("MANAGEMENT_REQUEST_TIMEOUT_SECS must be at least 1");
        }
        let observer_queue_capacity = parse_or(&lookup, "OBSERVER_QUEUE_CAPACITY", 256);

        let min_viewing_role = match lookup("MIN_VIEWING_ROLE") {
            Some(raw) => raw.parse().context("MIN_VIEWING_ROLE")?,
            None => Role::User,
        };

        let steps = lookup("RECONNECT_BACKOFF_STEPS")
            .unwrap_or_else(|| BackoffPolicy::DEFAULT_STEPS.to_string());
        let ceiling = Duration::from_secs(parse_or(&lookup, "RECONNECT_BACKOFF_CEILING_SECS", 60));
        let backoff = BackoffPolicy::parse(&steps, ceiling)
            .context("RECONNECT_BACKOFF_STEPS / RECONNECT_BACKOFF_CEILING_SECS")?;

        Ok(Self {
            listen_addr,
            event_bus_capacity,
            event_channel_name,
            management_url_template,
            management_request_timeout,
            observer_queue_capacity,
            min_viewing_role,
            backoff,
        })
    }

    /// Channel settings derived from this configuration.
    #[must_use]
    pub fn channel_settings(&self) -> ChannelSettings {
        ChannelSettings {
            url_template: self.management_url_template.clone(),
            request_timeout: self.management_request_timeout,
            backoff: self.backoff.clone(),
        }
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
