use serde::{de, Deserialize, Deserializer};
use std::collections::BTreeMap;

/// Top-level `devdock.toml` model. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct DevConfig {
    pub project: ProjectConfig,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
    #[serde(default)]
    pub apps: BTreeMap<String, AppConfig>,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub migrations: Vec<MigrationConfig>,
    #[serde(default)]
    pub seed: Option<SeedConfig>,
    #[serde(default)]
    pub hooks: HooksConfig,
    /// User env table, interpolated and applied last; wins on collision.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Project name component. Lowercase kebab, `^[a-z][a-z0-9-]*$`.
    pub prefix: String,
    #[serde(default = "default_true")]
    pub worktree_isolation: bool,
    #[serde(default)]
    pub compose_file: Option<String>,
}

/// One container-backed dependency.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub port: u16,
    #[serde(default)]
    pub secondary_port: Option<u16>,
    #[serde(default)]
    pub health: HealthCheck,
    /// Custom URL template; `{port}`, `{secondary_port}`, `{host}` and
    /// `{local_ip}` placeholders. Used verbatim when present.
    #[serde(default)]
    pub url_template: Option<String>,
    /// Database name. Presence also marks the service as database-kind for
    /// built-in URL template selection.
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub expose: bool,
    /// Underlying compose service name when it differs from the map key.
    #[serde(default)]
    pub container_service: Option<String>,
}

impl ServiceConfig {
    /// The compose-level service name this entry maps to.
    pub fn container_service_name<'a>(&'a self, key: &'a str) -> &'a str {
        self.container_service.as_deref().unwrap_or(key)
    }
}

/// One locally-run dev-server process.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    /// Dev-mode command. Required.
    pub dev: String,
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub prod: Option<String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub health_path: Option<String>,
    #[serde(default)]
    pub health_timeout_secs: Option<u64>,
    #[serde(default)]
    pub expose: bool,
}

/// Health-check selector: disabled, a named built-in, or a custom command.
///
/// TOML shapes: `health = false`, `health = "postgres"`, or
/// `health = { command = "redis-cli ping", expect = "PONG" }`.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthCheck {
    Disabled,
    Named(String),
    Custom {
        command: String,
        expect: Option<String>,
    },
}

impl Default for HealthCheck {
    fn default() -> Self {
        HealthCheck::Named("tcp".to_string())
    }
}

impl<'de> Deserialize<'de> for HealthCheck {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HealthCheckVisitor;

        impl<'de> de::Visitor<'de> for HealthCheckVisitor {
            type Value = HealthCheck;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("false, a check name, or a table with a `command` key")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                if v {
                    Err(E::custom(
                        "health = true is not a check; name one or use a command table",
                    ))
                } else {
                    Ok(HealthCheck::Disabled)
                }
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(HealthCheck::Named(v.to_string()))
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut command: Option<String> = None;
                let mut expect: Option<String> = None;
                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "command" => command = Some(map.next_value()?),
                        "expect" => expect = Some(map.next_value()?),
                        other => {
                            return Err(de::Error::unknown_field(other, &["command", "expect"]))
                        }
                    }
                }
                let command = command.ok_or_else(|| de::Error::missing_field("command"))?;
                Ok(HealthCheck::Custom { command, expect })
            }
        }

        deserializer.deserialize_any(HealthCheckVisitor)
    }
}

/// Database-tool integration. When present, an implicit migration entry
/// running `migrate` is prepended to the declared migration list.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub service: String,
    pub migrate: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    pub command: String,
    #[serde(default)]
    pub dir: Option<String>,
    /// Seed only when the named table is empty. Absent = always seed.
    #[serde(default)]
    pub check: Option<SeedCheck>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedCheck {
    pub service: String,
    pub table: String,
}

/// Lifecycle hook commands. All optional; failures propagate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HooksConfig {
    #[serde(default)]
    pub after_containers_ready: Option<String>,
    #[serde(default)]
    pub before_servers: Option<String>,
    #[serde(default)]
    pub after_servers: Option<String>,
    #[serde(default)]
    pub before_stop: Option<String>,
}

fn default_idle_timeout() -> String {
    "1h".to_string()
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_check_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchdogConfig {
    /// Idle window before teardown, humantime syntax ("90m", "2h").
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: String,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            idle_timeout: default_idle_timeout(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            check_interval_secs: default_check_interval_secs(),
        }
    }
}
