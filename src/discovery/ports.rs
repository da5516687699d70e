use std::collections::BTreeMap;

use crate::config::model::{AppConfig, ServiceConfig};

/// Map of service/app name to resolved host port. Services declaring a
/// secondary port get an extra `{name}Secondary` entry — the key shape is a
/// cross-tool contract, not a Rust identifier.
pub type ComputedPorts = BTreeMap<String, u16>;

/// Largest offset identity derivation can produce (`10 + hash % 90`).
/// Validation rejects base ports above `u16::MAX - MAX_PORT_OFFSET` so the
/// sum always fits.
pub const MAX_PORT_OFFSET: u16 = 99;

/// Apply the identity's port offset to every declared base port.
///
/// Pure function, no I/O: `port = base + offset` for each service and app,
/// `{name}Secondary = secondary + offset` where a secondary port exists.
/// Addition saturates at `u16::MAX`; validated configs never reach that.
pub fn compute_ports(
    services: &BTreeMap<String, ServiceConfig>,
    apps: &BTreeMap<String, AppConfig>,
    offset: u16,
) -> ComputedPorts {
    let mut ports = ComputedPorts::new();

    for (name, svc) in services {
        ports.insert(name.clone(), svc.port.saturating_add(offset));
        if let Some(secondary) = svc.secondary_port {
            ports.insert(
                format!("{}Secondary", name),
                secondary.saturating_add(offset),
            );
        }
    }

    for (name, app) in apps {
        ports.insert(name.clone(), app.port.saturating_add(offset));
    }

    ports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::DevConfig;

    fn parse(toml: &str) -> DevConfig {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn offset_is_linear() {
        let config = parse(
            r#"
            [project]
            prefix = "t"
            [services.postgres]
            port = 5432
        "#,
        );
        let ports = compute_ports(&config.services, &config.apps, 10);
        assert_eq!(ports["postgres"], 5442);
    }

    #[test]
    fn zero_offset_keeps_base_ports() {
        let config = parse(
            r#"
            [project]
            prefix = "t"
            [services.postgres]
            port = 5432
            [apps.api]
            port = 3000
            dev = "npm run dev"
        "#,
        );
        let ports = compute_ports(&config.services, &config.apps, 0);
        assert_eq!(ports["postgres"], 5432);
        assert_eq!(ports["api"], 3000);
    }

    #[test]
    fn secondary_port_offsets_identically() {
        let config = parse(
            r#"
            [project]
            prefix = "t"
            [services.clickhouse]
            port = 8123
            secondary_port = 9000
        "#,
        );
        let ports = compute_ports(&config.services, &config.apps, 15);
        assert_eq!(ports["clickhouse"], 8138);
        assert_eq!(ports["clickhouseSecondary"], 9015);
    }

    #[test]
    fn high_base_port_saturates_instead_of_overflowing() {
        let config = parse(
            r#"
            [project]
            prefix = "t"
            [services.odd]
            port = 65500
            secondary_port = 65530
            [apps.api]
            port = 65500
            dev = "npm run dev"
        "#,
        );
        let ports = compute_ports(&config.services, &config.apps, MAX_PORT_OFFSET);
        assert_eq!(ports["odd"], u16::MAX);
        assert_eq!(ports["oddSecondary"], u16::MAX);
        assert_eq!(ports["api"], u16::MAX);
    }

    #[test]
    fn no_secondary_entry_without_secondary_port() {
        let config = parse(
            r#"
            [project]
            prefix = "t"
            [services.redis]
            port = 6379
        "#,
        );
        let ports = compute_ports(&config.services, &config.apps, 20);
        assert_eq!(ports.len(), 1);
        assert!(!ports.contains_key("redisSecondary"));
    }
}
