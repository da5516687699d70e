// The miette/thiserror derive macros generate code that triggers false
// positive unused_assignments warnings on enum variant fields.
#![allow(unused_assignments)]

use std::collections::BTreeMap;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::config::model::DevConfig;
use crate::discovery::ports::MAX_PORT_OFFSET;

/// Highest base port that still leaves room for any derivable offset.
const MAX_BASE_PORT: u16 = u16::MAX - MAX_PORT_OFFSET;

// ---------------------------------------------------------------------------
// ConfigDiagnostic — miette-powered validation error
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigDiagnostic {
    #[error("invalid project prefix `{prefix}`")]
    #[diagnostic(
        code(devdock::invalid_prefix),
        help("the prefix must match ^[a-z][a-z0-9-]*$ (lowercase kebab)")
    )]
    InvalidPrefix {
        #[source_code]
        src: NamedSource<String>,
        #[label("must start with a letter and use only a-z, 0-9 and `-`")]
        span: SourceSpan,
        prefix: String,
    },

    #[error("`{entry}` declares port 0")]
    #[diagnostic(
        code(devdock::port_zero),
        help("ports must be in the range 1-65535")
    )]
    PortZero {
        #[source_code]
        src: NamedSource<String>,
        #[label("port must be at least 1")]
        span: SourceSpan,
        entry: String,
    },

    #[error("`{entry}` declares port {port}, which cannot absorb a worktree offset")]
    #[diagnostic(
        code(devdock::port_too_high),
        help("worktree offsets reach 99, so base ports must be at most 65436")
    )]
    PortTooHigh {
        #[source_code]
        src: NamedSource<String>,
        #[label("port must be at most 65436")]
        span: SourceSpan,
        entry: String,
        port: u16,
    },

    #[error("container service name `{container}` is used by multiple services: {services:?}")]
    #[diagnostic(code(devdock::duplicate_container_service))]
    DuplicateContainerService {
        #[source_code]
        src: NamedSource<String>,
        #[label("resolves to the same compose service")]
        span: SourceSpan,
        container: String,
        services: Vec<String>,
    },

    #[error("name `{name}` is declared as both a service and an app")]
    #[diagnostic(code(devdock::duplicate_name))]
    DuplicateName {
        #[source_code]
        src: NamedSource<String>,
        #[label("names must be unique across services and apps")]
        span: SourceSpan,
        name: String,
    },

    #[error("{section} references unknown service `{service}`")]
    #[diagnostic(code(devdock::unknown_service))]
    UnknownService {
        #[source_code]
        src: NamedSource<String>,
        #[label("no such service declared")]
        span: SourceSpan,
        section: String,
        service: String,
    },

    #[error("app `{app}` has an empty dev command")]
    #[diagnostic(code(devdock::empty_command))]
    EmptyCommand {
        #[source_code]
        src: NamedSource<String>,
        #[label("dev command is empty")]
        span: SourceSpan,
        app: String,
    },

    #[error("compose_file `{path}` does not look like a compose file")]
    #[diagnostic(
        code(devdock::invalid_compose_path),
        help("expected a .yml or .yaml path")
    )]
    InvalidComposePath {
        #[source_code]
        src: NamedSource<String>,
        #[label("unexpected extension")]
        span: SourceSpan,
        path: String,
    },

    #[error("watchdog idle_timeout `{value}` is not a valid duration")]
    #[diagnostic(
        code(devdock::invalid_idle_timeout),
        help("use humantime syntax, e.g. \"45m\" or \"2h\"")
    )]
    InvalidIdleTimeout {
        #[source_code]
        src: NamedSource<String>,
        #[label("cannot parse this duration")]
        span: SourceSpan,
        value: String,
    },
}

/// Aggregate wrapper so callers can hand every violation to miette at once.
#[derive(Debug, Error, Diagnostic)]
#[error("invalid configuration ({} problems)", problems.len())]
#[diagnostic(code(devdock::invalid_config))]
pub struct ConfigError {
    #[related]
    pub problems: Vec<ConfigDiagnostic>,
}

// ---------------------------------------------------------------------------
// Source span helpers
// ---------------------------------------------------------------------------

/// Find the byte offset of a TOML table header like `[services.postgres]`.
fn find_table_span(source: &str, section: &str, name: &str) -> SourceSpan {
    let patterns = [
        format!("[{}.{}]", section, name),
        format!("[{}.{}", section, name),
    ];
    for pat in &patterns {
        if let Some(pos) = source.find(pat) {
            let name_start = pos + 1 + section.len() + 1;
            return (name_start, name.len()).into();
        }
    }
    if let Some(pos) = source.find(name) {
        return (pos, name.len()).into();
    }
    (0, 0).into()
}

/// Find the span of a `key = value` assignment, preferring one under the
/// given table header.
fn find_key_span(source: &str, table: &str, key: &str) -> SourceSpan {
    let table_pos = source.find(&format!("[{}]", table)).unwrap_or(0);
    if let Some(pos) = source[table_pos..].find(key) {
        return (table_pos + pos, key.len()).into();
    }
    (0, 0).into()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Validate a loaded config against the eager invariants. Every violation
/// is collected and reported together, not just the first.
pub fn validate(
    config: &DevConfig,
    source: &str,
    filename: &str,
) -> Result<(), Vec<ConfigDiagnostic>> {
    let mut errors = Vec::new();
    let named = |_: &str| NamedSource::new(filename, source.to_string());

    if !valid_prefix(&config.project.prefix) {
        errors.push(ConfigDiagnostic::InvalidPrefix {
            src: named("prefix"),
            span: find_key_span(source, "project", "prefix"),
            prefix: config.project.prefix.clone(),
        });
    }

    for (name, svc) in &config.services {
        if svc.port == 0 {
            errors.push(ConfigDiagnostic::PortZero {
                src: named(name),
                span: find_table_span(source, "services", name),
                entry: format!("services.{}", name),
            });
        } else if svc.port > MAX_BASE_PORT {
            errors.push(ConfigDiagnostic::PortTooHigh {
                src: named(name),
                span: find_table_span(source, "services", name),
                entry: format!("services.{}", name),
                port: svc.port,
            });
        }
        if svc.secondary_port == Some(0) {
            errors.push(ConfigDiagnostic::PortZero {
                src: named(name),
                span: find_table_span(source, "services", name),
                entry: format!("services.{}.secondary_port", name),
            });
        } else if let Some(secondary) = svc.secondary_port.filter(|&p| p > MAX_BASE_PORT) {
            errors.push(ConfigDiagnostic::PortTooHigh {
                src: named(name),
                span: find_table_span(source, "services", name),
                entry: format!("services.{}.secondary_port", name),
                port: secondary,
            });
        }
    }

    for (name, app) in &config.apps {
        if app.port == 0 {
            errors.push(ConfigDiagnostic::PortZero {
                src: named(name),
                span: find_table_span(source, "apps", name),
                entry: format!("apps.{}", name),
            });
        } else if app.port > MAX_BASE_PORT {
            errors.push(ConfigDiagnostic::PortTooHigh {
                src: named(name),
                span: find_table_span(source, "apps", name),
                entry: format!("apps.{}", name),
                port: app.port,
            });
        }
        if app.dev.trim().is_empty() {
            errors.push(ConfigDiagnostic::EmptyCommand {
                src: named(name),
                span: find_table_span(source, "apps", name),
                app: name.clone(),
            });
        }
    }

    // No two services may resolve to the same underlying compose service.
    let mut by_container: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (name, svc) in &config.services {
        by_container
            .entry(svc.container_service_name(name))
            .or_default()
            .push(name.clone());
    }
    for (container, services) in by_container {
        if services.len() > 1 {
            errors.push(ConfigDiagnostic::DuplicateContainerService {
                src: named(container),
                span: find_table_span(source, "services", &services[0]),
                container: container.to_string(),
                services,
            });
        }
    }

    for name in config.apps.keys() {
        if config.services.contains_key(name) {
            errors.push(ConfigDiagnostic::DuplicateName {
                src: named(name),
                span: find_table_span(source, "apps", name),
                name: name.clone(),
            });
        }
    }

    if let Some(db) = &config.database {
        if !config.services.contains_key(&db.service) {
            errors.push(ConfigDiagnostic::UnknownService {
                src: named(&db.service),
                span: find_key_span(source, "database", "service"),
                section: "[database]".to_string(),
                service: db.service.clone(),
            });
        }
    }

    if let Some(check) = config.seed.as_ref().and_then(|s| s.check.as_ref()) {
        if !config.services.contains_key(&check.service) {
            errors.push(ConfigDiagnostic::UnknownService {
                src: named(&check.service),
                span: find_key_span(source, "seed", "check"),
                section: "[seed].check".to_string(),
                service: check.service.clone(),
            });
        }
    }

    if let Some(path) = &config.project.compose_file {
        let ok = path.ends_with(".yml") || path.ends_with(".yaml");
        if !ok {
            errors.push(ConfigDiagnostic::InvalidComposePath {
                src: named(path),
                span: find_key_span(source, "project", "compose_file"),
                path: path.clone(),
            });
        }
    }

    if humantime::parse_duration(&config.watchdog.idle_timeout).is_err() {
        errors.push(ConfigDiagnostic::InvalidIdleTimeout {
            src: named("idle_timeout"),
            span: find_key_span(source, "watchdog", "idle_timeout"),
            value: config.watchdog.idle_timeout.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
