use std::collections::BTreeMap;

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use crate::environment::Environment;

/// Print the startup summary: identity line, one row per service and app
/// with its resolved port and URL, and the stop hint.
pub fn print_startup_summary(env: &Environment, pids: Option<&BTreeMap<String, u32>>) {
    let use_color = std::io::stdout().is_terminal();
    let identity = env.identity();

    println!();
    if use_color {
        print!("  {} {}", "devdock".bold(), env.project_name().cyan());
    } else {
        print!("  devdock {}", env.project_name());
    }
    if identity.port_offset > 0 {
        if use_color {
            print!(" {}", format!("(port offset +{})", identity.port_offset).dimmed());
        } else {
            print!(" (port offset +{})", identity.port_offset);
        }
    }
    println!();
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Name").set_alignment(CellAlignment::Left),
        Cell::new("Port").set_alignment(CellAlignment::Right),
        Cell::new("URL").set_alignment(CellAlignment::Left),
    ]);

    for name in env.config().services.keys() {
        add_row(&mut table, env, name);
    }
    for name in env.config().apps.keys() {
        add_row(&mut table, env, name);
    }

    for line in table.to_string().lines() {
        println!("  {}", line);
    }

    if let Some(pids) = pids {
        println!();
        for (name, pid) in pids {
            if use_color {
                println!("  {} {} (pid {})", "\u{25cf}".green(), name, pid);
            } else {
                println!("  * {} (pid {})", name, pid);
            }
        }
        println!();
        if use_color {
            println!("  Press {} to stop", "Ctrl+C".bold());
        } else {
            println!("  Press Ctrl+C to stop");
        }
    }
    println!();
}

fn add_row(table: &mut Table, env: &Environment, name: &str) {
    let port = env
        .ports()
        .get(name)
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    let url = env.urls().get(name).cloned().unwrap_or_else(|| "-".to_string());
    table.add_row(vec![Cell::new(name), Cell::new(&port), Cell::new(&url)]);
}

/// Print the env-var map in shell-sourceable form.
pub fn print_env(vars: &BTreeMap<String, String>) {
    for (key, value) in vars {
        println!("export {}={}", key, shell_quote(value));
    }
}

fn shell_quote(value: &str) -> String {
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_-./:@+=".contains(c))
    {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_plain_values_unchanged() {
        assert_eq!(shell_quote("http://localhost:5432"), "http://localhost:5432");
        assert_eq!(shell_quote("development"), "development");
    }

    #[test]
    fn quoting_wraps_special_characters() {
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote("a?b=c&d"), "'a?b=c&d'");
    }
}
