use anyhow::Result;

use crate::config::CONFIG_FILENAME;
use crate::identity::sanitize_name;

pub fn run() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config_path = cwd.join(CONFIG_FILENAME);

    if config_path.exists() {
        anyhow::bail!("{} already exists in {}", CONFIG_FILENAME, cwd.display());
    }

    let prefix = cwd
        .file_name()
        .map(|n| sanitize_name(&n.to_string_lossy()))
        .unwrap_or_else(|| "myapp".to_string());

    let config = format!(
        r#"[project]
prefix = "{prefix}"
# worktree_isolation = true     # Derive unique names/ports per git worktree
# compose_file = "docker-compose.yml"

# -- Container-backed services --
[services.postgres]
port = 5432
database = "{prefix}"
health = "postgres"
# secondary_port = 5433
# user = "postgres"
# password = "postgres"
# container_service = "db"      # When the compose service name differs

# [services.redis]
# port = 6379
# health = "redis"

# -- Local app processes --
# [apps.web]
# port = 3000
# dev = "pnpm dev"
# build = "pnpm build"
# prod = "pnpm start"
# dir = "apps/web"
# health_path = "/api/health"

# -- Database-tool integration --
# Prepends an implicit migration before any declared ones.
# [database]
# service = "postgres"
# migrate = "npx prisma migrate deploy"

# -- Extra migrations (all run concurrently) --
# [[migrations]]
# name = "clickhouse"
# command = "npm run migrate:clickhouse"

# -- Seeding (skipped when the check table already has rows) --
# [seed]
# command = "npm run seed"
# check = {{ service = "postgres", table = "users" }}

# -- Lifecycle hooks --
# [hooks]
# after_containers_ready = "npm run codegen"
# before_servers = ""
# after_servers = ""
# before_stop = ""

# -- Env vars injected into every spawned process --
# {{postgres_url}}-style placeholders resolve against computed ports/URLs.
# [env]
# DATABASE_URL = "{{postgres_url}}?schema=public"

# -- Idle shutdown --
# [watchdog]
# idle_timeout = "1h"
"#
    );

    std::fs::write(&config_path, &config)?;
    println!("Created {} in {}", CONFIG_FILENAME, cwd.display());
    println!();
    println!("Edit the file, then run `devdock start` to begin.");
    Ok(())
}
