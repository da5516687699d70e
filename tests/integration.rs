mod common;

#[path = "integration/completions.rs"]
mod completions;
#[path = "integration/env_command.rs"]
mod env_command;
#[path = "integration/init_command.rs"]
mod init_command;
#[path = "integration/validate_command.rs"]
mod validate_command;
