pub mod env;
pub mod init;
pub mod validate;
