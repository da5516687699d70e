pub mod env;
pub mod network;
pub mod ports;
pub mod urls;
