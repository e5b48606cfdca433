//! dirwatch command-line front-end
//!
//! Exposed as a library so the commands and the config layer can be tested
//! without spawning the binary.

pub mod cmd;
pub mod logging;
pub mod system_config;
