//! Command implementations
//!
//! One module per `composer-dev` subcommand. Each resolves its environment
//! directory under `./composer`, wires the real Docker and Google Cloud
//! adapters and leaves the lifecycle itself to `composer_dev_core`.

pub mod create;
pub mod describe;
pub mod lifecycle;
pub mod list;
pub mod logs;
pub mod remove;
pub mod run_airflow_cmd;
pub mod shared;
pub mod versions;
