//! Process boundary for the order pipeline.
//!
//! Wires the write path and the read path behind an explicit [`AppContext`],
//! maps classified failures to command statuses and delivery dispositions,
//! and runs an in-process at-least-once bus for local use.

pub mod boundary;
pub mod bus;
pub mod config;
pub mod context;
pub mod error;
pub mod purge;
pub mod runner;

pub use boundary::{
    Disposition, Response, handle_command, handle_delivery, handle_events, handle_get_order,
};
pub use bus::{ChannelPublisher, Consumer, ConsumerStats, Delivery};
pub use config::{Config, ConfigError, LogFormat};
pub use context::{AppContext, OrderCommands, OrderProjection};
pub use error::{StartupError, status_for};
