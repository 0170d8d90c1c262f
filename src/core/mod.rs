//! Domain model, wire codec, exchange connectors, and the two tasks
//! (Trader, Time Watcher) that drive them.

pub mod codec;
pub mod domain;
pub mod exchange;
pub mod ports;
pub mod time_watcher;
pub mod trader;
