//! spotlord — single-symbol spot-market trading agent for a Binance-style
//! exchange.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── core/             # Domain model, wire codec, connectors, Trader, Time Watcher
//! │   ├── domain/       # Pure domain types
//! │   ├── codec/        # Wire framing and request signing
//! │   ├── exchange/      # Reconnecting WebSocket connectors
//! │   ├── ports.rs       # Outbound boundary (OrderSink)
//! │   ├── trader.rs       # Event-dispatch loop and position state machine
//! │   └── time_watcher.rs # Periodic tick: cool-down, hold-time, stalled entry
//! └── app/              # Process-level wiring (Supervisor)
//! ```

pub mod app;
pub mod config;
pub mod core;
pub mod error;
