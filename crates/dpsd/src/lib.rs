//! DPS SCPI daemon - network front end for a bench power supply
//!
//! This crate provides the daemon's building blocks:
//! - `commands` - the device command table and its bridge handlers
//! - `server` - TCP listener, single-client session loop, accept loop
//! - `lifecycle` - readiness/liveness/stopping notifications to a supervisor
//! - `config` - CLI/environment/file configuration merge
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        dpsd                              │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌─────────────┐  accept   ┌─────────────┐               │
//! │  │  Listener   │──────────▶│   Session   │  (one at a    │
//! │  │ (TCP 5025)  │◀──────────│    loop     │   time)       │
//! │  └─────────────┘   close   └──────┬──────┘               │
//! │                                   │ bytes / idle tick    │
//! │                                   ▼                      │
//! │                           ┌──────────────┐               │
//! │                           │ ScpiParser   │──▶ handlers ──▶ PowerSupply
//! │                           └──────────────┘               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Session failures end the session, never the process

pub mod commands;
pub mod config;
pub mod lifecycle;
pub mod server;
