//! Breach - authoritative server for round-based 2D tactical shooter matches
//!
//! - `game`: weapons, firing, rounds, bomb, economy and the per-room tick loop
//! - `ws`: WebSocket protocol and connection handling
//! - `http`: health, room listing and weapon catalog endpoints
//!
//! `game::reconcile` is the client-side half: it applies server messages on
//! top of locally predicted state.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
