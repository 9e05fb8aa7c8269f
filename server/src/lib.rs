//! Tandem Coordinator
//!
//! Two-party WebRTC signaling coordinator: password-gated room admission,
//! immutable per-session roles, and verbatim relay of SDP/ICE and lifecycle
//! frames between exactly two peers. Call content never touches this server.

pub mod api;
pub mod config;
pub mod db;
pub mod ip;
pub mod rooms;
pub mod signaling;
pub mod vault;
