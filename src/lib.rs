//! Smart Clock - audio relay and display sync server
//!
//! This crate captures one shared system audio source, streams it to every
//! connected display over WebRTC, and keeps brightness and the active tab
//! consistent across displays.

pub mod audio;
pub mod client;
pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod state;
pub mod utils;
pub mod web;
pub mod webrtc;

pub use error::{AppError, Result};
