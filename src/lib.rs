//! Core of a full-screen window switcher.
//!
//! A hotkey opens a [`Session`](actor::session::Session): every switchable
//! window gets a live preview laid out across the monitors, and a digit,
//! hover or click raises one of them. The native window system sits behind
//! [`Platform`](sys::platform::Platform); [`sys::headless`] implements it in
//! memory for the replay tool and tests.

pub mod actor;
pub mod common;
pub mod layout_engine;
pub mod model;
pub mod replay;
pub mod sys;
pub mod ui;
