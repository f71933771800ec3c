//! Photo editor and architectural analyst backed by Gemini
//!
//! Lets a user load a photograph, ask an image model to edit it from a text
//! prompt, or ask a vision model for an architectural analysis of it. A single
//! [`controller::Controller`] owns the session state; [`view`] derives what the
//! terminal shows from that state.

pub mod ai;
pub mod app;
pub mod controller;
pub mod encoder;
pub mod error;
pub mod models;
pub mod prompts;
pub mod shell;
pub mod view;

pub use error::{Error, Result};
