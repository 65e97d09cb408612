//! Content-aware healing brush engine.
//!
//! The per-dab pipeline lives in [`ops::heal`]; [`worker`] hosts it on a
//! dedicated thread behind a request/reply protocol, and [`cli`] drives that
//! worker headlessly over image files.

pub mod cli;
pub mod error;
pub mod logger;
pub mod ops;
pub mod settings;
pub mod stroke_file;
pub mod worker;

pub use error::{HealError, HealResult};
pub use ops::heal::{Dab, DabPatch, HealParams, HealQuality, Roi, apply_dab};
pub use worker::{HealRequest, HealResponse, HealSession, HealingEngine, PixelBuffer};
