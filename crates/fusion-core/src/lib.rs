//! Engine-neutral types shared by the Fusion editor crates.

pub mod components;
pub mod events;
pub mod transform;
