//! Decoy row generation.
//!
//! For every genuine insert, [`DecoyGenerator`] produces a batch of rows with
//! the same columns and the same encryption envelope as the genuine row, whose
//! integrity tags fail verification by construction.
//!
//! # Module invariants
//!
//! - A decoy has exactly the columns of a genuine row of its kind.
//! - Sensitive decoy columns are encrypted with the same cipher as genuine
//!   ones; the tag column has the same length as a genuine tag.
//! - No decoy ever verifies as genuine.

pub mod generator;
pub mod rng;
pub mod synth;

pub use generator::{DecoyGenerator, DecoyShape, TagStrategy};
pub use rng::DecoyRng;
