//! Genome structures: gametes and diploid individuals.

mod diploid;
mod gamete;

pub use diploid::{Diploid, DiploidMetadata};
pub use gamete::Gamete;
