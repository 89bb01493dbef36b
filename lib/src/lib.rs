pub mod chrom;
pub mod codec;
pub mod error;
pub mod genes;
pub mod tokens;

pub use chrom::{ChromEntry, CoordSpace};
pub use codec::{Locus, ParsedToken, PositionExpr, PositionRange};
pub use error::CoordError;
pub use genes::{GeneSuggestion, Resolutions};
