//! Structural combinators on scops.
//!
//! Every operation consumes its input scop and returns the transformed
//! one. Operations that are naturally parameterized by a single value
//! also have a [`Transform`] implementation so they can be chained in a
//! [`Pipeline`].

pub mod arrays;
pub mod compose;
pub mod embed;
pub mod filter;
pub mod gist;
pub mod params;
pub mod pipeline;
pub mod prefix;
pub mod refs;
pub mod restrict;

pub use arrays::create_test_index;
pub use embed::Embed;
pub use filter::Filter;
pub use gist::Gist;
pub use pipeline::Pipeline;
pub use prefix::{IntersectDomainPrefix, Prefix};
pub use restrict::Restrict;

use crate::analysis::Scop;
use crate::utils::errors::ScopResult;
use crate::utils::intern::Ctx;

/// A transformation pass over a whole scop.
pub trait Transform {
    /// Apply the transformation.
    fn apply(&self, ctx: &Ctx, scop: Scop) -> ScopResult<Scop>;

    /// Get transformation name.
    fn name(&self) -> &str;
}
