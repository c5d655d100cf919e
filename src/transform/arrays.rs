//! Synthesized arrays holding the outcome of data-dependent tests.

use crate::analysis::Scop;
use crate::ir::{Array, Implication};
use crate::polyhedral::{IntegerMap, IntegerSet, MultiPwAff, Space, Tuple};
use crate::utils::errors::AlgebraResult;
use crate::utils::intern::Ctx;

/// The index expression `{ [] -> __pet_test_n[] }` of the `n`-th
/// virtual test variable.
pub fn create_test_index(ctx: &Ctx, n: usize) -> MultiPwAff {
    let name = format!("{}_{}", ctx.config().test_prefix, n);
    let id = ctx.virtual_id(&name);
    MultiPwAff::zero(Space::map(Vec::new(), Tuple::anonymous(0), Tuple::named(id, 0)))
}

impl Scop {
    /// Declare the 0/1-valued array accessed by `index`.
    pub fn add_boolean_array(self, index: &MultiPwAff, int_size: usize) -> AlgebraResult<Scop> {
        let extent = index.to_map()?.range()?;
        let values = IntegerSet::universe(Space::set(Vec::new(), Tuple::anonymous(1)))
            .lower_bound(0, 0)
            .upper_bound(0, 1);
        let mut array = Array::new(extent, "int", int_size);
        array.value_bounds = Some(values);
        array.uniquely_defined = true;
        log::trace!("boolean array {:?}", array.id().map(|id| id.name()));
        Ok(self.add_array(array))
    }

    /// Record that an element of a virtual test array with value
    /// `satisfied` implies the same value on the elements it is mapped to.
    pub fn add_implication(mut self, extension: IntegerMap, satisfied: bool) -> Scop {
        self.implications.push(Implication::new(extension, satisfied));
        self
    }
}
