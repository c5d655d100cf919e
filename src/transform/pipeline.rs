//! Sequences of transformations applied to one scop.

use crate::analysis::Scop;
use crate::transform::Transform;
use crate::utils::errors::ScopResult;
use crate::utils::intern::Ctx;

/// An ordered list of passes.
#[derive(Default)]
pub struct Pipeline {
    passes: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pass.
    pub fn with(mut self, pass: impl Transform + 'static) -> Self {
        self.passes.push(Box::new(pass));
        self
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Names of the passes, in application order.
    pub fn names(&self) -> Vec<&str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Run every pass in turn, stopping at the first failure.
    pub fn run(&self, ctx: &Ctx, scop: Scop) -> ScopResult<Scop> {
        let mut scop = scop;
        for pass in &self.passes {
            log::debug!("running {} on {} statements", pass.name(), scop.n_stmt());
            scop = pass.apply(ctx, scop).map_err(|err| {
                log::warn!("{} failed: {}", pass.name(), err);
                err
            })?;
        }
        Ok(scop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{parse_multi_pw_aff, parse_set};
    use crate::polyhedral::UnionMap;
    use crate::ir::Expr;
    use crate::transform::{Filter, Gist, Prefix, Restrict};
    use crate::utils::location::Loc;

    fn scop(ctx: &Ctx) -> Scop {
        let lhs = Expr::write_access(parse_multi_pw_aff(ctx, "{ [] -> A[] }").unwrap()).unwrap();
        Scop::from_expr(ctx, Loc::dummy(), None, 0, Expr::assign(lhs, Expr::Int(0))).unwrap()
    }

    #[test]
    fn test_pipeline_runs_in_order() {
        let ctx = Ctx::new();
        let pipeline = Pipeline::new()
            .with(Restrict::new(parse_set(&ctx, "[N] -> { : N > 0 }").unwrap()))
            .with(Prefix { pos: 2 })
            .with(Gist { value_bounds: UnionMap::empty(Vec::new()) });
        assert_eq!(pipeline.names(), ["restrict", "prefix", "gist"]);
        let scop = pipeline.run(&ctx, scop(&ctx)).unwrap();
        assert_eq!(scop.stmts[0].schedule.n_out(), 1);
        assert!(!scop.stmts[0].domain.contains(&[], &[0]));
    }

    #[test]
    fn test_pipeline_stops_on_error() {
        let ctx = Ctx::new();
        ctx.virtual_id("__pet_test_0");
        let test = parse_multi_pw_aff(&ctx, "{ [] -> __pet_test_0[] }").unwrap();
        let skip = parse_multi_pw_aff(&ctx, "[b] -> { [] -> [b] }").unwrap();
        let scop = scop(&ctx).set_skip(crate::analysis::SkipKind::Now, skip);
        let pipeline = Pipeline::new().with(Filter::new(test, false)).with(Prefix { pos: 0 });
        assert!(pipeline.run(&ctx, scop).is_err());
        assert!(Pipeline::new().is_empty());
    }
}
