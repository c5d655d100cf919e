//! Reference identifiers and anonymization.

use crate::analysis::{Scop, SkipKind};
use crate::ir::{Array, Stmt};
use crate::utils::intern::Ctx;

fn stmt_add_ref_ids(ctx: &Ctx, mut stmt: Stmt, n_ref: &mut usize) -> Stmt {
    stmt.args = std::mem::take(&mut stmt.args).into_iter()
        .map(|arg| arg.add_ref_ids(ctx, n_ref))
        .collect();
    stmt.body = stmt.body.add_ref_ids(ctx, n_ref);
    stmt
}

fn array_anonymize(mut array: Array) -> Array {
    array.context = array.context.reset_user();
    array.extent = array.extent.reset_user();
    array.value_bounds = array.value_bounds.map(|bounds| bounds.reset_user());
    array
}

fn stmt_anonymize(mut stmt: Stmt) -> Stmt {
    stmt.domain = stmt.domain.reset_user();
    stmt.schedule = stmt.schedule.reset_user();
    stmt.args = std::mem::take(&mut stmt.args).into_iter().map(|arg| arg.anonymize()).collect();
    stmt.body = stmt.body.anonymize();
    stmt
}

impl Scop {
    /// Give every access a unique reference identifier.
    ///
    /// Numbering is shared by all statements and visits the arguments of
    /// a statement before its body.
    pub fn add_ref_ids(mut self, ctx: &Ctx) -> Scop {
        let mut n_ref = 0;
        self.stmts = std::mem::take(&mut self.stmts).into_iter()
            .map(|stmt| stmt_add_ref_ids(ctx, stmt, &mut n_ref))
            .collect();
        log::trace!("assigned {} reference identifiers", n_ref);
        self
    }

    /// Forget which source entities the identifiers refer to.
    ///
    /// Names are kept, so the printed form does not change.
    pub fn anonymize(mut self) -> Scop {
        self.context = self.context.reset_user();
        self.context_value = self.context_value.reset_user();
        self.arrays = std::mem::take(&mut self.arrays).into_iter().map(array_anonymize).collect();
        self.stmts = std::mem::take(&mut self.stmts).into_iter().map(stmt_anonymize).collect();
        for implication in &mut self.implications {
            implication.extension = implication.extension.reset_user();
        }
        for kind in SkipKind::ALL {
            let skip = self.take_skip(kind).map(|skip| skip.reset_user());
            self.put_skip(kind, skip);
        }
        self
    }
}
