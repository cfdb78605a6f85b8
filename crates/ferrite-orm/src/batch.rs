//! Staged create/delete batches, committed in dependency order.

use std::collections::HashMap;

use ferrite_core::Fragment;
use tracing::info;

use crate::driver::Driver;
use crate::entity::{Entity, EntityMeta};
use crate::error::Result;
use crate::manager::{delete_fragment, insert_fragment};
use crate::ordering;
use crate::queryset::run_execute;

/// A batch of pending creates and removes across entity types.
///
/// Statements are staged synchronously; [`SaveBatch::commit`] orders
/// them by declared foreign keys (creates principal-first, removes
/// dependent-first) and executes them sequentially. The first failure
/// aborts the remaining statements. Cycle detection runs before any
/// statement is sent.
#[derive(Debug, Default)]
pub struct SaveBatch {
    creates: Vec<(&'static EntityMeta, Fragment)>,
    removes: Vec<(&'static EntityMeta, Fragment)>,
}

impl SaveBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an INSERT for the entity.
    pub fn create<E: Entity>(&mut self, entity: &E) {
        self.creates.push((E::META, insert_fragment(entity)));
    }

    /// Stages a DELETE for the entity, keyed on its primary key.
    ///
    /// # Errors
    ///
    /// Fails when `E` has no primary key.
    pub fn remove<E: Entity>(&mut self, entity: &E) -> Result<()> {
        self.removes.push((E::META, delete_fragment(entity)?));
        Ok(())
    }

    /// Number of staged statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.creates.len() + self.removes.len()
    }

    /// Returns true when nothing has been staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.removes.is_empty()
    }

    fn participants(&self) -> Vec<&'static EntityMeta> {
        let mut metas: Vec<&'static EntityMeta> = Vec::new();
        for (meta, _) in self.creates.iter().chain(&self.removes) {
            if !metas.iter().any(|m| m.table == meta.table) {
                metas.push(meta);
            }
        }
        metas
    }

    /// Returns the staged statements in execution order: removes
    /// dependent-first, then creates principal-first. Staging order is
    /// preserved within each table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::OrmError::CyclicDependency`] when the
    /// participating types form a foreign-key cycle.
    pub fn statements(&self) -> Result<Vec<&Fragment>> {
        let metas = self.participants();
        let insert_rank = rank_by(&ordering::insert_order(&metas)?, &metas);
        let delete_rank = rank_by(&ordering::delete_order(&metas)?, &metas);

        let mut removes: Vec<&(&'static EntityMeta, Fragment)> = self.removes.iter().collect();
        removes.sort_by_key(|(meta, _)| delete_rank[meta.table]);
        let mut creates: Vec<&(&'static EntityMeta, Fragment)> = self.creates.iter().collect();
        creates.sort_by_key(|(meta, _)| insert_rank[meta.table]);

        Ok(removes
            .into_iter()
            .chain(creates)
            .map(|(_, frag)| frag)
            .collect())
    }

    /// Commits the batch and returns the total affected row count.
    ///
    /// # Errors
    ///
    /// Cycle errors abort before any I/O; the first driver failure
    /// aborts the remaining statements.
    pub async fn commit<D: Driver>(&self, driver: &D) -> Result<u64> {
        let statements = self.statements()?;
        info!(
            creates = self.creates.len(),
            removes = self.removes.len(),
            "committing save batch"
        );
        let mut affected = 0;
        for frag in statements {
            affected += run_execute(driver, frag).await?.rows_affected;
        }
        Ok(affected)
    }
}

fn rank_by(order: &[usize], metas: &[&'static EntityMeta]) -> HashMap<&'static str, usize> {
    order
        .iter()
        .enumerate()
        .map(|(rank, &i)| (metas[i].table, rank))
        .collect()
}
