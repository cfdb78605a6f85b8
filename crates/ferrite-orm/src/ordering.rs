//! Topological ordering of entity types by foreign-key dependencies.
//!
//! Creates must write principal rows before dependent rows; deletes run
//! in the exact reverse order. A cycle among the batch's types is a hard
//! error, detected before any statement is sent.

use std::collections::{HashMap, VecDeque};

use crate::entity::EntityMeta;
use crate::error::{OrmError, Result};

/// Returns indices into `metas` ordered so every referenced (principal)
/// type precedes its dependents. Foreign keys pointing at tables outside
/// the batch are ignored, as are self-references.
///
/// # Errors
///
/// Returns [`OrmError::CyclicDependency`] naming the tables left in the
/// cycle when the graph cannot be fully consumed.
pub fn insert_order(metas: &[&'static EntityMeta]) -> Result<Vec<usize>> {
    let index: HashMap<&str, usize> = metas
        .iter()
        .enumerate()
        .map(|(i, m)| (m.table, i))
        .collect();

    let mut in_degree = vec![0_usize; metas.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); metas.len()];
    for (i, meta) in metas.iter().enumerate() {
        for fk in meta.foreign_keys {
            if let Some(&principal) = index.get(fk.references) {
                if principal != i {
                    dependents[principal].push(i);
                    in_degree[i] += 1;
                }
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..metas.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(metas.len());
    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &dependent in &dependents[i] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if order.len() != metas.len() {
        let tables = (0..metas.len())
            .filter(|i| !order.contains(i))
            .map(|i| metas[i].table)
            .collect::<Vec<_>>()
            .join(", ");
        return Err(OrmError::CyclicDependency { tables });
    }
    Ok(order)
}

/// The delete order: the exact reverse of [`insert_order`], never
/// recomputed independently.
///
/// # Errors
///
/// Same failure modes as [`insert_order`].
pub fn delete_order(metas: &[&'static EntityMeta]) -> Result<Vec<usize>> {
    let mut order = insert_order(metas)?;
    order.reverse();
    Ok(order)
}
