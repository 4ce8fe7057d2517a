//! Chunk-shape heuristic (spec §4.5 "Chunking"): picks a chunk shape aiming
//! for a target chunk byte budget, preferring to shrink larger dimensions
//! first, stepping down through `{4,2,1,0.5,0.25,0.125,0.0625} MiB`.

const MIB: f64 = 1024.0 * 1024.0;
/// Target chunk sizes to try in order, largest first, spec §4.5.
const TARGET_BUDGETS_MIB: &[f64] = &[4.0, 2.0, 1.0, 0.5, 0.25, 0.125, 0.0625];

/// Picks a chunk shape for a dataset of `extent` elements of `elem_size`
/// bytes each. Returns `None` if `extent` has a zero-sized dimension (HDF5
/// cannot chunk those) or is empty (a scalar has no chunk shape).
///
/// The heuristic starts from the full extent and, for each target budget
/// from largest to smallest, repeatedly halves the largest chunk dimension
/// until the chunk's byte size is at or below the budget, then returns that
/// shape. If the full extent already fits the largest budget, it is
/// returned unchanged (spec §4.5 "preferring larger dimensions first").
pub fn pick_chunk_shape(extent: &[u64], elem_size: usize) -> Option<Vec<u64>> {
    if extent.is_empty() || extent.iter().any(|&d| d == 0) {
        return None;
    }

    let mut shape: Vec<u64> = extent.to_vec();
    let chunk_bytes = |shape: &[u64]| -> f64 {
        shape.iter().product::<u64>() as f64 * elem_size as f64
    };

    for &budget_mib in TARGET_BUDGETS_MIB {
        let budget_bytes = budget_mib * MIB;
        if chunk_bytes(&shape) <= budget_bytes {
            return Some(shape);
        }
        // Halve the largest dimension repeatedly until this budget is met
        // or no dimension can shrink further.
        while chunk_bytes(&shape) > budget_bytes {
            let (idx, &max_dim) = shape
                .iter()
                .enumerate()
                .max_by_key(|(_, &d)| d)
                .expect("extent is non-empty");
            if max_dim <= 1 {
                break;
            }
            shape[idx] = max_dim.div_ceil(2);
        }
    }
    Some(shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_dataset_keeps_full_extent_as_its_chunk() {
        let shape = pick_chunk_shape(&[4, 4], 8).unwrap();
        assert_eq!(shape, vec![4, 4]);
    }

    #[test]
    fn large_dataset_shrinks_to_hit_a_budget() {
        // 2048 x 2048 doubles = 32 MiB, must shrink below the smallest
        // budget only if no earlier budget is reachable by halving.
        let shape = pick_chunk_shape(&[2048, 2048], 8).unwrap();
        let bytes: u64 = shape.iter().product::<u64>() * 8;
        assert!(bytes as f64 <= 4.0 * MIB);
    }

    #[test]
    fn zero_sized_dimension_has_no_chunk_shape() {
        assert!(pick_chunk_shape(&[0, 4], 8).is_none());
    }
}
