//! Deterministic splitting of frequency blocks into partitions

use crate::error::CacheError;

/// Compute left/right-most index offsets selecting one partition of a
/// frequency block.
///
/// Divides `total_points` into `num_partitions` contiguous index ranges
/// as evenly as possible; the first `total_points % num_partitions`
/// partitions receive one extra point. Returns the cumulative offset to
/// the left-most index and `left + size - total_points` as the offset to
/// the right-most index, so that applying both to a block's bounds
/// selects exactly the requested partition.
pub fn partition_offsets(
    total_points: u32,
    num_partitions: u32,
    partition_index: u32,
) -> Result<(i32, i32), CacheError> {
    if num_partitions == 0 {
        return Err(CacheError::invalid_argument("num_partitions must be > 0"));
    }
    if partition_index >= num_partitions {
        return Err(CacheError::invalid_argument(format!(
            "partition index {} out of range [0,{})",
            partition_index, num_partitions
        )));
    }

    // Minimum number of points in a partition
    let min_points = total_points / num_partitions;

    // Excess points which must be spread over the leading partitions
    let mut excess = (total_points - num_partitions * min_points) as i32;

    // Points in the current partition; one extra while excess remains
    let mut size = min_points as i32;
    if excess > 0 {
        size += 1;
    }

    // Walk partitions up to the requested one, accumulating the left
    // offset and dropping the extra point once the excess runs out
    let mut left = 0i32;
    for _ in 0..partition_index {
        left += size;
        excess -= 1;
        if excess == 0 {
            size -= 1;
        }
    }
    let right = left + size - total_points as i32;

    if left < 0 {
        return Err(CacheError::inconsistency(format!(
            "partition left offset {} < 0",
            left
        )));
    }
    if right > 0 {
        return Err(CacheError::inconsistency(format!(
            "partition right offset {} > 0",
            right
        )));
    }

    Ok((left, right))
}
