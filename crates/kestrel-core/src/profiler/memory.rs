//! # Memory Profiler
//!
//! Pool statistics snapshots, baseline deltas, and their console rendering.
//!
//! A snapshot is a run of pool records, each a 56-byte header followed by
//! `tag_count` 40-byte tag statistics. The target may split a snapshot over
//! any number of packets and marks the end of one with an end-of-round
//! notification; see [`super::ProfilerSink`].

use scroll::{Pread, Pwrite, SizeWith, LE};

use crate::error::{KestrelError, KestrelResult};

/// `'Pool'` in little-endian ASCII.
pub const MEMORY_POOL_MAGIC: u32 = 0x6C6F_6F50;
pub const POOL_HEADER_SIZE: usize = 56;
pub const TAG_STATISTIC_SIZE: usize = 40;

const RULE: &str = "----------------------------------------------------------------------------------------";

/// Fixed part of a pool record as sent by the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pread, Pwrite, SizeWith)]
pub struct PoolHeader
{
    /// [`MEMORY_POOL_MAGIC`]
    pub magic: u32,
    /// Tag statistics following this header.
    pub tag_count: u32,
    pub memory_type: u32,
    pub reserved: u32,
    pub total_pool_size: u64,
    pub free_list_size: u64,
    pub allocation_calls: u64,
    pub free_calls: u64,
    pub failed_allocations: u64,
}

/// Per-tag allocation statistics, in the target's wire layout.
///
/// In a delta, counters hold wrapped differences and are printed signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pread, Pwrite, SizeWith)]
pub struct TagStatistic
{
    pub tag: u32,
    pub largest_allocation: u32,
    pub active_size: u64,
    pub largest_active_size: u64,
    pub lifetime_allocation_size: u64,
    pub active_count: u32,
    pub largest_active_count: u32,
}

impl TagStatistic
{
    /// Four-character tag as printed in the table.
    #[must_use]
    pub fn tag_text(&self) -> String
    {
        self.tag.to_le_bytes().iter().map(|byte| char::from(*byte)).collect()
    }

    fn is_zero(&self) -> bool
    {
        *self == Self {
            tag: self.tag,
            ..Self::default()
        }
    }

    #[allow(clippy::cast_possible_wrap)]
    fn signed_active_count(&self) -> i32
    {
        self.active_count as i32
    }
}

/// Statistics for one memory pool.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryPool
{
    pub memory_type: u32,
    pub total_pool_size: u64,
    pub free_list_size: u64,
    pub allocation_calls: u64,
    pub free_calls: u64,
    pub failed_allocations: u64,
    pub tags: Vec<TagStatistic>,
}

/// Decode a complete snapshot.
///
/// ## Errors
///
/// Returns [`KestrelError::Invalid`] for a bad pool magic or a record cut short.
pub fn decode_pools(data: &[u8]) -> KestrelResult<Vec<MemoryPool>>
{
    let mut pools = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        if data.len() - offset < POOL_HEADER_SIZE {
            return Err(KestrelError::invalid("Invalid memory pool data."));
        }

        let header: PoolHeader = data.gread_with(&mut offset, LE)?;
        if header.magic != MEMORY_POOL_MAGIC {
            return Err(KestrelError::invalid(format!(
                "Found 0x{:08x} when expected pool magic 0x{MEMORY_POOL_MAGIC:08x}.",
                header.magic
            )));
        }

        let tag_count = header.tag_count as usize;
        let needed = tag_count.saturating_mul(TAG_STATISTIC_SIZE);
        let left = data.len() - offset;
        if needed > left {
            return Err(KestrelError::invalid(format!(
                "Unexpected end of memory data buffer. {needed} bytes needed for {tag_count} tags, {left} available."
            )));
        }

        let mut tags = Vec::with_capacity(tag_count);
        for _ in 0..tag_count {
            tags.push(data.gread_with::<TagStatistic>(&mut offset, LE)?);
        }
        pools.push(MemoryPool {
            memory_type: header.memory_type,
            total_pool_size: header.total_pool_size,
            free_list_size: header.free_list_size,
            allocation_calls: header.allocation_calls,
            free_calls: header.free_calls,
            failed_allocations: header.failed_allocations,
            tags,
        });
    }

    tracing::debug!(pools = pools.len(), "decoded memory snapshot");
    Ok(pools)
}

fn zero_if_same<T: PartialEq + Default>(current: T, base: T) -> T
{
    if current == base { T::default() } else { current }
}

/// Difference of `current` against `base`.
///
/// Pools are matched by memory type and tags by tag value. Counters are
/// subtracted, high-water marks that did not move are zeroed, and anything
/// without a counterpart in `base` is copied unchanged.
#[must_use]
pub fn delta(current: &[MemoryPool], base: &[MemoryPool]) -> Vec<MemoryPool>
{
    current
        .iter()
        .map(|pool| {
            let Some(base_pool) = base.iter().find(|candidate| candidate.memory_type == pool.memory_type) else {
                return pool.clone();
            };

            let unchanged_size = pool.total_pool_size == base_pool.total_pool_size
                && pool.free_list_size == base_pool.free_list_size;

            let tags = pool
                .tags
                .iter()
                .map(|statistic| {
                    let Some(base_statistic) = base_pool.tags.iter().find(|candidate| candidate.tag == statistic.tag)
                    else {
                        return *statistic;
                    };

                    TagStatistic {
                        tag: statistic.tag,
                        largest_allocation: zero_if_same(
                            statistic.largest_allocation,
                            base_statistic.largest_allocation,
                        ),
                        active_size: statistic.active_size.wrapping_sub(base_statistic.active_size),
                        largest_active_size: zero_if_same(
                            statistic.largest_active_size,
                            base_statistic.largest_active_size,
                        ),
                        lifetime_allocation_size: zero_if_same(
                            statistic.lifetime_allocation_size,
                            base_statistic.lifetime_allocation_size,
                        ),
                        active_count: statistic.active_count.wrapping_sub(base_statistic.active_count),
                        largest_active_count: zero_if_same(
                            statistic.largest_active_count,
                            base_statistic.largest_active_count,
                        ),
                    }
                })
                .collect();

            MemoryPool {
                memory_type: pool.memory_type,
                total_pool_size: if unchanged_size { 0 } else { pool.total_pool_size },
                free_list_size: if unchanged_size { 0 } else { pool.free_list_size },
                allocation_calls: pool.allocation_calls.wrapping_sub(base_pool.allocation_calls),
                free_calls: pool.free_calls.wrapping_sub(base_pool.free_calls),
                failed_allocations: pool.failed_allocations.wrapping_sub(base_pool.failed_allocations),
                tags,
            }
        })
        .collect()
}

#[allow(clippy::cast_possible_wrap)]
fn signed(value: u64) -> i64
{
    value as i64
}

/// Render pools as the memory profiler table.
///
/// Normal mode prints every tag whose active count reaches `threshold`. Delta
/// mode compares magnitudes against the threshold, skips tags that did not
/// change at all, and prints `-` for fields that did not change.
#[must_use]
pub fn render_pools(pools: &[MemoryPool], delta_mode: bool, threshold: i32) -> String
{
    let mut out = String::new();
    for pool in pools {
        if pool.total_pool_size == 0 {
            out.push_str(&format!(
                "Pool Type {}, Size -, -% free, {} allocation calls, {} free calls, {} failed.\n",
                pool.memory_type,
                signed(pool.allocation_calls),
                signed(pool.free_calls),
                signed(pool.failed_allocations)
            ));
        } else {
            let free_percentage = u128::from(pool.free_list_size) * 100 / u128::from(pool.total_pool_size);
            out.push_str(&format!(
                "Pool Type {}, Size {:x}h, {}% free, {} allocation calls, {} free calls, {} failed.\n",
                pool.memory_type,
                pool.total_pool_size,
                free_percentage,
                signed(pool.allocation_calls),
                signed(pool.free_calls),
                signed(pool.failed_allocations)
            ));
        }

        out.push_str(&format!("{RULE}\n"));
        out.push_str("       Largest                                       Active Max Active\n");
        out.push_str("Tag      Alloc      Active Bytes  Max Active Bytes    Count      Count    Lifetime Alloc\n");
        out.push_str(&format!("{RULE}\n"));

        for statistic in &pool.tags {
            if delta_mode {
                if statistic.signed_active_count().unsigned_abs() < threshold.unsigned_abs() || statistic.is_zero() {
                    continue;
                }
                render_delta_row(&mut out, statistic);
            } else {
                if i64::from(statistic.active_count) < i64::from(threshold) {
                    continue;
                }
                out.push_str(&format!(
                    "{} {:8x}h {:16x}h {:16x}h {:8}   {:8} {:16x}h\n",
                    statistic.tag_text(),
                    statistic.largest_allocation,
                    statistic.active_size,
                    statistic.largest_active_size,
                    statistic.active_count,
                    statistic.largest_active_count,
                    statistic.lifetime_allocation_size
                ));
            }
        }

        out.push('\n');
    }
    out
}

fn render_delta_row(out: &mut String, statistic: &TagStatistic)
{
    out.push_str(&statistic.tag_text());
    out.push(' ');

    if statistic.largest_allocation == 0 {
        out.push_str("        - ");
    } else {
        out.push_str(&format!("{:8x}h ", statistic.largest_allocation));
    }

    if statistic.active_size == 0 {
        out.push_str("                - ");
    } else {
        out.push_str(&format!(" {:16} ", signed(statistic.active_size)));
    }

    if statistic.largest_active_size == 0 {
        out.push_str("                - ");
    } else {
        out.push_str(&format!("{:16x}h ", statistic.largest_active_size));
    }

    if statistic.active_count == 0 {
        out.push_str("       -   ");
    } else {
        out.push_str(&format!("{:8}   ", statistic.signed_active_count()));
    }

    if statistic.largest_active_count == 0 {
        out.push_str("       - ");
    } else {
        out.push_str(&format!("{:8} ", statistic.largest_active_count));
    }

    if statistic.lifetime_allocation_size == 0 {
        out.push_str("                -\n");
    } else {
        out.push_str(&format!("{:16x}h\n", statistic.lifetime_allocation_size));
    }
}

/// Encode pools in the target's wire layout.
#[cfg(test)]
pub(crate) fn encode_pools(pools: &[MemoryPool]) -> Vec<u8>
{
    let size = pools
        .iter()
        .map(|pool| POOL_HEADER_SIZE + pool.tags.len() * TAG_STATISTIC_SIZE)
        .sum();
    let mut data = vec![0u8; size];
    let buffer = data.as_mut_slice();
    let mut offset = 0;
    for pool in pools {
        let header = PoolHeader {
            magic: MEMORY_POOL_MAGIC,
            tag_count: u32::try_from(pool.tags.len()).unwrap(),
            memory_type: pool.memory_type,
            reserved: 0,
            total_pool_size: pool.total_pool_size,
            free_list_size: pool.free_list_size,
            allocation_calls: pool.allocation_calls,
            free_calls: pool.free_calls,
            failed_allocations: pool.failed_allocations,
        };
        buffer.gwrite_with(header, &mut offset, LE).unwrap();
        for statistic in &pool.tags {
            buffer.gwrite_with(*statistic, &mut offset, LE).unwrap();
        }
    }
    data
}
