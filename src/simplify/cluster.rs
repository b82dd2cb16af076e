//! Grid vertex clustering for meshes edge collapse cannot reduce further

use std::collections::{HashMap, HashSet};

use crate::core::types::Vec3;

const MAX_GRID: u32 = 4096;

/// Reduce `indices` to at most `target_tris` triangles
///
/// Snaps vertices to a uniform grid, keeping the first vertex seen in each
/// cell, at the finest resolution that meets the target. Meshes that
/// cluster to nothing are thinned by even triangle sampling instead.
pub fn reduce(indices: &[u32], positions: &[Vec3], target_tris: usize) -> Vec<u32> {
    if indices.len() <= target_tris * 3 {
        return indices.to_vec();
    }
    if target_tris == 0 {
        return Vec::new();
    }

    let mut best: Vec<u32> = Vec::new();
    let (mut lo, mut hi) = (1u32, MAX_GRID);
    while lo <= hi {
        let mid = lo + (hi - lo) / 2;
        let out = cluster(indices, positions, mid);
        if out.len() <= target_tris * 3 {
            if out.len() > best.len() {
                best = out;
            }
            lo = mid + 1;
        } else if mid == 1 {
            break;
        } else {
            hi = mid - 1;
        }
    }

    if best.is_empty() {
        sample(indices, target_tris)
    } else {
        best
    }
}

/// Remap every vertex to its cell representative, dropping collapsed triangles
pub fn cluster(indices: &[u32], positions: &[Vec3], grid: u32) -> Vec<u32> {
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for &i in indices {
        let p = positions[i as usize];
        min = min.min(p);
        max = max.max(p);
    }
    let extent = (max - min).max_element().max(f32::EPSILON);
    let scale = grid as f32 / extent;

    let cell_of = |p: Vec3| -> (u32, u32, u32) {
        let c = ((p - min) * scale).floor();
        let clamp = |v: f32| (v.max(0.0) as u32).min(grid - 1);
        (clamp(c.x), clamp(c.y), clamp(c.z))
    };

    let mut representative: HashMap<(u32, u32, u32), u32> = HashMap::new();
    let mut seen: HashSet<[u32; 3]> = HashSet::new();
    let mut out = Vec::new();
    for tri in indices.chunks_exact(3) {
        let mapped = [tri[0], tri[1], tri[2]].map(|v| {
            *representative
                .entry(cell_of(positions[v as usize]))
                .or_insert(v)
        });
        if mapped[0] == mapped[1] || mapped[1] == mapped[2] || mapped[0] == mapped[2] {
            continue;
        }
        let mut key = mapped;
        key.sort_unstable();
        if seen.insert(key) {
            out.extend_from_slice(&mapped);
        }
    }
    out
}

/// Keep `target_tris` triangles spread evenly through the buffer
pub fn sample(indices: &[u32], target_tris: usize) -> Vec<u32> {
    let total = indices.len() / 3;
    if total <= target_tris {
        return indices.to_vec();
    }
    (0..target_tris)
        .map(|k| k * total / target_tris)
        .flat_map(|t| indices[t * 3..t * 3 + 3].iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn soup(count: usize) -> (Vec<Vec3>, Vec<u32>) {
        let mut positions = Vec::new();
        for i in 0..count {
            let o = Vec3::new((i % 16) as f32, (i / 16) as f32, 0.0);
            positions.extend_from_slice(&[
                o,
                o + Vec3::new(0.9, 0.0, 0.0),
                o + Vec3::new(0.0, 0.9, 0.0),
            ]);
        }
        let indices = (0..positions.len() as u32).collect();
        (positions, indices)
    }

    #[test]
    fn test_reduce_meets_target() {
        let (positions, indices) = soup(256);
        for target in [1, 10, 100, 200] {
            let out = reduce(&indices, &positions, target);
            assert!(out.len() <= target * 3, "target {target}");
            assert!(!out.is_empty());
        }
    }

    #[test]
    fn test_cluster_keeps_existing_vertices() {
        let (positions, indices) = soup(64);
        let out = cluster(&indices, &positions, 4);
        let original: HashSet<u32> = indices.iter().copied().collect();
        assert!(out.iter().all(|i| original.contains(i)));
    }

    #[test]
    fn test_single_cell_collapses_everything() {
        let (positions, indices) = soup(8);
        assert!(cluster(&indices, &positions, 1).is_empty());
    }

    #[test]
    fn test_sample_even_spread() {
        let indices: Vec<u32> = (0..30).collect();
        assert_eq!(sample(&indices, 2), vec![0, 1, 2, 15, 16, 17]);
        assert_eq!(sample(&indices, 20), indices);
    }
}
