//! Offline grouping of scene visual vectors and face vectors. Density
//! based: clusters need not be balanced, and points in no dense region
//! land in the unclustered sink.

use rayon::prelude::*;
use std::collections::VecDeque;
use tracing::info;

use crate::error::Result;
use crate::store::Store;

/// Cluster id reserved for noise and singletons. Consumers must treat it
/// as a distinct group, not a real cluster.
pub const UNCLUSTERED_ID: i32 = 0;

/// DBSCAN parameters over cosine distance (vectors are L2-normalized,
/// so distance = 1 - dot).
#[derive(Debug, Clone, Copy)]
pub struct ClusterParams {
    pub eps: f64,
    pub min_points: usize,
}

impl ClusterParams {
    /// Scene visual vectors: looser radius, scenes vary more than faces.
    pub fn scenes() -> Self {
        Self {
            eps: 0.35,
            min_points: 3,
        }
    }

    /// Face vectors: identity clusters are tight.
    pub fn faces() -> Self {
        Self {
            eps: 0.4,
            min_points: 2,
        }
    }
}

/// One row's assignment: cluster id plus its within-cluster order key
/// (distance to the cluster centroid, ascending = most representative).
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub id: i64,
    pub cluster_id: i32,
    pub order: f64,
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    1.0 - f64::from(dot)
}

/// DBSCAN over the full pairwise neighbourhood. Quadratic in the row
/// count; the neighbourhood scan parallelizes across rows.
pub fn cluster_vectors(items: &[(i64, Vec<f32>)], params: ClusterParams) -> Vec<Assignment> {
    let n = items.len();
    if n == 0 {
        return Vec::new();
    }

    let neighbourhoods: Vec<Vec<usize>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .filter(|&j| {
                    j != i && cosine_distance(&items[i].1, &items[j].1) <= params.eps
                })
                .collect()
        })
        .collect();

    const UNVISITED: i32 = -1;
    let mut labels = vec![UNVISITED; n];
    let mut next_cluster = UNCLUSTERED_ID + 1;

    for start in 0..n {
        if labels[start] != UNVISITED {
            continue;
        }
        if neighbourhoods[start].len() + 1 < params.min_points {
            labels[start] = UNCLUSTERED_ID;
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[start] = cluster;

        let mut frontier: VecDeque<usize> = neighbourhoods[start].iter().copied().collect();
        while let Some(point) = frontier.pop_front() {
            if labels[point] == UNCLUSTERED_ID {
                // Border point previously marked noise joins the cluster.
                labels[point] = cluster;
                continue;
            }
            if labels[point] != UNVISITED {
                continue;
            }
            labels[point] = cluster;
            if neighbourhoods[point].len() + 1 >= params.min_points {
                frontier.extend(neighbourhoods[point].iter().copied());
            }
        }
    }

    // Order key: distance to the cluster mean, including the sink so the
    // unclustered group still has a stable display order.
    let dim = items[0].1.len();
    let cluster_count = next_cluster as usize;
    let mut centroids = vec![vec![0.0f64; dim]; cluster_count];
    let mut counts = vec![0usize; cluster_count];
    for (i, (_, vector)) in items.iter().enumerate() {
        let label = labels[i] as usize;
        counts[label] += 1;
        for (c, v) in centroids[label].iter_mut().zip(vector.iter()) {
            *c += f64::from(*v);
        }
    }
    for (centroid, count) in centroids.iter_mut().zip(&counts) {
        if *count > 0 {
            for v in centroid.iter_mut() {
                *v /= *count as f64;
            }
        }
    }

    items
        .iter()
        .enumerate()
        .map(|(i, (id, vector))| {
            let label = labels[i];
            let centroid = &centroids[label as usize];
            let order = vector
                .iter()
                .zip(centroid.iter())
                .map(|(v, c)| (f64::from(*v) - c).powi(2))
                .sum::<f64>()
                .sqrt();
            Assignment {
                id: *id,
                cluster_id: label,
                order,
            }
        })
        .collect()
}

/// Re-cluster both populations and overwrite prior assignments.
pub async fn run_clustering(store: &Store) -> Result<()> {
    let scene_vectors = store.embeddings().list_vectors_for_model("clip").await?;
    let scene_items: Vec<(i64, Vec<f32>)> = scene_vectors
        .into_iter()
        .map(|(id, v)| (id, v.to_vec()))
        .collect();
    let scene_count = scene_items.len();
    let scene_assignments = tokio::task::spawn_blocking(move || {
        cluster_vectors(&scene_items, ClusterParams::scenes())
    })
    .await
    .map_err(|e| crate::error::FennecError::Internal(format!("cluster task failed: {e}")))?;

    let updates: Vec<(i64, i32, f64)> = scene_assignments
        .iter()
        .map(|a| (a.id, a.cluster_id, a.order))
        .collect();
    store.scenes().update_clusters(&updates).await?;

    let face_vectors = store.faces().list_all_vectors().await?;
    let face_items: Vec<(i64, Vec<f32>)> = face_vectors
        .into_iter()
        .map(|(id, v)| (id, v.to_vec()))
        .collect();
    let face_count = face_items.len();
    let face_assignments = tokio::task::spawn_blocking(move || {
        cluster_vectors(&face_items, ClusterParams::faces())
    })
    .await
    .map_err(|e| crate::error::FennecError::Internal(format!("cluster task failed: {e}")))?;

    let updates: Vec<(i64, i32, f64)> = face_assignments
        .iter()
        .map(|a| (a.id, a.cluster_id, a.order))
        .collect();
    store.faces().update_clusters(&updates).await?;

    info!(scenes = scene_count, faces = face_count, "clustering pass complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(theta: f32) -> Vec<f32> {
        vec![theta.cos(), theta.sin()]
    }

    #[test]
    fn two_groups_and_noise() {
        // Two tight angular groups plus one far outlier.
        let items = vec![
            (1, unit(0.00)),
            (2, unit(0.05)),
            (3, unit(0.10)),
            (4, unit(1.50)),
            (5, unit(1.55)),
            (6, unit(1.60)),
            (7, unit(3.10)),
        ];
        let assignments = cluster_vectors(
            &items,
            ClusterParams {
                eps: 0.05,
                min_points: 2,
            },
        );

        let label_of = |id: i64| {
            assignments
                .iter()
                .find(|a| a.id == id)
                .map(|a| a.cluster_id)
                .unwrap()
        };

        assert_eq!(label_of(1), label_of(2));
        assert_eq!(label_of(2), label_of(3));
        assert_eq!(label_of(4), label_of(5));
        assert_ne!(label_of(1), label_of(4));
        assert_ne!(label_of(1), UNCLUSTERED_ID);
        assert_ne!(label_of(4), UNCLUSTERED_ID);
        assert_eq!(label_of(7), UNCLUSTERED_ID);
    }

    #[test]
    fn central_member_orders_first() {
        let items = vec![
            (1, unit(-0.06)),
            (2, unit(0.0)),
            (3, unit(0.06)),
        ];
        let assignments = cluster_vectors(
            &items,
            ClusterParams {
                eps: 0.2,
                min_points: 2,
            },
        );

        let mut sorted = assignments.clone();
        sorted.sort_by(|a, b| a.order.total_cmp(&b.order));
        assert_eq!(sorted[0].id, 2);
    }

    #[test]
    fn empty_input_is_fine() {
        assert!(cluster_vectors(&[], ClusterParams::scenes()).is_empty());
    }

    #[test]
    fn rerun_is_deterministic() {
        let items = vec![
            (1, unit(0.0)),
            (2, unit(0.02)),
            (3, unit(2.0)),
            (4, unit(2.02)),
        ];
        let params = ClusterParams {
            eps: 0.05,
            min_points: 2,
        };
        let a = cluster_vectors(&items, params);
        let b = cluster_vectors(&items, params);
        assert_eq!(a, b);
    }
}
