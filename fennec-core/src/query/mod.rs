//! Read-side operations behind the API service: browse, combined-filter
//! search, scene detail, stats, queue snapshot, and EDL export.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{FennecError, Result};
use crate::media::edl::{self, EdlClip};
use crate::models::{SentenceEncoder, VisualEncoder};
use crate::store::{ScenePredicates, Store};
use crate::types::filters::{SceneHit, SearchFilter, SearchRequest, SearchResponse};
use crate::types::scene::{Face, SceneDetail, SceneWithFile};
use crate::types::stats::WatchFolderStatus;

/// Upper bound on candidates admitted per similarity clause before
/// intersection; keeps a threshold of 0 from streaming the whole table.
const SIMILARITY_CANDIDATES: i64 = 1000;

/// One filter clause evaluated to the scenes it admits. Similarity
/// clauses carry scores for ordering.
enum ClauseResult {
    Ids(Vec<i64>),
    Scored(Vec<(i64, f64)>),
}

#[derive(Clone)]
pub struct QueryEngine {
    store: Store,
    visual: Arc<dyn VisualEncoder>,
    sentence: Arc<dyn SentenceEncoder>,
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine").finish_non_exhaustive()
    }
}

impl QueryEngine {
    pub fn new(
        store: Store,
        visual: Arc<dyn VisualEncoder>,
        sentence: Arc<dyn SentenceEncoder>,
    ) -> Self {
        Self {
            store,
            visual,
            sentence,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Readiness of the query-side encoder hosts; semantic features gate
    /// on this.
    pub async fn readiness(&self) -> crate::models::ModelReadiness {
        crate::models::ModelReadiness {
            visual: self.visual.ready().await,
            sentence: self.sentence.ready().await,
        }
    }

    pub async fn browse(&self, offset: i64, limit: i64) -> Result<SearchResponse> {
        if offset < 0 || limit < 0 {
            return Err(FennecError::BadRequest(
                "offset and limit must be non-negative".into(),
            ));
        }
        let (rows, total) = self.store.scenes().browse(offset, limit).await?;
        let scenes = self.hydrate(rows, &HashMap::new()).await?;
        Ok(SearchResponse {
            scenes,
            total,
            keyword_fallback: false,
        })
    }

    /// Combined-filter search: clauses intersect on scene id; the first
    /// similarity clause's score orders the result.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        if request.filters.is_empty() {
            return Err(FennecError::BadRequest("no filters given".into()));
        }

        let thresholds = self.store.config().search_thresholds().await?;
        let mut keyword_fallback = false;
        let mut intersection: Option<Vec<i64>> = None;
        let mut ordering_scores: Option<HashMap<i64, f64>> = None;

        for filter in &request.filters {
            let result = match filter {
                SearchFilter::VisualText { query, threshold } => {
                    let threshold = validate_threshold(threshold.unwrap_or(thresholds.visual))?;
                    let vector = self.visual.embed_text(query).await?;
                    let matches = self
                        .store
                        .embeddings()
                        .nearest("clip", &vector, None, threshold, SIMILARITY_CANDIDATES)
                        .await?;
                    ClauseResult::Scored(
                        matches.into_iter().map(|m| (m.scene_id, m.similarity)).collect(),
                    )
                }
                SearchFilter::DialogSemantic { query, threshold } => {
                    if self.sentence.ready().await {
                        let threshold =
                            validate_threshold(threshold.unwrap_or(thresholds.transcript))?;
                        let vector = self.sentence.embed(query).await?;
                        let matches = self
                            .store
                            .embeddings()
                            .nearest(
                                "transcript",
                                &vector,
                                None,
                                threshold,
                                SIMILARITY_CANDIDATES,
                            )
                            .await?;
                        ClauseResult::Scored(
                            matches.into_iter().map(|m| (m.scene_id, m.similarity)).collect(),
                        )
                    } else {
                        // Sentence host still loading: degrade to keyword.
                        debug!("sentence encoder not ready, dialog search degrades to keyword");
                        keyword_fallback = true;
                        let predicates = ScenePredicates {
                            transcript_like: Some(query.clone()),
                            ..Default::default()
                        };
                        ClauseResult::Ids(self.store.scenes().filter_ids(&predicates).await?)
                    }
                }
                SearchFilter::DialogKeyword { query } => {
                    let predicates = ScenePredicates {
                        transcript_like: Some(query.clone()),
                        ..Default::default()
                    };
                    ClauseResult::Ids(self.store.scenes().filter_ids(&predicates).await?)
                }
                SearchFilter::Face {
                    face_id,
                    scene_id,
                    face_index,
                    threshold,
                } => {
                    let threshold = validate_threshold(threshold.unwrap_or(thresholds.face))?;
                    let face = self.resolve_face(*face_id, *scene_id, *face_index).await?;
                    let matches = self
                        .store
                        .faces()
                        .nearest(
                            face.embedding.as_slice(),
                            None,
                            threshold,
                            SIMILARITY_CANDIDATES,
                        )
                        .await?;
                    // Project faces back to parent scenes, keeping the
                    // best face score per scene.
                    let mut by_scene: HashMap<i64, f64> = HashMap::new();
                    for m in matches {
                        let entry = by_scene.entry(m.scene_id).or_insert(m.similarity);
                        if m.similarity > *entry {
                            *entry = m.similarity;
                        }
                    }
                    ClauseResult::Scored(by_scene.into_iter().collect())
                }
                SearchFilter::VisualMatch { scene_id, threshold } => {
                    let threshold =
                        validate_threshold(threshold.unwrap_or(thresholds.visual_match))?;
                    let reference = self
                        .store
                        .embeddings()
                        .get(*scene_id, "clip")
                        .await?
                        .ok_or_else(|| {
                            FennecError::NotFound(format!(
                                "scene {scene_id} has no visual embedding"
                            ))
                        })?;
                    let matches = self
                        .store
                        .embeddings()
                        .nearest(
                            "clip",
                            reference.embedding.as_slice(),
                            Some(*scene_id),
                            threshold,
                            SIMILARITY_CANDIDATES,
                        )
                        .await?;
                    ClauseResult::Scored(
                        matches.into_iter().map(|m| (m.scene_id, m.similarity)).collect(),
                    )
                }
                SearchFilter::Path { query } => {
                    let predicates = ScenePredicates {
                        path_like: Some(query.clone()),
                        ..Default::default()
                    };
                    ClauseResult::Ids(self.store.scenes().filter_ids(&predicates).await?)
                }
                SearchFilter::Codec { codec } => {
                    let predicates = ScenePredicates {
                        codec: Some(codec.clone()),
                        ..Default::default()
                    };
                    ClauseResult::Ids(self.store.scenes().filter_ids(&predicates).await?)
                }
                SearchFilter::FpsRange { min, max } => {
                    let predicates = ScenePredicates {
                        fps_min: *min,
                        fps_max: *max,
                        ..Default::default()
                    };
                    ClauseResult::Ids(self.store.scenes().filter_ids(&predicates).await?)
                }
                SearchFilter::DurationRange { min_secs, max_secs } => {
                    let predicates = ScenePredicates {
                        duration_min: *min_secs,
                        duration_max: *max_secs,
                        ..Default::default()
                    };
                    ClauseResult::Ids(self.store.scenes().filter_ids(&predicates).await?)
                }
                SearchFilter::ResolutionMin {
                    min_width,
                    min_height,
                } => {
                    let predicates = ScenePredicates {
                        min_width: *min_width,
                        min_height: *min_height,
                        ..Default::default()
                    };
                    ClauseResult::Ids(self.store.scenes().filter_ids(&predicates).await?)
                }
                SearchFilter::TimecodeRange {
                    start_secs,
                    end_secs,
                } => {
                    let predicates = ScenePredicates {
                        timecode_start: *start_secs,
                        timecode_end: *end_secs,
                        ..Default::default()
                    };
                    ClauseResult::Ids(self.store.scenes().filter_ids(&predicates).await?)
                }
            };

            let ids = match result {
                ClauseResult::Ids(ids) => ids,
                ClauseResult::Scored(scored) => {
                    let ids = scored.iter().map(|(id, _)| *id).collect();
                    if ordering_scores.is_none() {
                        ordering_scores = Some(scored.into_iter().collect());
                    }
                    ids
                }
            };

            intersection = Some(match intersection.take() {
                None => ids,
                Some(current) => intersect(current, ids),
            });
        }

        let mut ids = intersection.unwrap_or_default();
        let scores = ordering_scores.unwrap_or_default();

        // Primary order: first similarity clause's score, descending.
        // Metadata-only searches fall through to (file, scene) order,
        // applied after hydration below.
        ids.sort_by(|a, b| match (scores.get(a), scores.get(b)) {
            (Some(x), Some(y)) => y.total_cmp(x),
            _ => a.cmp(b),
        });

        let total = ids.len() as i64;
        let offset = request.offset.max(0) as usize;
        let limit = request.limit.max(0) as usize;
        let page: Vec<i64> = ids.into_iter().skip(offset).take(limit).collect();

        let rows = self.store.scenes().list_with_file_by_ids(&page).await?;
        let mut scenes = self.hydrate(rows, &scores).await?;

        // list_with_file_by_ids does not preserve input order.
        let position: HashMap<i64, usize> =
            page.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        scenes.sort_by_key(|hit| position.get(&hit.scene_id).copied().unwrap_or(usize::MAX));
        if scores.is_empty() {
            scenes.sort_by(|a, b| {
                (a.file_id, a.scene_index).cmp(&(b.file_id, b.scene_index))
            });
        }

        Ok(SearchResponse {
            scenes,
            total,
            keyword_fallback,
        })
    }

    pub async fn scene_detail(&self, scene_id: i64) -> Result<SceneDetail> {
        let scene = self.store.scenes().get(scene_id).await?;
        let file = self.store.files().get(scene.file_id).await?;
        let embeddings = self.store.embeddings().summaries_for_scene(scene_id).await?;
        let faces = self.store.faces().list_for_scene(scene_id).await?;

        Ok(SceneDetail {
            scene,
            file_path: file.path,
            filename: file.filename,
            fps: file.fps,
            embeddings,
            faces,
        })
    }

    /// Emit an EDL for an ordered list of scene intervals.
    pub async fn export_edl(
        &self,
        title: &str,
        entries: &[(i64, f64, f64)],
    ) -> Result<String> {
        let mut clips = Vec::with_capacity(entries.len());
        for (scene_id, in_secs, out_secs) in entries {
            if out_secs <= in_secs {
                return Err(FennecError::BadRequest(format!(
                    "scene {scene_id}: out before in"
                )));
            }
            let scene = self.store.scenes().get(*scene_id).await?;
            let file = self.store.files().get(scene.file_id).await?;
            clips.push(EdlClip {
                scene_id: *scene_id,
                in_secs: *in_secs,
                out_secs: *out_secs,
                fps: file.fps.unwrap_or(25.0),
                clip_name: file.filename,
            });
        }
        Ok(edl::export_edl(title, &clips))
    }

    pub async fn watch_folder_status(&self, roots: &[String]) -> Vec<WatchFolderStatus> {
        roots
            .iter()
            .map(|path| WatchFolderStatus {
                mounted: std::path::Path::new(path).is_dir(),
                path: path.clone(),
            })
            .collect()
    }

    async fn resolve_face(
        &self,
        face_id: Option<i64>,
        scene_id: Option<i64>,
        face_index: Option<i64>,
    ) -> Result<Face> {
        if let Some(id) = face_id {
            return self.store.faces().get(id).await;
        }
        let (Some(scene_id), Some(face_index)) = (scene_id, face_index) else {
            return Err(FennecError::BadRequest(
                "face filter needs face_id or (scene_id, face_index)".into(),
            ));
        };
        let faces = self.store.faces().list_for_scene(scene_id).await?;
        faces.into_iter().nth(face_index as usize).ok_or_else(|| {
            FennecError::NotFound(format!("face {face_index} in scene {scene_id}"))
        })
    }

    /// Attach faces and scores to browse rows.
    async fn hydrate(
        &self,
        rows: Vec<SceneWithFile>,
        scores: &HashMap<i64, f64>,
    ) -> Result<Vec<SceneHit>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut faces_by_scene: HashMap<i64, Vec<Face>> = HashMap::new();
        for face in self.store.faces().list_for_scenes(&ids).await? {
            faces_by_scene.entry(face.scene_id).or_default().push(face);
        }

        Ok(rows
            .into_iter()
            .map(|row| SceneHit {
                similarity: scores.get(&row.id).copied(),
                faces: faces_by_scene.remove(&row.id).unwrap_or_default(),
                scene_id: row.id,
                file_id: row.file_id,
                path: row.path,
                filename: row.filename,
                scene_index: row.scene_index,
                start_secs: row.start_secs,
                end_secs: row.end_secs,
                fps: row.fps,
                poster_path: row.poster_path,
                transcript: row.transcript,
            })
            .collect())
    }
}

/// Intersection on scene id, preserving the order of the accumulated
/// side so the first clause's ordering survives.
fn intersect(current: Vec<i64>, admitted: Vec<i64>) -> Vec<i64> {
    let admit: std::collections::HashSet<i64> = admitted.into_iter().collect();
    current.into_iter().filter(|id| admit.contains(id)).collect()
}

fn validate_threshold(value: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&value) {
        return Err(FennecError::BadRequest(format!(
            "threshold {value} outside [0, 1]"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_clamp_to_unit_interval() {
        assert!(validate_threshold(0.0).is_ok());
        assert!(validate_threshold(1.0).is_ok());
        assert!(validate_threshold(-0.1).is_err());
        assert!(validate_threshold(1.1).is_err());
    }

    #[test]
    fn intersection_preserves_accumulated_order() {
        let current = vec![9, 3, 7, 1];
        let admitted = vec![1, 7, 100];
        assert_eq!(intersect(current, admitted), vec![7, 1]);
    }

    #[test]
    fn disjoint_sets_intersect_to_empty() {
        assert_eq!(intersect(vec![1, 2], vec![3, 4]), Vec::<i64>::new());
    }
}
