use crate::settings::EnrichmentModels;

/// One step of the fixed enrichment sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Metadata,
    SceneDetection,
    PosterExtraction,
    VisualEmbedding,
    Transcription,
    TranscriptEmbedding,
    FaceDetection,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Metadata => "metadata",
            Stage::SceneDetection => "scene_detection",
            Stage::PosterExtraction => "poster_extraction",
            Stage::VisualEmbedding => "visual_embedding",
            Stage::Transcription => "transcription",
            Stage::TranscriptEmbedding => "transcript_embedding",
            Stage::FaceDetection => "face_detection",
        }
    }
}

/// The stage plan for one job, derived from the model-enable flags.
/// Order is fixed; disabled models drop their stages.
pub fn enabled_stages(models: &EnrichmentModels) -> Vec<Stage> {
    let mut stages = vec![
        Stage::Metadata,
        Stage::SceneDetection,
        Stage::PosterExtraction,
    ];
    if models.clip {
        stages.push(Stage::VisualEmbedding);
    }
    if models.whisper {
        stages.push(Stage::Transcription);
        stages.push(Stage::TranscriptEmbedding);
    }
    if models.arcface {
        stages.push(Stage::FaceDetection);
    }
    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_models_enabled_runs_seven_stages() {
        let stages = enabled_stages(&EnrichmentModels::default());
        assert_eq!(stages.len(), 7);
        assert_eq!(stages[0], Stage::Metadata);
        assert_eq!(stages[6], Stage::FaceDetection);
    }

    #[test]
    fn clip_only_drops_speech_and_faces() {
        let models = EnrichmentModels {
            clip: true,
            whisper: false,
            arcface: false,
        };
        let stages = enabled_stages(&models);
        assert_eq!(
            stages,
            vec![
                Stage::Metadata,
                Stage::SceneDetection,
                Stage::PosterExtraction,
                Stage::VisualEmbedding,
            ]
        );
    }

    #[test]
    fn transcript_embedding_follows_transcription() {
        let models = EnrichmentModels {
            clip: false,
            whisper: true,
            arcface: false,
        };
        let stages = enabled_stages(&models);
        let t = stages
            .iter()
            .position(|s| *s == Stage::Transcription)
            .unwrap();
        let te = stages
            .iter()
            .position(|s| *s == Stage::TranscriptEmbedding)
            .unwrap();
        assert!(te > t);
    }

    #[test]
    fn stage_names_are_snake_case() {
        for stage in enabled_stages(&EnrichmentModels::default()) {
            let name = stage.name();
            assert!(name.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
