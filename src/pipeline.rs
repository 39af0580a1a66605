use rand::Rng;
use serde::Serialize;

use crate::audio::analysis::transform;
use crate::audio::features::AudioSample;
use crate::catalog::Song;
use crate::error::PipelineError;
use crate::matching::{decide, MatchResult};
use crate::model::{ModelConfig, Scorer};

/// What the pipeline concluded about one sample.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Identification {
    Matched(MatchResult),
    /// Best guess fell below the configured minimum confidence.
    LowConfidence { best: Song, confidence: f32 },
}

/// Transform, score and decide, with everything loaded once up front.
pub struct Identifier<S: Scorer> {
    config: ModelConfig,
    scorer: S,
    catalog: Vec<Song>,
    recommendations: usize,
    min_confidence: f32,
}

impl<S: Scorer> Identifier<S> {
    pub fn new(config: ModelConfig, scorer: S, catalog: Vec<Song>) -> Self {
        Self {
            config,
            scorer,
            catalog,
            recommendations: 5,
            min_confidence: 0.0,
        }
    }

    pub fn with_recommendations(mut self, count: usize) -> Self {
        self.recommendations = count;
        self
    }

    /// Matches below this probability are reported as low confidence.
    /// `0.0` reports every match.
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn identify<R: Rng + ?Sized>(
        &self,
        sample: &AudioSample,
        rng: &mut R,
    ) -> Result<Identification, PipelineError> {
        let tensor = transform(sample, &self.config)?;
        let probs = self.scorer.score(&tensor)?;
        let result = decide(&probs, &self.catalog, self.recommendations, rng)?;

        log::info!(
            "Best match: {} - {} ({:.1}%)",
            result.song.title,
            result.song.artist,
            result.confidence * 100.0
        );

        if result.confidence < self.min_confidence {
            log::info!(
                "Confidence below minimum of {:.1}%, not reporting a match",
                self.min_confidence * 100.0
            );
            return Ok(Identification::LowConfidence {
                best: result.song,
                confidence: result.confidence,
            });
        }
        Ok(Identification::Matched(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::SpectrogramTensor;
    use crate::error::ScorerError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::Cell;

    struct FixedScorer {
        probs: Vec<f32>,
        calls: Cell<usize>,
        expected: [usize; 4],
    }

    impl Scorer for FixedScorer {
        fn num_classes(&self) -> usize {
            self.probs.len()
        }

        fn score(&self, tensor: &SpectrogramTensor) -> Result<Vec<f32>, ScorerError> {
            self.calls.set(self.calls.get() + 1);
            if tensor.shape() != self.expected {
                return Err(ScorerError::ShapeMismatch { expected: self.expected, actual: tensor.shape() });
            }
            Ok(self.probs.clone())
        }
    }

    fn config() -> ModelConfig {
        ModelConfig {
            sample_rate: 4000,
            n_fft: 128,
            hop_length: 64,
            n_mels: 16,
            duration: 0.25,
        }
    }

    fn song(title: &str, genre: &str) -> Song {
        Song {
            title: title.into(),
            artist: "X".into(),
            genre: genre.into(),
            duration: String::new(),
            chord: String::new(),
        }
    }

    fn identifier(probs: Vec<f32>) -> Identifier<FixedScorer> {
        let cfg = config();
        let scorer = FixedScorer { probs, calls: Cell::new(0), expected: cfg.input_shape() };
        Identifier::new(cfg, scorer, vec![song("One", "pop"), song("Two", "pop"), song("Three", "rock")])
    }

    fn tone() -> AudioSample {
        AudioSample::new((0..2000).map(|i| (i as f32 * 0.3).sin()).collect(), 8000)
    }

    #[test]
    fn matched_song_comes_with_genre_recommendations() {
        let id = identifier(vec![0.2, 0.7, 0.1]).with_recommendations(3);
        let mut rng = StdRng::seed_from_u64(9);
        match id.identify(&tone(), &mut rng).unwrap() {
            Identification::Matched(result) => {
                assert_eq!(result.song.title, "Two");
                assert_eq!(result.recommendations, vec![song("One", "pop")]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(id.scorer.calls.get(), 1);
    }

    #[test]
    fn low_confidence_is_reported_separately() {
        let id = identifier(vec![0.4, 0.3, 0.3]).with_min_confidence(0.5);
        let mut rng = StdRng::seed_from_u64(9);
        let outcome = id.identify(&tone(), &mut rng).unwrap();
        assert_eq!(
            outcome,
            Identification::LowConfidence { best: song("One", "pop"), confidence: 0.4 }
        );
    }

    #[test]
    fn scorer_failure_aborts_pipeline() {
        let mut id = identifier(vec![1.0, 0.0, 0.0]);
        id.scorer.expected = [1, 1, 1, 1];
        let mut rng = StdRng::seed_from_u64(9);
        let err = id.identify(&tone(), &mut rng).unwrap_err();
        assert!(matches!(err, PipelineError::Scorer(ScorerError::ShapeMismatch { .. })));
    }
}
