//! 16-bar phrase arithmetic
//!
//! Everything here is a pure function of its arguments. Timing is derived in
//! three steps: window length (from the embedding model's patch size or the
//! audio duration), hop length (windows overlap by half), then the number of
//! overlapping windows that span one 16-bar phrase at the estimated tempo.

use crate::error::PhraseError;
use crate::model::LabelScores;
use ndarray::{Array2, Axis};

pub const BARS_PER_PHRASE: f64 = 16.0;
pub const BEATS_PER_BAR: f64 = 4.0;

/// Front-end patches per second of audio
pub const PATCHES_PER_SECOND: f64 = 64.0;

/// Fraction of a window shared with the next one
pub const SEGMENT_OVERLAP: f64 = 0.5;

/// Seconds in one 16-bar phrase of 4/4 at `bpm`
pub fn phrase_duration(bpm: f64) -> Result<f64, PhraseError> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(PhraseError::InvalidBpm(bpm));
    }
    Ok(BARS_PER_PHRASE * BEATS_PER_BAR * 60.0 / bpm)
}

/// Window length from an embedding input shape.
///
/// 2-D `[time, bands]` uses dim 0, 3-D `[batch, time, bands]` uses dim 1.
/// Rounds `patch / 64` half-to-even; None if the result is not positive.
pub fn segment_duration_from_shape(shape: &[i64]) -> Option<f64> {
    let patch_size = match shape {
        [time, _] => *time,
        [_, time, _] => *time,
        _ => return None,
    };
    if patch_size <= 0 {
        return None;
    }
    let seconds = (patch_size as f64 / PATCHES_PER_SECOND).round_ties_even();
    (seconds > 0.0).then_some(seconds)
}

/// Window length assuming contiguous windows covering the whole audio
pub fn fallback_segment_duration(audio_duration: f64, segment_count: usize) -> Option<f64> {
    if segment_count == 0 {
        return None;
    }
    let seconds = audio_duration / segment_count as f64;
    (seconds.is_finite() && seconds > 0.0).then_some(seconds)
}

/// Distance between window starts; the window itself if overlap leaves nothing
pub fn hop_duration(segment_duration: f64) -> f64 {
    let hop = segment_duration * (1.0 - SEGMENT_OVERLAP);
    if hop <= 0.0 {
        segment_duration
    } else {
        hop
    }
}

/// Overlapping windows needed to span one phrase, never below 1
pub fn segments_per_phrase(phrase_duration: f64, segment_duration: f64, hop_duration: f64) -> f64 {
    if phrase_duration <= segment_duration {
        return 1.0;
    }
    // (n - 1) * hop + segment = phrase
    (phrase_duration - segment_duration) / hop_duration + 1.0
}

/// Discrete chunk length, `max(1, round(segments_per_phrase))`
pub fn chunk_size(segments_per_phrase: f64) -> usize {
    let rounded = segments_per_phrase.round_ties_even();
    if rounded.is_finite() && rounded >= 1.0 {
        rounded as usize
    } else {
        1
    }
}

/// Window timing for one model on one audio item
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhraseTiming {
    pub segment_duration_seconds: f64,
    pub hop_duration_seconds: f64,
    pub phrase_duration_seconds: f64,
    pub segments_per_phrase: f64,
}

impl PhraseTiming {
    pub fn new(segment_duration: f64, phrase_duration: f64) -> Self {
        let hop = hop_duration(segment_duration);
        Self {
            segment_duration_seconds: segment_duration,
            hop_duration_seconds: hop,
            phrase_duration_seconds: phrase_duration,
            segments_per_phrase: segments_per_phrase(phrase_duration, segment_duration, hop),
        }
    }

    pub fn chunk_size(&self) -> usize {
        chunk_size(self.segments_per_phrase)
    }
}

/// Phrase-level re-aggregation of one model's predictions
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseAggregationResult {
    pub segment_duration_seconds: f64,
    pub hop_duration_seconds: f64,
    pub segments_per_phrase: f64,
    /// Per-class mean of each chunk, in segment order
    pub bar_predictions: Vec<Vec<f32>>,
    /// Per-class mean of the bar rows (every chunk weighs the same)
    pub aggregated_bar_predictions: LabelScores,
}

/// Group `predictions` into phrase chunks and average them.
///
/// Chunks are contiguous and non-overlapping; the last one may be short.
/// Zero segments yield no bar rows and an empty aggregate.
pub fn aggregate_phrases(
    model: &str,
    predictions: &[Vec<f32>],
    classes: &[String],
    timing: &PhraseTiming,
) -> Result<PhraseAggregationResult, PhraseError> {
    let width = classes.len();
    let matrix = to_matrix(model, predictions, width)?;

    let chunk = timing.chunk_size();
    let mut bars = Array2::<f64>::zeros((0, width));
    for rows in matrix.axis_chunks_iter(Axis(0), chunk) {
        if let Some(mean) = rows.mean_axis(Axis(0)) {
            // widths already checked, push_row cannot fail on shape
            bars.push_row(mean.view()).map_err(|_| PhraseError::RaggedPredictions {
                model: model.to_string(),
                row: bars.nrows(),
                expected: width,
                actual: mean.len(),
            })?;
        }
    }

    let aggregated_bar_predictions = match bars.mean_axis(Axis(0)) {
        Some(mean) => LabelScores::from_row(classes, &to_f32(mean.iter())),
        None => LabelScores::new(),
    };

    Ok(PhraseAggregationResult {
        segment_duration_seconds: timing.segment_duration_seconds,
        hop_duration_seconds: timing.hop_duration_seconds,
        segments_per_phrase: timing.segments_per_phrase,
        bar_predictions: bars.outer_iter().map(|row| to_f32(row.iter())).collect(),
        aggregated_bar_predictions,
    })
}

fn to_matrix(model: &str, predictions: &[Vec<f32>], width: usize) -> Result<Array2<f64>, PhraseError> {
    let mut flat = Vec::with_capacity(predictions.len() * width);
    for (row, values) in predictions.iter().enumerate() {
        if values.len() != width {
            return Err(PhraseError::RaggedPredictions {
                model: model.to_string(),
                row,
                expected: width,
                actual: values.len(),
            });
        }
        flat.extend(values.iter().map(|&v| v as f64));
    }
    Array2::from_shape_vec((predictions.len(), width), flat).map_err(|_| {
        PhraseError::RaggedPredictions {
            model: model.to_string(),
            row: 0,
            expected: width,
            actual: 0,
        }
    })
}

fn to_f32<'a>(values: impl Iterator<Item = &'a f64>) -> Vec<f32> {
    values.map(|&v| v as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("c{}", i)).collect()
    }

    #[test]
    fn test_phrase_duration_at_120_bpm() {
        assert_eq!(phrase_duration(120.0).unwrap(), 32.0);
    }

    #[test]
    fn test_phrase_duration_rejects_bad_bpm() {
        assert!(matches!(phrase_duration(0.0), Err(PhraseError::InvalidBpm(_))));
        assert!(matches!(phrase_duration(-5.0), Err(PhraseError::InvalidBpm(_))));
        assert!(matches!(phrase_duration(f64::NAN), Err(PhraseError::InvalidBpm(_))));
    }

    #[test]
    fn test_segment_duration_from_3d_shape() {
        assert_eq!(segment_duration_from_shape(&[64, 128, 96]), Some(2.0));
    }

    #[test]
    fn test_segment_duration_from_2d_shape() {
        // 187 / 64 = 2.92
        assert_eq!(segment_duration_from_shape(&[187, 96]), Some(3.0));
    }

    #[test]
    fn test_segment_duration_rounds_half_to_even() {
        // 160 / 64 = 2.5
        assert_eq!(segment_duration_from_shape(&[160, 96]), Some(2.0));
        // 224 / 64 = 3.5
        assert_eq!(segment_duration_from_shape(&[224, 96]), Some(4.0));
    }

    #[test]
    fn test_segment_duration_unusable_shapes() {
        assert_eq!(segment_duration_from_shape(&[96]), None);
        assert_eq!(segment_duration_from_shape(&[-1, 96]), None);
        // 16 / 64 rounds to zero
        assert_eq!(segment_duration_from_shape(&[16, 96]), None);
    }

    #[test]
    fn test_fallback_segment_duration() {
        assert_eq!(fallback_segment_duration(60.0, 30), Some(2.0));
        assert_eq!(fallback_segment_duration(60.0, 0), None);
        assert_eq!(fallback_segment_duration(0.0, 10), None);
    }

    #[test]
    fn test_hop_duration() {
        assert_eq!(hop_duration(1.0), 0.5);
        assert_eq!(hop_duration(0.0), 0.0);
    }

    #[test]
    fn test_segments_per_phrase_with_overlap() {
        let timing = PhraseTiming::new(1.0, 32.0);
        assert_eq!(timing.hop_duration_seconds, 0.5);
        assert_eq!(timing.segments_per_phrase, 63.0);
        assert_eq!(timing.chunk_size(), 63);
    }

    #[test]
    fn test_segments_per_phrase_floor_is_one() {
        let timing = PhraseTiming::new(3.0, 2.5);
        assert_eq!(timing.segments_per_phrase, 1.0);
        assert_eq!(timing.chunk_size(), 1);
    }

    #[test]
    fn test_chunk_size_rounding() {
        assert_eq!(chunk_size(0.2), 1);
        assert_eq!(chunk_size(2.5), 2);
        assert_eq!(chunk_size(3.5), 4);
        assert_eq!(chunk_size(7.6), 8);
    }

    #[test]
    fn test_189_segments_make_three_bars() {
        let classes = labels(2);
        let predictions: Vec<Vec<f32>> = (0..189)
            .map(|i| if i < 63 { vec![1.0, 0.0] } else { vec![0.0, 1.0] })
            .collect();
        let timing = PhraseTiming::new(1.0, phrase_duration(120.0).unwrap());

        let result = aggregate_phrases("m", &predictions, &classes, &timing).unwrap();
        assert_eq!(result.bar_predictions.len(), 3);
        assert_eq!(result.bar_predictions[0], vec![1.0, 0.0]);
        assert_eq!(result.bar_predictions[1], vec![0.0, 1.0]);
    }

    #[test]
    fn test_mean_of_means_weighs_short_chunk_equally() {
        let classes = labels(1);
        // chunk of 4: [1,1,1,1] then a short chunk [0]
        let predictions = vec![vec![1.0], vec![1.0], vec![1.0], vec![1.0], vec![0.0]];
        let timing = PhraseTiming {
            segment_duration_seconds: 1.0,
            hop_duration_seconds: 1.0,
            phrase_duration_seconds: 4.0,
            segments_per_phrase: 4.0,
        };

        let result = aggregate_phrases("m", &predictions, &classes, &timing).unwrap();
        assert_eq!(result.bar_predictions, vec![vec![1.0], vec![0.0]]);
        assert_eq!(result.aggregated_bar_predictions.get("c0"), Some(0.5));
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let classes = labels(3);
        let predictions: Vec<Vec<f32>> = (0..50)
            .map(|i| {
                let x = (i as f32 * 0.37).sin().abs();
                vec![x, 1.0 - x, 0.5 * x]
            })
            .collect();
        let timing = PhraseTiming::new(2.0, phrase_duration(128.0).unwrap());

        let first = aggregate_phrases("m", &predictions, &classes, &timing).unwrap();
        let second = aggregate_phrases("m", &predictions, &classes, &timing).unwrap();
        assert_eq!(
            serde_json::to_string(&first.bar_predictions).unwrap(),
            serde_json::to_string(&second.bar_predictions).unwrap()
        );
        assert_eq!(
            serde_json::to_string(&first.aggregated_bar_predictions).unwrap(),
            serde_json::to_string(&second.aggregated_bar_predictions).unwrap()
        );
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let classes = labels(2);
        let predictions = vec![vec![0.5, 0.5], vec![1.0]];
        let timing = PhraseTiming::new(1.0, 32.0);
        let result = aggregate_phrases("m", &predictions, &classes, &timing);
        assert!(matches!(
            result,
            Err(PhraseError::RaggedPredictions { row: 1, actual: 1, .. })
        ));
    }

    #[test]
    fn test_empty_predictions() {
        let timing = PhraseTiming::new(1.0, 32.0);
        let result = aggregate_phrases("m", &[], &labels(2), &timing).unwrap();
        assert!(result.bar_predictions.is_empty());
        assert!(result.aggregated_bar_predictions.is_empty());
    }
}
