use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;

use crate::catalog::Song;
use crate::error::DecisionError;

/// The identified song, its probability, and same-genre suggestions.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchResult {
    pub song: Song,
    pub index: usize,
    pub confidence: f32,
    pub recommendations: Vec<Song>,
}

/// Index and value of the largest probability. Ties keep the first index;
/// NaN never wins.
pub fn arg_max(probs: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in probs.iter().enumerate() {
        if p.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if p <= b => {}
            _ => best = Some((i, p)),
        }
    }
    best
}

/// Pick the top song and up to `count` recommendations for it.
pub fn decide<R: Rng + ?Sized>(
    probs: &[f32],
    catalog: &[Song],
    count: usize,
    rng: &mut R,
) -> Result<MatchResult, DecisionError> {
    let (index, confidence) = arg_max(probs).ok_or(DecisionError::EmptyProbabilities)?;
    let song = catalog
        .get(index)
        .ok_or(DecisionError::IndexOutOfCatalog {
            index,
            catalog_len: catalog.len(),
        })?
        .clone();

    let recommendations = recommend(catalog, &song, count, rng);

    Ok(MatchResult {
        song,
        index,
        confidence,
        recommendations,
    })
}

/// Uniform sample without replacement from the other songs of the same genre.
pub fn recommend<R: Rng + ?Sized>(catalog: &[Song], matched: &Song, count: usize, rng: &mut R) -> Vec<Song> {
    let pool: Vec<&Song> = catalog
        .iter()
        .filter(|s| s.genre == matched.genre && s.title != matched.title)
        .collect();
    pool.choose_multiple(rng, count).map(|&s| s.clone()).collect()
}
