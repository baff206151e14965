use palette::Srgb;

use crate::classify::ColorBuckets;
use crate::settings::TextureSettings;
use crate::srgb_distance_sq;

/// Bucket averages ordered by the number of pixels behind them, most
/// prevalent first. Equal counts keep bucket-key order.
pub fn ranked_candidates(buckets: &ColorBuckets) -> Vec<Srgb<u8>> {
    let mut ranked: Vec<(u64, Srgb<u8>)> = buckets
        .iter()
        .map(|(_, bucket)| (bucket.count, bucket.average()))
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked.into_iter().map(|(_, color)| color).collect()
}

/// Reduce accumulated buckets to at most `max_colors` representative colors.
///
/// Candidates are admitted greedily in prevalence order when they sit at
/// least `min_color_distance` away from every admitted color. If that leaves
/// free slots, the remaining candidates fill them in ranking order, skipping
/// exact duplicates, even when they are closer than the distance threshold.
pub fn select_palette(buckets: &ColorBuckets, settings: &TextureSettings) -> Vec<Srgb<u8>> {
    let candidates = ranked_candidates(buckets);
    let max_colors = settings.max_colors();
    let min_dist_sq = settings.min_color_distance * settings.min_color_distance;

    let mut palette: Vec<Srgb<u8>> = Vec::with_capacity(max_colors);
    let mut admitted = vec![false; candidates.len()];

    for (i, candidate) in candidates.iter().enumerate() {
        if palette.len() == max_colors {
            break;
        }
        let distinct = palette
            .iter()
            .all(|p| srgb_distance_sq(*p, *candidate) as f32 >= min_dist_sq);
        if distinct {
            palette.push(*candidate);
            admitted[i] = true;
        }
    }

    let distinct_count = palette.len();
    if distinct_count < max_colors {
        for (candidate, _) in candidates
            .iter()
            .zip(&admitted)
            .filter(|(_, admitted)| !**admitted)
        {
            if palette.len() == max_colors {
                break;
            }
            if !palette.contains(candidate) {
                palette.push(*candidate);
            }
        }
    }

    log::debug!(
        "palette: {} candidates, {} distinct, {} after fill",
        candidates.len(),
        distinct_count,
        palette.len()
    );

    palette
}
