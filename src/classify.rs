//! Background classification and color-bucket accumulation.
//!
//! A single scan over the buffer decides, per pixel, background versus
//! foreground against one reference sample taken from pixel (0, 0). Background
//! pixels get their alpha cleared in place; foreground pixels feed the color
//! buckets and the bounding box.
//!
//! With the `parallel` feature the scan is partitioned by rows and the
//! per-row accumulators are merged afterwards (bucket sums add, bounds take
//! min/max), which gives the same result as the sequential scan.

use std::collections::BTreeMap;

use image::{Rgba, RgbaImage};
use palette::Srgb;
use serde::Serialize;

use crate::rgb_distance_sq;
use crate::settings::TextureSettings;

// ------------------------------------------------------------
// Background classifier
// ------------------------------------------------------------

/// Rule chosen from the reference pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BackgroundRule {
    /// The reference is fully transparent: low alpha means background.
    Alpha { cutoff: u8 },
    /// The reference is opaque (or partially so): RGB closeness means background.
    Color { reference: [u8; 3], tolerance: f32 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackgroundClassifier {
    rule: BackgroundRule,
}

impl BackgroundClassifier {
    pub fn new(reference: Rgba<u8>, settings: &TextureSettings) -> Self {
        let rule = if reference[3] == 0 {
            BackgroundRule::Alpha { cutoff: settings.bg_alpha_cutoff }
        } else {
            BackgroundRule::Color {
                reference: [reference[0], reference[1], reference[2]],
                tolerance: settings.bg_color_tolerance,
            }
        };
        Self { rule }
    }

    pub fn rule(&self) -> BackgroundRule {
        self.rule
    }

    #[inline(always)]
    pub fn is_background(&self, pixel: [u8; 4]) -> bool {
        match self.rule {
            BackgroundRule::Alpha { cutoff } => pixel[3] < cutoff,
            BackgroundRule::Color { reference, tolerance } => {
                let d2 = rgb_distance_sq([pixel[0], pixel[1], pixel[2]], reference);
                (d2 as f32) < tolerance * tolerance
            }
        }
    }
}

// ------------------------------------------------------------
// Bounding box
// ------------------------------------------------------------

/// Inclusive bounds of all foreground pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    pub fn at(x: u32, y: u32) -> Self {
        Self { min_x: x, min_y: y, max_x: x, max_y: y }
    }

    pub fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

// ------------------------------------------------------------
// Color buckets
// ------------------------------------------------------------

/// Quantized (r, g, b). Channels round to the nearest multiple of the step
/// and may exceed 255 (e.g. 255 rounds up to 264 with a step of 24).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey(pub u16, pub u16, pub u16);

impl BucketKey {
    pub fn quantize(rgb: [u8; 3], step: u16) -> Self {
        let q = |c: u8| (u16::from(c) + step / 2) / step * step;
        Self(q(rgb[0]), q(rgb[1]), q(rgb[2]))
    }
}

/// Running channel sums of the raw colors that fell into one bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorBucket {
    pub sum_r: u64,
    pub sum_g: u64,
    pub sum_b: u64,
    pub count: u64,
}

impl ColorBucket {
    fn add(&mut self, rgb: [u8; 3]) {
        self.sum_r += u64::from(rgb[0]);
        self.sum_g += u64::from(rgb[1]);
        self.sum_b += u64::from(rgb[2]);
        self.count += 1;
    }

    fn merge(&mut self, other: &Self) {
        self.sum_r += other.sum_r;
        self.sum_g += other.sum_g;
        self.sum_b += other.sum_b;
        self.count += other.count;
    }

    /// Mean color of the bucket, rounded to the nearest integer per channel.
    pub fn average(&self) -> Srgb<u8> {
        let count = self.count.max(1);
        let avg = |sum: u64| ((sum + count / 2) / count).min(255) as u8;
        Srgb::new(avg(self.sum_r), avg(self.sum_g), avg(self.sum_b))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColorBuckets {
    buckets: BTreeMap<BucketKey, ColorBucket>,
}

impl ColorBuckets {
    pub fn add(&mut self, rgb: [u8; 3], step: u16) {
        self.buckets
            .entry(BucketKey::quantize(rgb, step))
            .or_default()
            .add(rgb);
    }

    pub fn merge(&mut self, other: Self) {
        for (key, bucket) in other.buckets {
            self.buckets.entry(key).or_default().merge(&bucket);
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn get(&self, key: &BucketKey) -> Option<&ColorBucket> {
        self.buckets.get(key)
    }

    /// Buckets in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&BucketKey, &ColorBucket)> {
        self.buckets.iter()
    }
}

// ------------------------------------------------------------
// Accumulation pass
// ------------------------------------------------------------

#[derive(Clone, Debug, Default)]
struct Accumulator {
    bounds: Option<BoundingBox>,
    buckets: ColorBuckets,
    foreground: usize,
}

impl Accumulator {
    fn include(&mut self, x: u32, y: u32, rgb: [u8; 3], step: u16) {
        match &mut self.bounds {
            Some(bounds) => bounds.include(x, y),
            None => self.bounds = Some(BoundingBox::at(x, y)),
        }
        self.buckets.add(rgb, step);
        self.foreground += 1;
    }

    #[cfg_attr(not(feature = "parallel"), allow(dead_code))]
    fn merge(mut self, other: Self) -> Self {
        self.bounds = match (self.bounds, other.bounds) {
            (Some(a), Some(b)) => Some(a.union(b)),
            (a, b) => a.or(b),
        };
        self.buckets.merge(other.buckets);
        self.foreground += other.foreground;
        self
    }
}

/// Everything the later stages need from the classification pass.
#[derive(Clone, Debug)]
pub struct Classification {
    /// Sample at (0, 0), read before any mutation.
    pub reference: Rgba<u8>,
    pub rule: Option<BackgroundRule>,
    /// One entry per pixel, row-major; `true` means foreground.
    pub mask: Vec<bool>,
    /// `None` when no foreground pixel was found.
    pub bounds: Option<BoundingBox>,
    pub buckets: ColorBuckets,
    pub foreground: usize,
}

impl Classification {
    pub fn has_content(&self) -> bool {
        self.bounds.is_some()
    }
}

fn scan_row(
    classifier: &BackgroundClassifier,
    step: u16,
    y: u32,
    row: &mut [u8],
    row_mask: &mut [bool],
    acc: &mut Accumulator,
) {
    for (x, (px, is_fg)) in row.chunks_exact_mut(4).zip(row_mask.iter_mut()).enumerate() {
        if classifier.is_background([px[0], px[1], px[2], px[3]]) {
            px[3] = 0;
            *is_fg = false;
        } else {
            *is_fg = true;
            acc.include(x as u32, y, [px[0], px[1], px[2]], step);
        }
    }
}

/// Classify every pixel against the (0, 0) reference, clearing background
/// alpha in place and accumulating buckets and bounds for the foreground.
pub fn classify(img: &mut RgbaImage, settings: &TextureSettings) -> Classification {
    let (width, height) = img.dimensions();
    let pixel_count = width as usize * height as usize;

    if pixel_count == 0 {
        return Classification {
            reference: Rgba([0, 0, 0, 0]),
            rule: None,
            mask: Vec::new(),
            bounds: None,
            buckets: ColorBuckets::default(),
            foreground: 0,
        };
    }

    let reference = *img.get_pixel(0, 0);
    let classifier = BackgroundClassifier::new(reference, settings);
    let step = settings.bucket_step();
    let row_len = width as usize * 4;
    let mut mask = vec![false; pixel_count];

    #[cfg(not(feature = "parallel"))]
    let acc = {
        let mut acc = Accumulator::default();
        for (y, (row, row_mask)) in img
            .chunks_exact_mut(row_len)
            .zip(mask.chunks_exact_mut(width as usize))
            .enumerate()
        {
            scan_row(&classifier, step, y as u32, row, row_mask, &mut acc);
        }
        acc
    };

    #[cfg(feature = "parallel")]
    let acc = {
        use rayon::prelude::*;

        img.par_chunks_exact_mut(row_len)
            .zip(mask.par_chunks_exact_mut(width as usize))
            .enumerate()
            .fold(Accumulator::default, |mut acc, (y, (row, row_mask))| {
                scan_row(&classifier, step, y as u32, row, row_mask, &mut acc);
                acc
            })
            .reduce(Accumulator::default, Accumulator::merge)
    };

    log::debug!(
        "classified {}x{} image: rule={:?}, foreground={}, buckets={}, bounds={:?}",
        width,
        height,
        classifier.rule(),
        acc.foreground,
        acc.buckets.len(),
        acc.bounds
    );

    Classification {
        reference,
        rule: Some(classifier.rule()),
        mask,
        bounds: acc.bounds,
        buckets: acc.buckets,
        foreground: acc.foreground,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opaque(r: u8, g: u8, b: u8) -> Rgba<u8> {
        Rgba([r, g, b, 255])
    }

    #[test]
    fn test_color_rule_threshold_is_strict() {
        let settings = TextureSettings::default();
        let classifier = BackgroundClassifier::new(opaque(0, 0, 0), &settings);
        // distance 39 and 40 along one axis
        assert!(classifier.is_background([39, 0, 0, 255]));
        assert!(!classifier.is_background([40, 0, 0, 255]));
    }

    #[test]
    fn test_color_rule_ignores_alpha() {
        let settings = TextureSettings::default();
        let classifier = BackgroundClassifier::new(opaque(255, 255, 255), &settings);
        assert!(classifier.is_background([250, 250, 250, 0]));
        assert!(!classifier.is_background([0, 0, 0, 0]));
    }

    #[test]
    fn test_alpha_rule_when_reference_transparent() {
        let settings = TextureSettings::default();
        let classifier = BackgroundClassifier::new(Rgba([10, 20, 30, 0]), &settings);
        assert_eq!(classifier.rule(), BackgroundRule::Alpha { cutoff: 20 });
        assert!(classifier.is_background([200, 0, 0, 19]));
        assert!(!classifier.is_background([10, 20, 30, 20]));
    }

    #[test]
    fn test_partial_reference_alpha_uses_color_rule() {
        let settings = TextureSettings::default();
        let classifier = BackgroundClassifier::new(Rgba([0, 0, 0, 1]), &settings);
        assert!(matches!(classifier.rule(), BackgroundRule::Color { .. }));
    }

    #[test]
    fn test_bucket_key_rounds_to_nearest_step() {
        assert_eq!(BucketKey::quantize([0, 11, 12], 24), BucketKey(0, 0, 24));
        assert_eq!(BucketKey::quantize([35, 36, 255], 24), BucketKey(24, 48, 264));
    }

    #[test]
    fn test_bucket_average_rounds() {
        let mut buckets = ColorBuckets::default();
        buckets.add([10, 0, 0], 24);
        buckets.add([11, 0, 0], 24);
        let bucket = buckets.get(&BucketKey(0, 0, 0)).unwrap();
        assert_eq!(bucket.count, 2);
        assert_eq!(bucket.average(), Srgb::new(11, 0, 0));
    }

    #[test]
    fn test_bounding_box_union() {
        let a = BoundingBox { min_x: 2, min_y: 5, max_x: 4, max_y: 6 };
        let b = BoundingBox { min_x: 3, min_y: 1, max_x: 9, max_y: 2 };
        let u = a.union(b);
        assert_eq!(u, BoundingBox { min_x: 2, min_y: 1, max_x: 9, max_y: 6 });
        assert_eq!(u.width(), 8);
        assert_eq!(u.height(), 6);
    }

    #[test]
    fn test_classify_clears_background_alpha() {
        let mut img = RgbaImage::from_pixel(6, 5, opaque(255, 255, 255));
        img.put_pixel(2, 1, opaque(200, 0, 0));
        img.put_pixel(4, 3, opaque(0, 0, 200));

        let result = classify(&mut img, &TextureSettings::default());

        assert_eq!(result.reference, opaque(255, 255, 255));
        assert_eq!(result.foreground, 2);
        assert_eq!(result.bounds, Some(BoundingBox { min_x: 2, min_y: 1, max_x: 4, max_y: 3 }));
        assert_eq!(result.buckets.len(), 2);
        assert!(result.mask[1 * 6 + 2]);
        assert!(result.mask[3 * 6 + 4]);
        assert_eq!(result.mask.iter().filter(|m| **m).count(), 2);
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(img.get_pixel(2, 1), &opaque(200, 0, 0));
    }

    #[test]
    fn test_classify_uniform_image_has_no_content() {
        let mut img = RgbaImage::from_pixel(4, 4, opaque(30, 60, 90));
        let result = classify(&mut img, &TextureSettings::default());
        assert!(!result.has_content());
        assert!(result.buckets.is_empty());
    }

    #[test]
    fn test_classify_empty_image() {
        let mut img = RgbaImage::new(0, 0);
        let result = classify(&mut img, &TextureSettings::default());
        assert!(!result.has_content());
        assert!(result.rule.is_none());
    }

    #[test]
    fn test_accumulator_merge_matches_single_pass() {
        let mut whole = Accumulator::default();
        let mut top = Accumulator::default();
        let mut bottom = Accumulator::default();
        let pixels = [(1, 0, [10, 20, 30]), (5, 0, [200, 10, 10]), (3, 4, [12, 22, 28])];
        for (x, y, rgb) in pixels {
            whole.include(x, y, rgb, 24);
            if y < 2 {
                top.include(x, y, rgb, 24);
            } else {
                bottom.include(x, y, rgb, 24);
            }
        }
        let merged = top.merge(bottom);
        assert_eq!(merged.bounds, whole.bounds);
        assert_eq!(merged.buckets, whole.buckets);
        assert_eq!(merged.foreground, 3);
    }

    #[test]
    fn test_classify_multi_row_buckets_and_mask() {
        let mut img = RgbaImage::from_pixel(5, 4, opaque(0, 0, 0));
        img.put_pixel(1, 0, opaque(200, 0, 0));
        img.put_pixel(4, 2, opaque(196, 0, 0));
        img.put_pixel(2, 3, opaque(0, 0, 250));

        let result = classify(&mut img, &TextureSettings::default());

        let fg: Vec<usize> = (0..result.mask.len()).filter(|i| result.mask[*i]).collect();
        assert_eq!(fg, vec![1, 14, 17]);
        assert_eq!(result.bounds, Some(BoundingBox { min_x: 1, min_y: 0, max_x: 4, max_y: 3 }));
        assert_eq!(
            result.buckets.get(&BucketKey(192, 0, 0)),
            Some(&ColorBucket { sum_r: 396, sum_g: 0, sum_b: 0, count: 2 })
        );
        assert_eq!(
            result.buckets.get(&BucketKey(0, 0, 240)),
            Some(&ColorBucket { sum_r: 0, sum_g: 0, sum_b: 250, count: 1 })
        );
        assert_eq!(result.buckets.len(), 2);
        assert_eq!(result.foreground, 3);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_classify_matches_row_by_row_scan() {
        let (width, height) = (64u32, 48u32);
        let mut img = RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 5 == 0 {
                opaque(10, 10, 10)
            } else {
                opaque((x * 37 % 256) as u8, (y * 53 % 256) as u8, ((x + y) * 11 % 256) as u8)
            }
        });
        let settings = TextureSettings::default();

        let mut expected_img = img.clone();
        let classifier = BackgroundClassifier::new(*img.get_pixel(0, 0), &settings);
        let mut expected_mask = vec![false; (width * height) as usize];
        let mut expected = Accumulator::default();
        for (y, (row, row_mask)) in expected_img
            .chunks_exact_mut(width as usize * 4)
            .zip(expected_mask.chunks_exact_mut(width as usize))
            .enumerate()
        {
            scan_row(&classifier, settings.bucket_step(), y as u32, row, row_mask, &mut expected);
        }

        let result = classify(&mut img, &settings);

        assert_eq!(result.mask, expected_mask);
        assert_eq!(result.bounds, expected.bounds);
        assert_eq!(result.buckets, expected.buckets);
        assert_eq!(result.foreground, expected.foreground);
        assert_eq!(img, expected_img);
    }
}
