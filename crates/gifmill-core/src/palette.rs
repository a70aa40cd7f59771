//! Fixed global color table and nearest-color matching.
//!
//! ## Layout
//! - `0..8`   - black, white, red, green, blue, yellow, magenta, cyan
//! - `8..40`  - 32-step grayscale ramp
//! - `40..256` - 6x6x6 RGB cube in steps of 51 (red outermost, blue innermost)
//!
//! Any slack left after the cube is padded with black. The builder takes no
//! input, so every job shares an identical table.

use std::collections::HashMap;

/// Number of entries in a GIF global color table at 8 bits per pixel.
pub const PALETTE_SIZE: usize = 256;

/// Best (slowest) encoder quality level.
pub const MIN_QUALITY: u8 = 1;

/// Worst (fastest) encoder quality level.
pub const MAX_QUALITY: u8 = 30;

/// Default encoder quality level.
pub const DEFAULT_QUALITY: u8 = 10;

const PRIMARIES: [[u8; 3]; 8] = [
    [0, 0, 0],
    [255, 255, 255],
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 0],
    [255, 0, 255],
    [0, 255, 255],
];

const GRAY_STEPS: usize = 32;
const CUBE_LEVELS: [u8; 6] = [0, 51, 102, 153, 204, 255];

/// A 256-entry RGB color table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: [[u8; 3]; PALETTE_SIZE],
}

impl Palette {
    /// All entries in index order.
    pub fn entries(&self) -> &[[u8; 3]; PALETTE_SIZE] {
        &self.entries
    }

    /// The color at `index`.
    pub fn get(&self, index: u8) -> [u8; 3] {
        self.entries[index as usize]
    }

    pub fn len(&self) -> usize {
        PALETTE_SIZE
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Flattened `r, g, b, r, g, b, ...` bytes as stored in the GIF global
    /// color table (768 bytes).
    pub fn as_bytes(&self) -> Vec<u8> {
        self.entries.iter().flatten().copied().collect()
    }

    /// Index of the entry nearest to `rgb` (squared Euclidean distance, ties
    /// resolved to the lowest index).
    pub fn nearest(&self, rgb: [u8; 3]) -> u8 {
        let mut best_index = 0usize;
        let mut best_distance = u32::MAX;

        for (i, entry) in self.entries.iter().enumerate() {
            let distance = distance_sq(*entry, rgb);
            if distance < best_distance {
                best_distance = distance;
                best_index = i;
                if distance == 0 {
                    break;
                }
            }
        }

        best_index as u8
    }
}

impl Default for Palette {
    fn default() -> Self {
        PaletteBuilder::build()
    }
}

/// Builds the fixed global color table.
pub struct PaletteBuilder;

impl PaletteBuilder {
    /// Build the palette. Pure and deterministic.
    pub fn build() -> Palette {
        let mut entries = [[0u8; 3]; PALETTE_SIZE];
        let mut next = 0usize;

        for color in PRIMARIES {
            entries[next] = color;
            next += 1;
        }

        for step in 0..GRAY_STEPS {
            let v = ((step * 255) as f32 / (GRAY_STEPS - 1) as f32).round() as u8;
            entries[next] = [v, v, v];
            next += 1;
        }

        'cube: for r in CUBE_LEVELS {
            for g in CUBE_LEVELS {
                for b in CUBE_LEVELS {
                    if next == PALETTE_SIZE {
                        break 'cube;
                    }
                    entries[next] = [r, g, b];
                    next += 1;
                }
            }
        }

        // Remaining slack (if any) is already black from initialization
        Palette { entries }
    }
}

#[inline]
fn distance_sq(a: [u8; 3], b: [u8; 3]) -> u32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    (dr * dr + dg * dg + db * db) as u32
}

/// Maps RGB colors to palette indices, trading fidelity for speed.
///
/// The quality level follows the inverted effort scale of classic GIF
/// encoders: `1` matches every distinct color exactly, larger values drop
/// low bits of each channel before lookup so neighbouring colors share one
/// memoized search.
#[derive(Debug, Clone)]
pub struct PaletteMatcher {
    palette: Palette,
    shift: u8,
    cache: HashMap<u32, u8>,
}

impl PaletteMatcher {
    /// Create a matcher for `palette` at `quality` (clamped to 1-30).
    pub fn new(palette: Palette, quality: u8) -> Self {
        Self {
            palette,
            shift: quality_to_shift(quality),
            cache: HashMap::new(),
        }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Number of low bits ignored per channel.
    pub fn shift(&self) -> u8 {
        self.shift
    }

    /// Palette index for a single color.
    pub fn index_of(&mut self, rgb: [u8; 3]) -> u8 {
        let shift = self.shift;
        let quantized = rgb.map(|c| quantize_channel(c, shift));
        let key = (quantized[0] as u32) << 16 | (quantized[1] as u32) << 8 | quantized[2] as u32;

        let palette = &self.palette;
        *self.cache.entry(key).or_insert_with(|| palette.nearest(quantized))
    }

    /// Map packed RGB pixel data to one palette index per pixel.
    pub fn map_pixels(&mut self, pixels: &[u8]) -> Vec<u8> {
        pixels
            .chunks_exact(3)
            .map(|c| self.index_of([c[0], c[1], c[2]]))
            .collect()
    }
}

fn quality_to_shift(quality: u8) -> u8 {
    let quality = quality.clamp(MIN_QUALITY, MAX_QUALITY);
    ((quality - 1) / 7).min(4)
}

/// Drop `shift` low bits, substituting the bucket midpoint.
#[inline]
fn quantize_channel(c: u8, shift: u8) -> u8 {
    if shift == 0 {
        return c;
    }
    ((c >> shift) << shift) | (1 << (shift - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_palette_has_256_entries() {
        let palette = PaletteBuilder::build();
        assert_eq!(palette.entries().len(), 256);
        assert_eq!(palette.as_bytes().len(), 768);
    }

    #[test]
    fn test_primaries_fixed() {
        let palette = PaletteBuilder::build();
        assert_eq!(&palette.entries()[..8], &PRIMARIES);
        assert_eq!(palette.get(0), [0, 0, 0]);
        assert_eq!(palette.get(1), [255, 255, 255]);
        assert_eq!(palette.get(7), [0, 255, 255]);
    }

    #[test]
    fn test_grayscale_ramp_monotonic() {
        let palette = PaletteBuilder::build();
        let ramp = &palette.entries()[8..40];

        assert_eq!(ramp[0], [0, 0, 0]);
        assert_eq!(ramp[31], [255, 255, 255]);
        for pair in ramp.windows(2) {
            assert!(pair[0][0] <= pair[1][0], "ramp must not decrease");
        }
        for entry in ramp {
            assert!(entry[0] == entry[1] && entry[1] == entry[2]);
        }
    }

    #[test]
    fn test_cube_steps_of_51() {
        let palette = PaletteBuilder::build();
        let cube = &palette.entries()[40..];

        assert_eq!(cube.len(), 216);
        assert_eq!(cube[0], [0, 0, 0]);
        assert_eq!(cube[1], [0, 0, 51]);
        assert_eq!(cube[6], [0, 51, 0]);
        assert_eq!(cube[215], [255, 255, 255]);
        for entry in cube {
            assert!(entry.iter().all(|c| c % 51 == 0));
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let first = PaletteBuilder::build();
        for _ in 0..10 {
            assert_eq!(PaletteBuilder::build(), first);
        }
        assert_eq!(Palette::default(), first);
    }

    #[test]
    fn test_nearest_exact_entries() {
        let palette = PaletteBuilder::build();
        for entry in palette.entries() {
            let idx = palette.nearest(*entry);
            assert_eq!(palette.get(idx), *entry);
        }
        // Duplicated black resolves to the lowest index
        assert_eq!(palette.nearest([0, 0, 0]), 0);
    }

    #[test]
    fn test_quality_to_shift() {
        assert_eq!(quality_to_shift(0), 0);
        assert_eq!(quality_to_shift(1), 0);
        assert_eq!(quality_to_shift(7), 0);
        assert_eq!(quality_to_shift(8), 1);
        assert_eq!(quality_to_shift(DEFAULT_QUALITY), 1);
        assert_eq!(quality_to_shift(30), 4);
        assert_eq!(quality_to_shift(255), 4);
    }

    #[test]
    fn test_quantize_channel_midpoint() {
        assert_eq!(quantize_channel(200, 0), 200);
        assert_eq!(quantize_channel(0, 2), 2);
        assert_eq!(quantize_channel(255, 4), 248);
    }

    #[test]
    fn test_matcher_maps_pixels() {
        let mut matcher = PaletteMatcher::new(PaletteBuilder::build(), 1);
        let indices = matcher.map_pixels(&[255, 0, 0, 0, 0, 255, 128, 128, 128, 7]);

        // Trailing partial pixel is ignored
        assert_eq!(indices.len(), 3);
        assert_eq!(indices[0], 2);
        assert_eq!(indices[1], 4);
        assert_eq!(matcher.palette().get(indices[2])[0], 132);
    }

    proptest! {
        #[test]
        fn prop_best_quality_is_nearest(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
            let palette = PaletteBuilder::build();
            let mut matcher = PaletteMatcher::new(palette.clone(), MIN_QUALITY);

            let chosen = palette.get(matcher.index_of([r, g, b]));
            let best = palette
                .entries()
                .iter()
                .map(|e| distance_sq(*e, [r, g, b]))
                .min()
                .unwrap();
            prop_assert_eq!(distance_sq(chosen, [r, g, b]), best);
        }

        #[test]
        fn prop_matcher_is_stable(r in any::<u8>(), g in any::<u8>(), b in any::<u8>(), q in 1u8..=30) {
            let mut matcher = PaletteMatcher::new(PaletteBuilder::build(), q);
            let first = matcher.index_of([r, g, b]);
            prop_assert_eq!(matcher.index_of([r, g, b]), first);
        }
    }
}
