//! Palette extraction by weighted median cut over the exact-color histogram.
//!
//! Everything here is deterministic: histogram entries keep first-appearance
//! order, box selection and axis choice break ties by index, and the final
//! palette is ordered by pixel count then first appearance.

use std::collections::HashMap;

use image::Rgb;
use ndarray::Array2;
use tracing::debug;

use crate::buffer::PixelBuffer;
use crate::config::validate_max_colors;
use crate::VectorizeResult;

/// Per-pixel palette index, shaped `(height, width)`.
///
/// `None` marks a fully transparent source pixel that belongs to no color.
pub type IndexMap = Array2<Option<u8>>;

/// Ordered set of distinct representative colors.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
}

impl Palette {
    pub fn new(colors: Vec<Rgb<u8>>) -> Self {
        Self { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Rgb<u8>> {
        self.colors.get(index).copied()
    }

    pub fn colors(&self) -> &[Rgb<u8>] {
        &self.colors
    }

    pub fn iter(&self) -> impl Iterator<Item = Rgb<u8>> + '_ {
        self.colors.iter().copied()
    }
}

/// One distinct color of the source with its pixel count.
#[derive(Debug, Clone, Copy)]
struct HistEntry {
    color: [u8; 3],
    count: u64,
}

/// Collect distinct visible colors in first-appearance order, plus the entry of every pixel.
fn build_histogram(buffer: &PixelBuffer) -> (Vec<HistEntry>, Vec<Option<u32>>) {
    let mut lookup: HashMap<[u8; 3], u32> = HashMap::new();
    let mut entries: Vec<HistEntry> = Vec::new();
    let mut pixel_entries = Vec::with_capacity(buffer.image().len() / 3);

    for (idx, px) in buffer.image().pixels().enumerate() {
        if buffer.is_transparent(idx) {
            pixel_entries.push(None);
            continue;
        }
        let entry = *lookup.entry(px.0).or_insert_with(|| {
            entries.push(HistEntry {
                color: px.0,
                count: 0,
            });
            (entries.len() - 1) as u32
        });
        entries[entry as usize].count += 1;
        pixel_entries.push(Some(entry));
    }

    (entries, pixel_entries)
}

/// A box of histogram entries for median cut subdivision.
#[derive(Debug, Clone)]
struct ColorBox {
    members: Vec<usize>,
}

impl ColorBox {
    fn weight(&self, entries: &[HistEntry]) -> u64 {
        self.members.iter().map(|&i| entries[i].count).sum()
    }

    /// Per-channel (max - min) over the members.
    fn ranges(&self, entries: &[HistEntry]) -> [u8; 3] {
        let mut lo = [u8::MAX; 3];
        let mut hi = [u8::MIN; 3];
        for &i in &self.members {
            for c in 0..3 {
                lo[c] = lo[c].min(entries[i].color[c]);
                hi[c] = hi[c].max(entries[i].color[c]);
            }
        }
        [hi[0] - lo[0], hi[1] - lo[1], hi[2] - lo[2]]
    }

    /// Split priority: heavier boxes with wider spread split first.
    fn priority(&self, entries: &[HistEntry]) -> u64 {
        let widest = self.ranges(entries).into_iter().max().unwrap_or(0);
        self.weight(entries) * widest as u64
    }

    /// Weighted mean of the members, rounded to the nearest integer.
    fn mean(&self, entries: &[HistEntry]) -> [u8; 3] {
        let total = self.weight(entries).max(1);
        let mut sums = [0u64; 3];
        for &i in &self.members {
            for c in 0..3 {
                sums[c] += entries[i].color[c] as u64 * entries[i].count;
            }
        }
        sums.map(|s| ((s + total / 2) / total) as u8)
    }

    /// Split along the widest channel (ties: R, G, B) at the weighted median.
    fn split(mut self, entries: &[HistEntry]) -> (ColorBox, ColorBox) {
        let [rr, rg, rb] = self.ranges(entries);
        let axis = if rr >= rg && rr >= rb {
            0
        } else if rg >= rb {
            1
        } else {
            2
        };

        // Entry indices double as first-appearance order.
        self.members
            .sort_by_key(|&i| (entries[i].color[axis], i));

        let half = self.weight(entries).div_ceil(2);
        let mut accumulated = 0u64;
        let mut split_idx = 1;
        for (pos, &i) in self.members.iter().enumerate() {
            accumulated += entries[i].count;
            if accumulated >= half {
                split_idx = pos + 1;
                break;
            }
        }
        split_idx = split_idx.clamp(1, self.members.len() - 1);

        let right = self.members.split_off(split_idx);
        (self, ColorBox { members: right })
    }
}

fn median_cut(entries: &[HistEntry], max_colors: usize) -> Vec<[u8; 3]> {
    let mut boxes = vec![ColorBox {
        members: (0..entries.len()).collect(),
    }];

    while boxes.len() < max_colors {
        let mut best: Option<(usize, u64)> = None;
        for (i, b) in boxes.iter().enumerate() {
            if b.members.len() < 2 {
                continue;
            }
            let priority = b.priority(entries);
            if best.is_none_or(|(_, p)| priority > p) {
                best = Some((i, priority));
            }
        }
        let Some((idx, _)) = best else {
            break;
        };

        let to_split = boxes.remove(idx);
        let (left, right) = to_split.split(entries);
        boxes.insert(idx, right);
        boxes.insert(idx, left);
    }

    let mut means: Vec<[u8; 3]> = Vec::with_capacity(boxes.len());
    for b in &boxes {
        let mean = b.mean(entries);
        if !means.contains(&mean) {
            means.push(mean);
        }
    }
    means
}

fn distance_sq(a: [u8; 3], b: [u8; 3]) -> u32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    (dr * dr + dg * dg + db * db) as u32
}

/// Index of the closest candidate; ties resolve to the lowest index.
fn nearest(color: [u8; 3], candidates: &[[u8; 3]]) -> usize {
    let mut best = 0;
    let mut best_dist = u32::MAX;
    for (idx, candidate) in candidates.iter().enumerate() {
        let dist = distance_sq(color, *candidate);
        if dist < best_dist {
            best = idx;
            best_dist = dist;
        }
    }
    best
}

/// Reduce the buffer to at most `max_colors` colors.
///
/// Returns the palette (most frequent first) and the per-pixel index map.
pub fn quantize(buffer: &PixelBuffer, max_colors: usize) -> VectorizeResult<(Palette, IndexMap)> {
    validate_max_colors(max_colors)?;

    let (w, h) = buffer.dimensions();
    let (entries, pixel_entries) = build_histogram(buffer);

    let candidates: Vec<[u8; 3]> = if entries.len() <= max_colors {
        entries.iter().map(|e| e.color).collect()
    } else {
        median_cut(&entries, max_colors)
    };

    // Map every histogram entry onto a candidate and accumulate usage.
    let entry_to_candidate: Vec<usize> = if entries.len() <= max_colors {
        (0..entries.len()).collect()
    } else {
        entries.iter().map(|e| nearest(e.color, &candidates)).collect()
    };
    let mut usage = vec![(0u64, usize::MAX); candidates.len()];
    for (entry_idx, (&cand, entry)) in entry_to_candidate.iter().zip(&entries).enumerate() {
        usage[cand].0 += entry.count;
        usage[cand].1 = usage[cand].1.min(entry_idx);
    }

    let mut order: Vec<usize> = (0..candidates.len())
        .filter(|&c| usage[c].0 > 0)
        .collect();
    order.sort_by(|&a, &b| usage[b].0.cmp(&usage[a].0).then(usage[a].1.cmp(&usage[b].1)));

    let mut final_index = vec![0u8; candidates.len()];
    for (pos, &cand) in order.iter().enumerate() {
        final_index[cand] = pos as u8;
    }
    let palette = Palette::new(order.iter().map(|&c| Rgb(candidates[c])).collect());

    let mut index_map = IndexMap::from_elem((h as usize, w as usize), None);
    for (cell, entry) in index_map.iter_mut().zip(&pixel_entries) {
        *cell = entry.map(|e| final_index[entry_to_candidate[e as usize]]);
    }

    debug!(
        distinct = entries.len(),
        palette = palette.len(),
        max_colors,
        "quantized pixel buffer"
    );

    Ok((palette, index_map))
}
