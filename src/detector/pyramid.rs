//! Multi-octave grayscale image pyramid.
//!
//! Level `i` (for `1 <= i <= interval`) is the input scaled by `scale^-i`;
//! every later level is a 2x2 box downsample of the level one octave
//! (`interval + 1` levels) above it. From the third octave on each level is
//! also stored in four variants sampled at pixel offsets `(dx, dy)` of the
//! source, so the detector can step its window by half a pixel of the
//! quarter-resolution level without interpolating.
//!
//! Levels are addressed as `level * 4 + variant`; buffers are reused across
//! calls and only reallocated when the frame size changes.

use crate::frame::GrayFrame;

/// Sub-pixel offsets of the four variants
pub const VARIANT_OFFSETS: [(usize, usize); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];

/// Reusable image pyramid
#[derive(Debug, Default)]
pub struct Pyramid {
    levels: Vec<GrayFrame>,
    scale: f64,
    next: usize,
    scale_upto: usize,
    row_scratch: Vec<f32>,
    col_spans: Vec<Span>,
    row_spans: Vec<Span>,
}

/// Source range and edge weights covered by one destination pixel
#[derive(Debug, Clone, Copy, Default)]
struct Span {
    first: usize,
    last: usize,
    first_weight: f32,
    last_weight: f32,
}

impl Pyramid {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the pyramid for `src`; returns the number of octaves to scan
    ///
    /// Returns 0 (and builds nothing) when the frame is smaller than the window.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn build(&mut self, src: &GrayFrame, window_width: usize, window_height: usize, interval: usize) -> usize {
        self.next = interval + 1;
        self.scale = 2f64.powf(1.0 / self.next as f64);
        self.scale_upto = 0;

        if src.width() == 0 || src.height() == 0 || window_width == 0 || window_height == 0 {
            return 0;
        }
        let ratio = (src.width() as f64 / window_width as f64).min(src.height() as f64 / window_height as f64);
        let upto = (ratio.ln() / self.scale.ln()).floor();
        if !(upto >= 1.0) {
            log::trace!(
                "Frame {}x{} too small for a {window_width}x{window_height} window",
                src.width(),
                src.height()
            );
            return 0;
        }
        self.scale_upto = upto as usize;

        let total = (self.scale_upto + 2 * self.next) * 4;
        if self.levels.len() < total {
            self.levels.resize_with(total, GrayFrame::default);
        }

        self.levels[0].reshape(src.width(), src.height());
        self.levels[0].data_mut().copy_from_slice(src.data());

        for i in 1..=interval {
            let factor = self.scale.powi(i as i32);
            let nw = (src.width() as f64 / factor) as usize;
            let nh = (src.height() as f64 / factor) as usize;
            let mut dst = std::mem::take(&mut self.levels[i * 4]);
            self.resample(src, &mut dst, nw, nh);
            self.levels[i * 4] = dst;
        }

        let end = self.scale_upto + 2 * self.next;
        for i in self.next..end {
            let (lo, hi) = self.levels.split_at_mut(i * 4);
            pyr_down(&lo[(i - self.next) * 4], &mut hi[0], (0, 0));
        }
        for i in 2 * self.next..end {
            let (lo, hi) = self.levels.split_at_mut(i * 4);
            for (q, &offset) in VARIANT_OFFSETS.iter().enumerate().skip(1) {
                pyr_down(&lo[(i - self.next) * 4], &mut hi[q], offset);
            }
        }

        log::trace!(
            "Pyramid built: {} octaves, scale {:.4}, {} levels",
            self.scale_upto,
            self.scale,
            end
        );
        self.scale_upto
    }

    /// Scale ratio between neighboring levels
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Level distance of one octave (`interval + 1`)
    #[must_use]
    pub fn next(&self) -> usize {
        self.next
    }

    /// Number of octaves the detector scans
    #[must_use]
    pub fn scale_upto(&self) -> usize {
        self.scale_upto
    }

    /// Pyramid level `level` in sub-pixel `variant` (0..4)
    #[must_use]
    pub fn level(&self, level: usize, variant: usize) -> &GrayFrame {
        &self.levels[level * 4 + variant]
    }

    /// Area-averaging resample of `src` into `dst`
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn resample(&mut self, src: &GrayFrame, dst: &mut GrayFrame, nw: usize, nh: usize) {
        dst.reshape(nw, nh);
        if nw == 0 || nh == 0 {
            return;
        }
        compute_spans(src.width(), nw, &mut self.col_spans);
        compute_spans(src.height(), nh, &mut self.row_spans);
        let x_norm = nw as f32 / src.width() as f32;
        let y_norm = nh as f32 / src.height() as f32;

        // Horizontal pass into an nw x src.height() float buffer
        self.row_scratch.clear();
        self.row_scratch.resize(nw * src.height(), 0.0);
        for y in 0..src.height() {
            let row = &src.data()[y * src.width()..(y + 1) * src.width()];
            let out = &mut self.row_scratch[y * nw..(y + 1) * nw];
            for (value, span) in out.iter_mut().zip(&self.col_spans) {
                *value = span_sum(span, |i| f32::from(row[i])) * x_norm;
            }
        }

        // Vertical pass
        let scratch = &self.row_scratch;
        let dst_data = dst.data_mut();
        for (y, span) in self.row_spans.iter().enumerate() {
            for x in 0..nw {
                let value = span_sum(span, |i| scratch[i * nw + x]) * y_norm;
                dst_data[y * nw + x] = value.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Source spans for shrinking `src_len` samples to `dst_len`
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn compute_spans(src_len: usize, dst_len: usize, spans: &mut Vec<Span>) {
    spans.clear();
    let step = src_len as f64 / dst_len as f64;
    for d in 0..dst_len {
        let start = d as f64 * step;
        let end = ((d + 1) as f64 * step).min(src_len as f64);
        let first = start.floor() as usize;
        let last = ((end.ceil() as usize).max(first + 1) - 1).min(src_len - 1);
        let first_weight = if first == last {
            (end - start) as f32
        } else {
            ((first + 1) as f64 - start) as f32
        };
        let last_weight = (end - last as f64) as f32;
        spans.push(Span {
            first,
            last,
            first_weight,
            last_weight,
        });
    }
}

fn span_sum(span: &Span, sample: impl Fn(usize) -> f32) -> f32 {
    if span.first == span.last {
        return sample(span.first) * span.first_weight;
    }
    let mut sum = sample(span.first) * span.first_weight + sample(span.last) * span.last_weight;
    for i in span.first + 1..span.last {
        sum += sample(i);
    }
    sum
}

/// Halve `src` into `dst` with a 2x2 box filter starting at `(dx, dy)`
///
/// Every variant has the size of the `(0, 0)` downsample; samples past the
/// right or bottom edge repeat the last row or column.
fn pyr_down(src: &GrayFrame, dst: &mut GrayFrame, (dx, dy): (usize, usize)) {
    let (w, h) = (src.width(), src.height());
    let (nw, nh) = (w / 2, h / 2);
    dst.reshape(nw, nh);
    if nw == 0 || nh == 0 {
        return;
    }
    let data = src.data();
    let out = dst.data_mut();
    for y in 0..nh {
        let y0 = (2 * y + dy).min(h - 1);
        let y1 = (2 * y + dy + 1).min(h - 1);
        for x in 0..nw {
            let x0 = (2 * x + dx).min(w - 1);
            let x1 = (2 * x + dx + 1).min(w - 1);
            let sum = u16::from(data[y0 * w + x0])
                + u16::from(data[y0 * w + x1])
                + u16::from(data[y1 * w + x0])
                + u16::from(data[y1 * w + x1]);
            out[y * nw + x] = ((sum + 2) / 4) as u8;
        }
    }
}
