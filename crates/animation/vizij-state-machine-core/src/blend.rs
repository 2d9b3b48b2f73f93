//! Blend-space weight math for 1D and 2D blend states.
//!
//! All functions write into a caller-provided slice (one weight per clip) and never allocate.

use crate::blob::Directional2DClipEntry;
use crate::graph::Blend2DAlgorithm;

const EPS: f32 = 1e-5;

/// Weights of a 1D blend for parameter value `v`. `thresholds` must be sorted ascending.
///
/// Only the bracketing pair receives weight; values outside the range clamp to the end clips.
pub fn linear_blend_weights(thresholds: &[f32], v: f32, out: &mut [f32]) {
    debug_assert_eq!(thresholds.len(), out.len());
    out.iter_mut().for_each(|w| *w = 0.0);
    let n = thresholds.len();
    if n == 0 {
        return;
    }
    if n == 1 || v <= thresholds[0] {
        out[0] = 1.0;
        return;
    }
    if v >= thresholds[n - 1] {
        out[n - 1] = 1.0;
        return;
    }
    for i in 0..n - 1 {
        let (t0, t1) = (thresholds[i], thresholds[i + 1]);
        if v >= t0 && v <= t1 {
            let span = t1 - t0;
            let s = if span > EPS { (v - t0) / span } else { 0.0 };
            out[i] = 1.0 - s;
            out[i + 1] = s;
            return;
        }
    }
    out[n - 1] = 1.0;
}

#[inline]
fn sub(a: [f32; 2], b: [f32; 2]) -> [f32; 2] {
    [a[0] - b[0], a[1] - b[1]]
}

#[inline]
fn dot(a: [f32; 2], b: [f32; 2]) -> f32 {
    a[0] * b[0] + a[1] * b[1]
}

#[inline]
fn len2(a: [f32; 2]) -> f32 {
    dot(a, a)
}

/// Weights of a 2D blend for `input`, normalized to sum to 1.
pub fn directional_blend_weights(
    clips: &[Directional2DClipEntry],
    input: [f32; 2],
    algorithm: Blend2DAlgorithm,
    out: &mut [f32],
) {
    debug_assert_eq!(clips.len(), out.len());
    out.iter_mut().for_each(|w| *w = 0.0);
    match clips.len() {
        0 => return,
        1 => {
            out[0] = 1.0;
            return;
        }
        _ => {}
    }
    match algorithm {
        Blend2DAlgorithm::SimpleDirectional => simple_directional(clips, input, out),
        Blend2DAlgorithm::FreeformCartesian => gradient_band(clips, input, out),
    }
    normalize_or_nearest(clips, input, out);
}

/// Polar blend: the two directions bracketing the input angle, plus the centre clip by magnitude.
fn simple_directional(clips: &[Directional2DClipEntry], input: [f32; 2], out: &mut [f32]) {
    let center = clips.iter().position(|c| len2(c.position) < EPS);
    if len2(input) < EPS {
        if let Some(c) = center {
            out[c] = 1.0;
        }
        return;
    }

    let angle = input[1].atan2(input[0]);
    // Closest direction counter-clockwise (ccw) and clockwise (cw) of the input angle.
    let mut ccw: Option<(usize, f32)> = None;
    let mut cw: Option<(usize, f32)> = None;
    for (i, c) in clips.iter().enumerate() {
        if Some(i) == center {
            continue;
        }
        let mut delta = c.position[1].atan2(c.position[0]) - angle;
        while delta <= -std::f32::consts::PI {
            delta += std::f32::consts::TAU;
        }
        while delta > std::f32::consts::PI {
            delta -= std::f32::consts::TAU;
        }
        if delta >= 0.0 {
            if ccw.map_or(true, |(_, d)| delta < d) {
                ccw = Some((i, delta));
            }
        } else if cw.map_or(true, |(_, d)| delta > d) {
            cw = Some((i, delta));
        }
    }

    let (a, b) = match (ccw, cw) {
        (Some((a, delta)), _) if delta < EPS => {
            single_direction(clips, center, a, input, out);
            return;
        }
        (Some((a, _)), Some((b, _))) => (a, b),
        (Some((a, _)), None) | (None, Some((a, _))) => {
            single_direction(clips, center, a, input, out);
            return;
        }
        (None, None) => {
            if let Some(c) = center {
                out[c] = 1.0;
            }
            return;
        }
    };

    // Solve input = alpha * pa + beta * pb.
    let pa = clips[a].position;
    let pb = clips[b].position;
    let det = pa[0] * pb[1] - pa[1] * pb[0];
    if det.abs() < EPS {
        // Collinear pair: the one pointing the same way wins.
        let pick = if dot(pa, input) >= dot(pb, input) { a } else { b };
        out[pick] = 1.0;
        return;
    }
    let alpha = ((input[0] * pb[1] - input[1] * pb[0]) / det).max(0.0);
    let beta = ((pa[0] * input[1] - pa[1] * input[0]) / det).max(0.0);
    let sum = alpha + beta;
    match center {
        Some(c) if sum < 1.0 => {
            out[a] = alpha;
            out[b] = beta;
            out[c] = 1.0 - sum;
        }
        _ => {
            out[a] = alpha;
            out[b] = beta;
        }
    }
}

/// Input along one clip's direction: that clip by projected magnitude, the centre takes the rest.
fn single_direction(
    clips: &[Directional2DClipEntry],
    center: Option<usize>,
    i: usize,
    input: [f32; 2],
    out: &mut [f32],
) {
    let p = clips[i].position;
    let alpha = (dot(input, p) / len2(p)).max(0.0);
    out[i] = alpha;
    if let Some(c) = center {
        if alpha < 1.0 {
            out[c] = 1.0 - alpha;
        }
    }
}

/// Gradient-band interpolation over Cartesian positions.
fn gradient_band(clips: &[Directional2DClipEntry], input: [f32; 2], out: &mut [f32]) {
    for (i, ci) in clips.iter().enumerate() {
        let to_input = sub(input, ci.position);
        let mut w = f32::INFINITY;
        for (j, cj) in clips.iter().enumerate() {
            if i == j {
                continue;
            }
            let edge = sub(cj.position, ci.position);
            let l2 = len2(edge);
            if l2 < EPS {
                continue;
            }
            w = w.min(1.0 - dot(to_input, edge) / l2);
        }
        out[i] = if w.is_finite() { w.max(0.0) } else { 0.0 };
    }
}

fn normalize_or_nearest(clips: &[Directional2DClipEntry], input: [f32; 2], out: &mut [f32]) {
    let sum: f32 = out.iter().sum();
    if sum > EPS {
        out.iter_mut().for_each(|w| *w /= sum);
        return;
    }
    let mut nearest = 0;
    let mut best = f32::INFINITY;
    for (i, c) in clips.iter().enumerate() {
        let d = len2(sub(c.position, input));
        if d < best {
            best = d;
            nearest = i;
        }
    }
    out.iter_mut().for_each(|w| *w = 0.0);
    out[nearest] = 1.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "left={a} right={b}");
    }

    fn entry(x: f32, y: f32) -> Directional2DClipEntry {
        Directional2DClipEntry {
            clip_index: 0,
            position: [x, y],
            speed: 1.0,
        }
    }

    #[test]
    fn linear_weights_bracket_and_clamp() {
        let thresholds = [0.0, 1.0, 3.0];
        let mut w = [0.0; 3];
        linear_blend_weights(&thresholds, 2.0, &mut w);
        assert_eq!(w, [0.0, 0.5, 0.5]);
        linear_blend_weights(&thresholds, -5.0, &mut w);
        assert_eq!(w, [1.0, 0.0, 0.0]);
        linear_blend_weights(&thresholds, 9.0, &mut w);
        assert_eq!(w, [0.0, 0.0, 1.0]);
        linear_blend_weights(&thresholds, 0.25, &mut w);
        assert_eq!(w, [0.75, 0.25, 0.0]);
    }

    #[test]
    fn linear_weights_with_duplicate_thresholds_do_not_divide_by_zero() {
        let thresholds = [0.0, 1.0, 1.0, 2.0];
        let mut w = [0.0; 4];
        linear_blend_weights(&thresholds, 1.0, &mut w);
        assert!(w.iter().all(|x| x.is_finite()));
        approx(w.iter().sum(), 1.0);
    }

    #[test]
    fn simple_directional_blends_neighbours_and_centre() {
        let clips = [entry(0.0, 0.0), entry(1.0, 0.0), entry(0.0, 1.0), entry(-1.0, 0.0)];
        let mut w = [0.0; 4];
        directional_blend_weights(&clips, [0.0, 0.0], Blend2DAlgorithm::SimpleDirectional, &mut w);
        assert_eq!(w, [1.0, 0.0, 0.0, 0.0]);

        directional_blend_weights(&clips, [0.5, 0.5], Blend2DAlgorithm::SimpleDirectional, &mut w);
        approx(w[1], 0.5);
        approx(w[2], 0.5);
        approx(w[0], 0.0);

        directional_blend_weights(&clips, [0.5, 0.0], Blend2DAlgorithm::SimpleDirectional, &mut w);
        approx(w[0], 0.5);
        approx(w[1], 0.5);
    }

    #[test]
    fn gradient_band_hits_clip_exactly_at_its_position() {
        let clips = [entry(0.0, 0.0), entry(1.0, 0.0), entry(0.0, 1.0), entry(1.0, 1.0)];
        let mut w = [0.0; 4];
        directional_blend_weights(&clips, [1.0, 0.0], Blend2DAlgorithm::FreeformCartesian, &mut w);
        approx(w[1], 1.0);
        directional_blend_weights(&clips, [0.5, 0.5], Blend2DAlgorithm::FreeformCartesian, &mut w);
        approx(w.iter().sum(), 1.0);
        for x in w {
            approx(x, 0.25);
        }
    }
}
