//! Transition blend curves: authored Hermite keyframes, their 4-byte packed form, and evaluation.
//!
//! Packing:
//! - time and value are quantized to `u8` via `round(x * 255)` (domain [0, 1])
//! - tangents are quantized to `i8` via `round(x * 10)` (usable range about ±12.7)
//!
//! An empty packed slice means "linear": `transition_weight` returns the progress
//! unchanged without touching the curve code.

use serde::{Deserialize, Serialize};

pub const VALUE_SCALE: f32 = 255.0;
pub const TANGENT_SCALE: f32 = 10.0;

/// Authored Hermite keyframe in normalized transition time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveKeyframe {
    pub time: f32,
    pub value: f32,
    #[serde(default)]
    pub in_tangent: f32,
    #[serde(default)]
    pub out_tangent: f32,
}

impl CurveKeyframe {
    pub fn new(time: f32, value: f32, in_tangent: f32, out_tangent: f32) -> Self {
        Self {
            time,
            value,
            in_tangent,
            out_tangent,
        }
    }
}

/// Authored blend curve. Keyframes are sorted by time when baked.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BlendCurve {
    pub keyframes: Vec<CurveKeyframe>,
}

impl BlendCurve {
    pub fn new(keyframes: Vec<CurveKeyframe>) -> Self {
        Self { keyframes }
    }

    /// Smooth ease-in/ease-out from 0 to 1 (flat tangents at both ends).
    pub fn ease_in_out() -> Self {
        Self::new(vec![
            CurveKeyframe::new(0.0, 0.0, 0.0, 0.0),
            CurveKeyframe::new(1.0, 1.0, 0.0, 0.0),
        ])
    }

    /// Pack into the baked representation, ordering keyframes by time.
    pub fn pack(&self) -> Vec<PackedKeyframe> {
        let mut keys = self.keyframes.clone();
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        keys.iter().map(PackedKeyframe::pack).collect()
    }
}

/// Keyframe quantized to 4 bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedKeyframe {
    pub time: u8,
    pub value: u8,
    pub in_tangent: i8,
    pub out_tangent: i8,
}

#[inline]
fn quantize_unit(x: f32) -> u8 {
    (x * VALUE_SCALE).round().clamp(0.0, 255.0) as u8
}

#[inline]
fn quantize_tangent(x: f32) -> i8 {
    (x * TANGENT_SCALE).round().clamp(-127.0, 127.0) as i8
}

impl PackedKeyframe {
    pub fn pack(key: &CurveKeyframe) -> Self {
        Self {
            time: quantize_unit(key.time),
            value: quantize_unit(key.value),
            in_tangent: quantize_tangent(key.in_tangent),
            out_tangent: quantize_tangent(key.out_tangent),
        }
    }

    #[inline]
    pub fn unpack(&self) -> CurveKeyframe {
        CurveKeyframe {
            time: self.time as f32 / VALUE_SCALE,
            value: self.value as f32 / VALUE_SCALE,
            in_tangent: self.in_tangent as f32 / TANGENT_SCALE,
            out_tangent: self.out_tangent as f32 / TANGENT_SCALE,
        }
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        [
            self.time,
            self.value,
            self.in_tangent as u8,
            self.out_tangent as u8,
        ]
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            time: bytes[0],
            value: bytes[1],
            in_tangent: bytes[2] as i8,
            out_tangent: bytes[3] as i8,
        }
    }
}

/// Cubic Hermite between two keyframes at absolute time `t`.
#[inline]
pub fn hermite(k0: &CurveKeyframe, k1: &CurveKeyframe, t: f32) -> f32 {
    let dt = k1.time - k0.time;
    if dt <= 0.0 {
        return k1.value;
    }
    let s = ((t - k0.time) / dt).clamp(0.0, 1.0);
    let s2 = s * s;
    let s3 = s2 * s;
    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;
    h00 * k0.value + h10 * dt * k0.out_tangent + h01 * k1.value + h11 * dt * k1.in_tangent
}

/// Evaluate packed, time-ordered keyframes at `t`. Holds the end values outside the keyed range.
pub fn evaluate_packed(keys: &[PackedKeyframe], t: f32) -> f32 {
    match keys.len() {
        0 => t,
        1 => keys[0].unpack().value,
        n => {
            let first = keys[0].unpack();
            if t <= first.time {
                return first.value;
            }
            let mut k0 = first;
            for packed in &keys[1..n] {
                let k1 = packed.unpack();
                if t <= k1.time {
                    return hermite(&k0, &k1, t);
                }
                k0 = k1;
            }
            k0.value
        }
    }
}

/// Blend weight for a transition at raw progress `p`.
///
/// Without keyframes the weight is `p` itself.
#[inline]
pub fn transition_weight(keys: &[PackedKeyframe], p: f32) -> f32 {
    if keys.is_empty() {
        return p;
    }
    evaluate_packed(keys, p).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tangents_saturate_at_i8_range() {
        let packed = PackedKeyframe::pack(&CurveKeyframe::new(0.5, 0.5, 40.0, -40.0));
        assert_eq!(packed.in_tangent, 127);
        assert_eq!(packed.out_tangent, -127);
        let packed = PackedKeyframe::pack(&CurveKeyframe::new(-1.0, 2.0, 0.0, 0.0));
        assert_eq!(packed.time, 0);
        assert_eq!(packed.value, 255);
    }

    #[test]
    fn byte_form_keeps_sign_of_tangents() {
        let packed = PackedKeyframe::pack(&CurveKeyframe::new(0.25, 0.75, -1.3, 2.1));
        assert_eq!(PackedKeyframe::from_bytes(packed.to_bytes()), packed);
    }

    #[test]
    fn ease_in_out_is_symmetric_and_hits_endpoints() {
        let keys = BlendCurve::ease_in_out().pack();
        assert_eq!(evaluate_packed(&keys, 0.0), 0.0);
        assert_eq!(evaluate_packed(&keys, 1.0), 1.0);
        assert!((evaluate_packed(&keys, 0.5) - 0.5).abs() < 1e-6);
        // flat tangents: slow start
        assert!(evaluate_packed(&keys, 0.1) < 0.1);
        assert!(evaluate_packed(&keys, 0.9) > 0.9);
    }

    #[test]
    fn pack_sorts_by_time() {
        let curve = BlendCurve::new(vec![
            CurveKeyframe::new(1.0, 1.0, 0.0, 0.0),
            CurveKeyframe::new(0.0, 0.0, 0.0, 0.0),
        ]);
        let keys = curve.pack();
        assert!(keys[0].time < keys[1].time);
    }

    #[test]
    fn empty_curve_weight_is_progress_exactly() {
        for p in [0.0, 0.25, 0.5, 0.75, 1.0] {
            assert_eq!(transition_weight(&[], p), p);
        }
    }

    #[test]
    fn unpack_stays_within_quantization_error() {
        for i in 0..=20 {
            let x = i as f32 / 20.0;
            let tangent = (i as f32 - 10.0) * 1.17;
            let key = CurveKeyframe::new(x, 1.0 - x, tangent, -tangent);
            let back = PackedKeyframe::pack(&key).unpack();
            assert!((back.time - key.time).abs() <= 1.0 / VALUE_SCALE);
            assert!((back.value - key.value).abs() <= 1.0 / VALUE_SCALE);
            assert!((back.in_tangent - key.in_tangent).abs() <= 1.0 / TANGENT_SCALE);
            assert!((back.out_tangent - key.out_tangent).abs() <= 1.0 / TANGENT_SCALE);
        }
    }

    #[test]
    fn single_keyframe_is_constant() {
        let keys = [PackedKeyframe::pack(&CurveKeyframe::new(0.5, 0.4, 0.0, 0.0))];
        assert_eq!(evaluate_packed(&keys, 0.0), evaluate_packed(&keys, 1.0));
    }
}
