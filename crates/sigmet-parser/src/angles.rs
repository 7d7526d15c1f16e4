//! Binary angle decoding.
//!
//! SIGMET-IRIS stores angles as unsigned fixed-point fractions of a full
//! circle: 16-bit angles in ray headers, 32-bit angles for the radar site
//! position. The raw fields arrive through signed reads, so negative values
//! are the upper half of the unsigned range.

use crate::rounding::round_half_down;

const BIN16_MAX: f64 = 65536.0;
const BIN32_MAX: f64 = 4294967296.0;

/// Decode a 16-bit binary angle to degrees in `[0, 360)`, two decimals.
pub fn decode_angle16(angle: i16) -> f32 {
    let mut ang = angle as f64;
    if ang < 0.0 {
        ang += BIN16_MAX;
    }
    round_half_down(ang / BIN16_MAX * 360.0, 2)
}

/// Decode a 32-bit binary angle to degrees, three decimals. The sign is
/// kept, so southern latitudes and western longitudes come out negative.
pub fn decode_angle32(angle: i32) -> f32 {
    round_half_down(angle as f64 / BIN32_MAX * 360.0, 3)
}

/// Decode a ray elevation angle, two decimals. Negative raw values are
/// two's-complement encodings; their magnitude is the elevation.
pub fn decode_elevation(angle: i16) -> f32 {
    let ang = if angle < 0 {
        -(angle as f64)
    } else {
        angle as f64
    };
    round_half_down(ang / BIN16_MAX * 360.0, 2)
}

/// Mean azimuth of a ray from its start and end angles, two decimals, with
/// wraparound when the ray crosses north (start in the upper half of the
/// encoding, end in the lower).
pub fn mean_azimuth(az0: i16, az1: i16) -> f32 {
    let azim0 = decode_angle16(az0);
    let azim1 = decode_angle16(az1);
    let mut d = (azim0 - azim1).abs();
    if az0 < 0 && az1 > 0 {
        d = (360.0f32 - azim0).abs() + azim1.abs();
    }
    let mut mid = azim0 as f64 + d as f64 * 0.5;
    if mid > 360.0 {
        mid -= 360.0;
    }
    round_half_down(mid, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle16_quadrants() {
        assert_eq!(decode_angle16(0), 0.0);
        assert_eq!(decode_angle16(16384), 90.0);
        assert_eq!(decode_angle16(i16::MIN), 180.0);
        assert_eq!(decode_angle16(-16384), 270.0);
    }

    #[test]
    fn test_angle16_rounds_half_down() {
        // 182/65536 * 360 = 0.99975... -> 1.00
        assert_eq!(decode_angle16(182), 1.0);
        // 91/65536 * 360 = 0.49987... -> 0.50
        assert_eq!(decode_angle16(91), 0.5);
    }

    #[test]
    fn test_angle32_keeps_sign() {
        assert_eq!(decode_angle32(1 << 30), 90.0);
        assert_eq!(decode_angle32(-(1 << 30)), -90.0);
        assert_eq!(decode_angle32(0), 0.0);
    }

    #[test]
    fn test_elevation_negative_is_magnitude() {
        assert_eq!(decode_elevation(182), 1.0);
        assert_eq!(decode_elevation(-182), 1.0);
        assert_eq!(decode_elevation(364), 2.0);
        assert_eq!(decode_elevation(i16::MIN), 180.0);
    }

    #[test]
    fn test_angle16_round_trip() {
        // quantization (0.0055 deg/step) plus two-decimal rounding stays
        // inside a hundredth of a degree
        for i in 0..3600 {
            let deg = i as f64 * 0.1;
            let raw = ((deg / 360.0) * 65536.0).round() as u16 as i16;
            let back = decode_angle16(raw) as f64;
            assert!((back - deg).abs() < 0.01, "{} decoded to {}", deg, back);
        }
    }

    #[test]
    fn test_mean_azimuth_simple() {
        // 18204 -> 100.00 deg, 18386 -> 101.00 deg
        assert_eq!(mean_azimuth(18204, 18386), 100.5);
    }

    #[test]
    fn test_mean_azimuth_wraps_north() {
        // -182 -> 359.00 deg, 546 -> 3.00 deg; midpoint crosses 360
        assert_eq!(mean_azimuth(-182, 546), 1.0);
    }
}
