//! Per-parameter conversion of raw gate bytes to physical values.
//!
//! Every gate arrives as one byte; the parameter type selects the formula.
//! One table drives both the dataset description and the read-time
//! conversion, so every declared data variable is decodable by construction.

use crate::header::MULTI_PRF_COEF;
use crate::rounding::round_half_down;

/// Physical value standing in for an absent or truncated gate.
pub const MISSING: f32 = -999.99;

/// Parameter type codes of the format, in data-mask order.
pub const TOTAL_POWER: i16 = 1;
pub const REFLECTIVITY: i16 = 2;
pub const VELOCITY: i16 = 3;
pub const WIDTH: i16 = 4;
pub const DIFF_REFLECTIVITY: i16 = 5;

/// Variable name for a parameter type code.
pub fn param_name(data_type: i16) -> Option<&'static str> {
    match data_type {
        TOTAL_POWER => Some("TotalPower"),
        REFLECTIVITY => Some("Reflectivity"),
        VELOCITY => Some("Velocity"),
        WIDTH => Some("Width"),
        DIFF_REFLECTIVITY => Some("Differential_Reflectivity"),
        _ => None,
    }
}

/// Measurement units for a parameter type code.
pub fn param_units(data_type: i16) -> &'static str {
    match data_type {
        VELOCITY | WIDTH => "m/sec",
        DIFF_REFLECTIVITY => "dB",
        _ => "dbZ",
    }
}

/// Decode one gate byte, two decimals half-down.
///
/// Byte `0` means "no echo" for every parameter type and maps to
/// [`MISSING`]. Unknown type codes fall back to the reflectivity formula.
pub fn decode_sample(data_type: i16, byte: u8, vnyq: f32, multi_prf_mode: i16) -> f32 {
    if byte == 0 {
        return MISSING;
    }
    let b = byte as f64;
    let coef = MULTI_PRF_COEF[multi_prf_mode as usize];
    let value = match data_type {
        VELOCITY => ((b - 128.0) / 127.0) * vnyq as f64 * coef,
        WIDTH => {
            let v = ((b - 128.0) / 127.0) * vnyq as f64 * coef;
            (b / 256.0) * v
        }
        DIFF_REFLECTIVITY => (b - 128.0) / 16.0,
        _ => (b - 64.0) * 0.5,
    };
    round_half_down(value, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_table() {
        assert_eq!(param_name(1), Some("TotalPower"));
        assert_eq!(param_name(5), Some("Differential_Reflectivity"));
        assert_eq!(param_name(6), None);
        assert_eq!(param_units(2), "dbZ");
        assert_eq!(param_units(3), "m/sec");
        assert_eq!(param_units(5), "dB");
    }

    #[test]
    fn test_zero_byte_is_missing_for_every_type() {
        for dt in 1..=5 {
            assert_eq!(decode_sample(dt, 0, 13.5, 0), MISSING);
        }
    }

    #[test]
    fn test_reflectivity_formula() {
        // (byte - 64) * 0.5 dBZ
        assert_eq!(decode_sample(REFLECTIVITY, 64, 13.5, 0), 0.0);
        assert_eq!(decode_sample(REFLECTIVITY, 129, 13.5, 0), 32.5);
        assert_eq!(decode_sample(TOTAL_POWER, 2, 13.5, 0), -31.0);
    }

    #[test]
    fn test_velocity_formula() {
        // (192 - 128) / 127 * 13.5 = 6.8031... -> 6.80
        assert_eq!(decode_sample(VELOCITY, 192, 13.5, 0), 6.80);
        // mode 1 doubles the unambiguous range
        assert_eq!(decode_sample(VELOCITY, 192, 13.5, 1), 13.61);
        assert_eq!(decode_sample(VELOCITY, 64, 13.5, 0), -6.80);
    }

    #[test]
    fn test_width_scales_same_byte_velocity() {
        // v = (192-128)/127 * 13.5 = 6.8031..., width = 192/256 * v = 5.1023...
        assert_eq!(decode_sample(WIDTH, 192, 13.5, 0), 5.10);
    }

    #[test]
    fn test_differential_reflectivity_formula() {
        assert_eq!(decode_sample(DIFF_REFLECTIVITY, 128, 13.5, 0), 0.0);
        assert_eq!(decode_sample(DIFF_REFLECTIVITY, 160, 13.5, 0), 2.0);
        assert_eq!(decode_sample(DIFF_REFLECTIVITY, 96, 13.5, 0), -2.0);
    }

    #[test]
    fn test_unknown_type_uses_reflectivity_formula() {
        assert_eq!(decode_sample(9, 129, 13.5, 0), 32.5);
    }
}
