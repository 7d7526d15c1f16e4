//! Decimal rounding with the half-down convention.
//!
//! Every derived value this crate hands out (angles, gate steps, Nyquist
//! velocity, physical data values) is rounded half-down at a fixed decimal
//! count. Legacy consumers compare these values bit for bit, so the
//! convention is part of the format contract, not a cosmetic choice.

/// Round `value` to `decimals` decimal places, ties toward zero.
pub fn round_half_down(value: f64, decimals: u32) -> f32 {
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    let rounded = if scaled >= 0.0 {
        (scaled - 0.5).ceil()
    } else {
        (scaled + 0.5).floor()
    };
    (rounded / factor) as f32
}
