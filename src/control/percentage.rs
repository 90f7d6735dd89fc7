/// Map a raw sample onto 0–100 % of a calibration range.
///
/// `raw` is clamped into the range before scaling, so out-of-range samples
/// saturate at 0 or 100 instead of being rejected.  A degenerate range
/// (`min == max`) maps everything to 0.  Reversed bounds are accepted and
/// treated as the same range.  `inverted` flips the scale: the low end of
/// the range reads as 100 %.
pub fn map_to_percentage(raw: u16, min: u16, max: u16, inverted: bool) -> f32 {
    if min == max {
        return 0.0;
    }

    let (lo, hi) = if min < max { (min, max) } else { (max, min) };
    let clamped = raw.clamp(lo, hi);
    let span = f32::from(hi - lo);

    let offset = if inverted { hi - clamped } else { clamped - lo };
    f32::from(offset) / span * 100.0
}
