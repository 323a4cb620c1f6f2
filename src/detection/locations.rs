use rand::Rng;

use crate::config::LocationConfig;
use crate::models::DefectLocation;

/// Place nominal defect markers inside a `frame`×`frame` image.
///
/// Markers are decoration only: they are drawn from `rng`, keep `margin`
/// pixels away from every edge and are reported in percent of the frame.
pub fn synthesize_locations<R: Rng + ?Sized>(
    rng: &mut R,
    frame: u32,
    config: &LocationConfig,
) -> Vec<DefectLocation> {
    let low = config.margin;
    let high = frame.saturating_sub(config.margin);
    if frame == 0 || low >= high {
        return Vec::new();
    }

    let count = rng.gen_range(config.min_count..=config.max_count);
    (0..count)
        .map(|_| {
            let x = rng.gen_range(low..high);
            let y = rng.gen_range(low..high);
            DefectLocation {
                x: x * 100 / frame,
                y: y * 100 / frame,
            }
        })
        .collect()
}
