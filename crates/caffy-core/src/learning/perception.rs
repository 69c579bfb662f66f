//! Mapping between remaining amount and the 1..=5 perception scale.

/// Milligrams per perception level step.
const MG_PER_LEVEL: f64 = 50.0;

/// Perception level implied by an amount: 0 mg -> 1, 50 mg -> 2, ...,
/// 200 mg and above -> 5.
pub fn mg_to_sense_level(mg: f64) -> f64 {
    if mg <= 0.0 {
        return 1.0;
    }
    (1.0 + mg / MG_PER_LEVEL).min(5.0)
}
