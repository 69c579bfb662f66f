use caffy_core::learning::{FeedbackEvent, PerceivedLevel, PersonalizationLearner, PersonalizationState};
use caffy_core::model::{
    AggregateEstimator, DecayModel, HalfLifeResolver, LearningParams, Metabolism,
    MetabolismProfile, ModelParams, SleepReadinessPredictor,
};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

fn arb_metabolism() -> impl Strategy<Value = Metabolism> {
    prop_oneof![
        Just(Metabolism::Normal),
        Just(Metabolism::Fast),
        Just(Metabolism::Slow),
    ]
}

fn arb_profile() -> impl Strategy<Value = MetabolismProfile> {
    (
        arb_metabolism(),
        proptest::option::of(-20.0f64..250.0),
        any::<bool>(),
        any::<bool>(),
        proptest::option::of(0u32..14),
    )
        .prop_map(
            |(metabolism, body_mass_kg, is_smoker, is_pregnant, exercises_per_week)| {
                MetabolismProfile {
                    metabolism,
                    body_mass_kg,
                    is_smoker,
                    is_pregnant,
                    exercises_per_week,
                }
            },
        )
}

fn feedback(level: i64, predicted_mg: f64) -> FeedbackEvent {
    FeedbackEvent {
        id: 1,
        user_id: 1,
        feedback_at: Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap(),
        perceived_level: PerceivedLevel::new(level).unwrap(),
        predicted_mg,
        note: String::new(),
        hours_since_last_intake: 1.5,
        last_intake_amount_mg: 100.0,
        consumed: false,
    }
}

// ── Decay curve ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn remaining_never_exceeds_dose(
        amount in 1.0f64..1000.0,
        elapsed in -600.0f64..2000.0,
        half_life in 2.0f64..12.0,
    ) {
        let model = DecayModel::default();
        let remaining = model.remaining_amount(amount, elapsed, half_life);
        prop_assert!(remaining >= 0.0);
        prop_assert!(remaining <= amount + 0.05, "{} > {}", remaining, amount);
    }

    #[test]
    fn decreasing_after_peak(
        amount in 1.0f64..1000.0,
        a in 45.0f64..1440.0,
        b in 45.0f64..1440.0,
        half_life in 2.0f64..12.0,
    ) {
        let model = DecayModel::default();
        let (early, late) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            model.remaining_exact(amount, late, half_life)
                <= model.remaining_exact(amount, early, half_life)
        );
    }

    #[test]
    fn zero_after_retention(
        amount in 1.0f64..1000.0,
        extra in 0.01f64..1000.0,
        half_life in 2.0f64..12.0,
    ) {
        let model = DecayModel::default();
        prop_assert_eq!(model.remaining_amount(amount, 24.0 * 60.0 + extra, half_life), 0.0);
    }

    #[test]
    fn forward_projection_never_grows(
        current in 0.0f64..1000.0,
        hours in 0u32..48,
        half_life in 2.0f64..12.0,
    ) {
        let projected = AggregateEstimator::project_forward(current, half_life, hours as f64);
        prop_assert!(projected <= current);
    }
}

// ── Half-life resolution ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn resolved_half_life_stays_in_range(
        profile in arb_profile(),
        personal in proptest::option::of(2.0f64..12.0),
        confidence in 0.0f64..0.95,
        count in 0u32..40,
    ) {
        let resolver = HalfLifeResolver::new(LearningParams::default());
        let state = PersonalizationState {
            personal_half_life_hours: personal,
            confidence,
            total_feedback_count: count,
        };
        let hl = resolver.resolve(&profile, &state);
        prop_assert!((2.0..=12.0).contains(&hl), "out of range: {}", hl);
    }

    #[test]
    fn sleep_is_never_before_now(
        amount in 1.0f64..800.0,
        intake_offset_min in -1440i64..60,
        half_life in 2.0f64..12.0,
    ) {
        let predictor = SleepReadinessPredictor::new(ModelParams::default());
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 22, 0, 0).unwrap();
        let intake_at = now + Duration::minutes(intake_offset_min);
        let ready = predictor.can_sleep_at(amount, intake_at, half_life, now);
        if amount <= 50.0 {
            prop_assert_eq!(ready, now);
        } else {
            prop_assert!(ready > intake_at);
        }
    }
}

// ── Learning ─────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn ema_lands_between_previous_and_candidate(
        previous in 2.0f64..12.0,
        level in 1i64..=5,
        predicted in 0.0f64..400.0,
    ) {
        let learner = PersonalizationLearner::default();
        let state = PersonalizationState {
            personal_half_life_hours: Some(previous),
            confidence: 0.1,
            total_feedback_count: 2,
        };
        let update = learner
            .on_feedback(&MetabolismProfile::default(), &state, &feedback(level, predicted))
            .unwrap();
        let new = update.state.personal_half_life_hours.unwrap();

        let expected = (1.0 + predicted / 50.0).min(5.0);
        let candidate = (previous + (level as f64 - expected) * 0.1).clamp(2.0, 12.0);
        let (lo, hi) = if previous <= candidate { (previous, candidate) } else { (candidate, previous) };
        prop_assert!(new >= lo - 1e-12 && new <= hi + 1e-12);
        prop_assert!(update.state.confidence >= state.confidence);
    }

    #[test]
    fn confidence_is_monotone_over_feedback_sequences(
        levels in proptest::collection::vec((1i64..=5, 0.0f64..300.0), 1..30),
    ) {
        let learner = PersonalizationLearner::default();
        let profile = MetabolismProfile::default();
        let mut state = PersonalizationState::default();
        for (level, predicted) in levels {
            let update = learner.on_feedback(&profile, &state, &feedback(level, predicted)).unwrap();
            prop_assert!(update.state.confidence >= state.confidence);
            prop_assert!(update.state.confidence <= 0.95);
            state = update.state;
        }
    }
}
