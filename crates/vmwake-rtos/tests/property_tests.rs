//! Property-based tests for tick conversion and timer state invariants.

use proptest::prelude::*;
use std::time::Duration;
use vmwake_rtos::AtomicTimerState;
use vmwake_rtos::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_ceiling_never_shortens_delay(
        hz in 1u32..=100_000,
        ms in 1i64..=10_000_000,
    ) {
        let rate = TickRate::from_hz(hz);
        let ticks = rate.ms_to_ticks_ceil(ms);
        prop_assert!(ticks >= 1);

        let requested = Duration::from_millis(ms.unsigned_abs());
        prop_assert!(rate.ticks_to_duration(ticks) >= requested);
    }

    #[test]
    fn prop_ceiling_is_tight(
        hz in 1u32..=100_000,
        ms in 1i64..=10_000_000,
    ) {
        // One tick fewer would undershoot
        let ticks = TickRate::from_hz(hz).ms_to_ticks_ceil(ms);
        let one_fewer = u128::from(ticks.saturating_sub(1)) * 1000;
        prop_assert!(one_fewer < u128::from(ms.unsigned_abs()) * u128::from(hz));
    }

    #[test]
    fn prop_only_latest_arm_can_fire(arms in 1usize..20, stop_at_end in any::<bool>()) {
        let state = AtomicTimerState::new();
        let generations: Vec<u64> = (0..arms).map(|_| state.arm()).collect();
        if stop_at_end {
            state.stop();
        }

        let Some((latest, older)) = generations.split_last() else {
            return Ok(());
        };
        for generation in older {
            prop_assert!(!state.try_fire(*generation));
        }
        prop_assert_eq!(state.try_fire(*latest), !stop_at_end);
    }
}
