//! Property tests for the sensor engine
//!
//! Debounce, one-shot events and solve-mode evaluation under arbitrary
//! input sequences.

use proptest::prelude::*;

use prop_runtime::core::SensorEngine;
use prop_runtime::hal::{Clock, Level, SimBoard};
use prop_runtime::types::{Millis, PresentWhen, SensorDefinition, SolveMode};

const DEBOUNCE: u32 = 20;

fn magnet(index: usize) -> SensorDefinition {
    SensorDefinition::new(
        format!("magnet{}", index),
        20 + index as u8,
        PresentWhen::LowMeansPresent,
        format!("magnet{}_present", index),
        false,
    )
}

fn engine(count: usize, mode: SolveMode, board: &mut SimBoard) -> SensorEngine {
    let mut engine = SensorEngine::new((0..count).map(magnet).collect(), mode, DEBOUNCE);
    let now = board.now();
    engine.begin(board, now);
    engine
}

fn step(engine: &mut SensorEngine, board: &mut SimBoard, ms: u32) {
    board.advance(ms);
    let now = board.now();
    engine.tick(board, now);
}

proptest! {
    #[test]
    fn toggling_faster_than_debounce_never_registers(
        holds in prop::collection::vec(1u32..DEBOUNCE, 1..80),
        start in any::<u32>(),
    ) {
        let mut board = SimBoard::starting_at(Millis(start));
        let mut engine = engine(1, SolveMode::Any, &mut board);
        let mut present = false;

        for hold in holds {
            present = !present;
            board.set_level(20, Level::from(!present));
            step(&mut engine, &mut board, 1);
            for _ in 1..hold {
                step(&mut engine, &mut board, 1);
            }
            prop_assert!(!engine.state(0).unwrap().present);
        }
        prop_assert!(engine.take_events().is_empty());
    }

    #[test]
    fn at_most_one_event_per_session(pattern in prop::collection::vec(any::<bool>(), 1..30)) {
        let mut board = SimBoard::new();
        let mut engine = engine(1, SolveMode::Any, &mut board);

        for present in &pattern {
            board.set_level(20, Level::from(!*present));
            for _ in 0..10 {
                step(&mut engine, &mut board, 5);
            }
        }

        let expected = usize::from(pattern.iter().any(|p| *p));
        prop_assert_eq!(engine.take_events().len(), expected);
    }

    #[test]
    fn solve_mode_matches_presence(flags in prop::collection::vec(any::<bool>(), 0..6)) {
        for mode in [SolveMode::Any, SolveMode::All] {
            let mut board = SimBoard::new();
            let mut engine = engine(flags.len(), mode, &mut board);

            for (index, present) in flags.iter().enumerate() {
                board.set_level(20 + index as u8, Level::from(!*present));
            }
            for _ in 0..10 {
                step(&mut engine, &mut board, 5);
            }

            let expected = match mode {
                SolveMode::Any => flags.iter().any(|p| *p),
                SolveMode::All => !flags.is_empty() && flags.iter().all(|p| *p),
            };
            prop_assert_eq!(engine.is_solved(), expected);
        }
    }

    #[test]
    fn unarmed_presence_never_counts(ms in 0u32..2000) {
        let mut board = SimBoard::new();
        board.set_level(12, Level::High);
        let rfid = SensorDefinition::new("rfid1", 12, PresentWhen::HighMeansPresent, "rfid_present", true);
        let mut engine = SensorEngine::new(vec![rfid], SolveMode::Any, DEBOUNCE);
        engine.begin(&mut board, Millis::ZERO);

        for _ in 0..(ms / 5) {
            step(&mut engine, &mut board, 5);
        }
        prop_assert!(!engine.is_solved());
        prop_assert!(!engine.state(0).unwrap().armed);
        prop_assert!(engine.take_events().is_empty());
    }
}
