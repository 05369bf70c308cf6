//! ColorState Tests

use rgbclient::color::{ColorState, Rgb};
use rgbclient::protocol::Command;

#[test]
fn test_no_color_before_absolute() {
    let mut state = ColorState::new();
    assert_eq!(state.effective(), None);

    state.apply(&Command::relative(10, 10, 10));
    assert_eq!(state.effective(), None);
    assert_eq!(state.relative_count(), 1);
}

#[test]
fn test_absolute_sets_color() {
    let mut state = ColorState::new();
    state.apply(&Command::absolute(10, 20, 30));

    assert_eq!(state.effective(), Some(Rgb::new(10, 20, 30)));
}

#[test]
fn test_relative_accumulates() {
    let mut state = ColorState::new();
    state.apply(&Command::absolute(100, 100, 100));
    state.apply(&Command::relative(-5, 0, 300));
    state.apply(&Command::relative(5, 1, -1));

    assert_eq!(state.effective(), Some(Rgb::new(100, 101, 399)));
    assert_eq!(state.relative_count(), 2);
}

#[test]
fn test_absolute_discards_deltas() {
    let mut state = ColorState::new();
    state.apply(&Command::relative(50, 50, 50));
    state.apply(&Command::absolute(1, 2, 3));

    assert_eq!(state.effective(), Some(Rgb::new(1, 2, 3)));
    assert_eq!(state.relative_count(), 0);
}

#[test]
fn test_last_command_id_is_cursor() {
    let mut state = ColorState::new();
    assert_eq!(state.last_command_id(), None);

    let a = Command::absolute(1, 1, 1);
    let b = Command::relative(1, 1, 1);
    state.apply(&a);
    state.apply(&b);

    assert_eq!(state.last_command_id(), Some(b.id));
}

#[test]
fn test_to_argb() {
    assert_eq!(Rgb::new(0x12, 0x34, 0x56).to_argb(), 0xFF12_3456);
    assert_eq!(Rgb::new(256 + 1, -1, 0).to_argb(), 0xFF01_FF00);
}

#[test]
fn test_long_relative_run_wraps() {
    let mut state = ColorState::new();
    state.apply(&Command::absolute(0, 0, 0));

    let step = Command::relative(i16::MAX, 0, i16::MIN);
    for _ in 0..70_000 {
        state.apply(&step);
    }

    let expected_r = (0..70_000).fold(0i32, |acc, _| acc.wrapping_add(i16::MAX.into()));
    let expected_b = (0..70_000).fold(0i32, |acc, _| acc.wrapping_add(i16::MIN.into()));
    assert_eq!(state.effective(), Some(Rgb::new(expected_r, 0, expected_b)));
    assert_eq!(state.relative_count(), 70_000);
}

#[test]
fn test_wrapped_base_plus_delta() {
    let mut state = ColorState::new();
    state.apply(&Command::absolute(255, 0, 0));
    for _ in 0..65_538 {
        state.apply(&Command::relative(i16::MAX, 0, 0));
    }

    let delta = (0..65_538).fold(0i32, |acc, _| acc.wrapping_add(i16::MAX.into()));
    let effective = state.effective().unwrap();
    assert_eq!(effective.r, 255i32.wrapping_add(delta));
}
