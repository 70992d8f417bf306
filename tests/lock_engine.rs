use std::time::Instant;

use input_lock::{
    ButtonId, Decision, Injector, LockEngine, LockPhase, MouseButton, RawInput, TICK_DURATION,
};

#[derive(Default)]
struct Recorder {
    releases: Vec<ButtonId>,
    block_flags: Vec<bool>,
}

impl Injector for Recorder {
    fn synthesize_release(&mut self, button: ButtonId) {
        self.releases.push(button);
    }

    fn set_block_input(&mut self, blocked: bool) {
        self.block_flags.push(blocked);
    }
}

struct Harness {
    engine: LockEngine,
    fx: Recorder,
    now: Instant,
}

impl Harness {
    fn new() -> Self {
        Self::with_lock_enabled(true)
    }

    fn with_lock_enabled(lock_enabled: bool) -> Self {
        let now = Instant::now();
        Self {
            engine: LockEngine::new(lock_enabled, now),
            fx: Recorder::default(),
            now,
        }
    }

    fn feed(&mut self, input: RawInput) -> Decision {
        self.engine.handle(&input, self.now, &mut self.fx)
    }

    fn press(&mut self, id: ButtonId) -> Decision {
        self.feed(key(id, false))
    }

    fn release(&mut self, id: ButtonId) -> Decision {
        self.feed(key(id, true))
    }

    fn advance(&mut self, ticks: u32) {
        self.now += TICK_DURATION * ticks;
    }
}

fn key(id: ButtonId, released: bool) -> RawInput {
    RawInput::Key {
        vk: id.code() as u32,
        released,
        injected: false,
    }
}

fn mouse(button: MouseButton, released: bool) -> RawInput {
    RawInput::Button {
        button,
        released,
        injected: false,
    }
}

const KEY_A: ButtonId = ButtonId::from_code(0x41);
const KEY_B: ButtonId = ButtonId::from_code(0x42);
const KEY_C: ButtonId = ButtonId::from_code(0x43);

#[test]
fn unlocked_input_is_counted_and_forwarded() {
    let mut h = Harness::new();

    assert_eq!(h.press(KEY_A), Decision::Forward);
    assert_eq!(h.press(KEY_B), Decision::Forward);
    assert_eq!(h.feed(mouse(MouseButton::Left, false)), Decision::Forward);
    assert_eq!(h.engine.pressed_count(), 3);

    assert_eq!(h.release(KEY_A), Decision::Forward);
    assert_eq!(h.feed(mouse(MouseButton::Left, true)), Decision::Forward);
    assert_eq!(h.engine.pressed_count(), 1);

    assert_eq!(h.engine.phase(), LockPhase::Unlocked);
    assert!(h.fx.block_flags.is_empty());
    assert!(h.fx.releases.is_empty());
}

#[test]
fn trigger_without_stray_keys_goes_straight_to_wait_unlock_combo() {
    let mut h = Harness::new();

    assert_eq!(h.press(ButtonId::ESCAPE), Decision::Forward);
    assert_eq!(h.press(ButtonId::LEFT_CONTROL), Decision::Suppress);

    assert_eq!(h.engine.phase(), LockPhase::WaitUnlockCombo);
    assert_eq!(h.engine.pressed_count(), 2);
    assert_eq!(h.fx.block_flags, vec![true]);
}

#[test]
fn trigger_with_stray_key_waits_for_all_released() {
    let mut h = Harness::new();

    assert_eq!(h.press(KEY_A), Decision::Forward);
    assert_eq!(h.press(ButtonId::ESCAPE), Decision::Forward);
    assert_eq!(h.press(ButtonId::LEFT_CONTROL), Decision::Suppress);

    assert_eq!(h.engine.phase(), LockPhase::WaitAllReleased);
    assert_eq!(h.fx.block_flags, vec![true]);
}

#[test]
fn right_hand_trigger_locks_too() {
    let mut h = Harness::new();

    assert_eq!(h.press(ButtonId::F12), Decision::Forward);
    assert_eq!(h.press(ButtonId::RIGHT_CONTROL), Decision::Suppress);

    assert_eq!(h.engine.phase(), LockPhase::WaitUnlockCombo);
}

#[test]
fn held_modifier_vetoes_the_trigger() {
    let mut h = Harness::new();

    h.press(ButtonId::LEFT_SHIFT);
    assert_eq!(h.press(ButtonId::ESCAPE), Decision::Forward);
    assert_eq!(h.press(ButtonId::LEFT_CONTROL), Decision::Forward);
    assert_eq!(h.engine.phase(), LockPhase::Unlocked);

    let mut h = Harness::new();
    h.press(ButtonId::RIGHT_ALT);
    h.press(ButtonId::F12);
    assert_eq!(h.press(ButtonId::RIGHT_CONTROL), Decision::Forward);
    assert_eq!(h.engine.phase(), LockPhase::Unlocked);
}

#[test]
fn pre_lock_releases_are_forwarded_while_draining() {
    let mut h = Harness::new();

    h.press(KEY_A);
    h.press(ButtonId::ESCAPE);
    h.press(ButtonId::LEFT_CONTROL);
    assert_eq!(h.engine.phase(), LockPhase::WaitAllReleased);

    // Applications saw the A and Escape presses, so they get the releases;
    // the trigger press itself was swallowed, so its release is too.
    assert_eq!(h.release(KEY_A), Decision::Forward);
    assert_eq!(h.release(ButtonId::ESCAPE), Decision::Forward);
    assert_eq!(h.engine.phase(), LockPhase::WaitAllReleased);
    assert_eq!(h.release(ButtonId::LEFT_CONTROL), Decision::Suppress);

    assert_eq!(h.engine.pressed_count(), 0);
    assert_eq!(h.engine.phase(), LockPhase::WaitUnlockCombo);
}

#[test]
fn locked_presses_and_their_releases_are_suppressed() {
    let mut h = Harness::new();

    h.press(KEY_A);
    h.press(ButtonId::ESCAPE);
    h.press(ButtonId::LEFT_CONTROL);
    assert_eq!(h.engine.phase(), LockPhase::WaitAllReleased);

    assert_eq!(h.press(KEY_B), Decision::Suppress);
    assert_eq!(h.release(KEY_B), Decision::Suppress);
}

#[test]
fn drain_completes_exactly_at_the_zero_crossing_in_any_order() {
    let mut h = Harness::new();

    h.press(KEY_A);
    h.press(KEY_B);
    h.press(ButtonId::ESCAPE);
    h.press(ButtonId::LEFT_CONTROL);
    assert_eq!(h.engine.phase(), LockPhase::WaitAllReleased);

    h.release(ButtonId::LEFT_CONTROL);
    assert_eq!(h.engine.phase(), LockPhase::WaitAllReleased);
    h.release(KEY_B);
    assert_eq!(h.engine.phase(), LockPhase::WaitAllReleased);
    h.release(ButtonId::ESCAPE);
    assert_eq!(h.engine.phase(), LockPhase::WaitAllReleased);
    h.release(KEY_A);
    assert_eq!(h.engine.pressed_count(), 0);
    assert_eq!(h.engine.phase(), LockPhase::WaitUnlockCombo);
}

#[test]
fn stray_press_while_waiting_for_the_combo_regresses() {
    let mut h = Harness::new();

    h.press(ButtonId::ESCAPE);
    h.press(ButtonId::LEFT_CONTROL);
    h.release(ButtonId::ESCAPE);
    h.release(ButtonId::LEFT_CONTROL);
    assert_eq!(h.engine.phase(), LockPhase::WaitUnlockCombo);

    assert_eq!(h.press(KEY_A), Decision::Suppress);
    assert_eq!(h.engine.phase(), LockPhase::WaitAllReleased);

    assert_eq!(h.release(KEY_A), Decision::Suppress);
    assert_eq!(h.engine.phase(), LockPhase::WaitUnlockCombo);
}

#[test]
fn full_lock_unlock_cycle() {
    let mut h = Harness::new();

    assert_eq!(h.press(ButtonId::ESCAPE), Decision::Forward);
    assert_eq!(h.press(ButtonId::LEFT_CONTROL), Decision::Suppress);
    assert_eq!(h.engine.phase(), LockPhase::WaitUnlockCombo);
    assert_eq!(h.engine.pressed_count(), 2);

    assert_eq!(h.press(ButtonId::RIGHT_CONTROL), Decision::Suppress);
    assert_eq!(h.engine.phase(), LockPhase::WaitUnlockCombo);
    assert_eq!(h.press(ButtonId::F12), Decision::Suppress);
    assert_eq!(h.engine.pressed_count(), 4);
    assert_eq!(h.engine.phase(), LockPhase::UnlockCommitted);

    for id in [
        ButtonId::F12,
        ButtonId::ESCAPE,
        ButtonId::RIGHT_CONTROL,
        ButtonId::LEFT_CONTROL,
    ] {
        assert_eq!(h.release(id), Decision::Suppress);
    }

    assert_eq!(h.engine.pressed_count(), 0);
    assert_eq!(h.engine.phase(), LockPhase::Unlocked);
    assert_eq!(h.fx.block_flags, vec![true, false]);

    // Input flows again.
    assert_eq!(h.press(KEY_A), Decision::Forward);
}

#[test]
fn combo_commit_requires_all_four_held() {
    let mut h = Harness::new();

    h.press(ButtonId::F12);
    h.press(ButtonId::RIGHT_CONTROL);
    assert_eq!(h.engine.phase(), LockPhase::WaitUnlockCombo);

    h.press(ButtonId::LEFT_CONTROL);
    assert_eq!(h.engine.pressed_count(), 3);
    assert_eq!(h.engine.phase(), LockPhase::WaitUnlockCombo);

    h.press(ButtonId::ESCAPE);
    assert_eq!(h.engine.pressed_count(), 4);
    assert_eq!(h.engine.phase(), LockPhase::UnlockCommitted);
}

#[test]
fn stuck_press_is_reclaimed_after_the_window_lapses() {
    let mut h = Harness::new();

    h.press(KEY_A);
    assert_eq!(h.engine.pressed_count(), 1);

    h.advance(130);
    assert_eq!(h.press(KEY_B), Decision::Forward);

    assert_eq!(h.fx.releases, vec![KEY_A]);
    assert_eq!(h.engine.pressed_count(), 1);
    assert_eq!(h.engine.phase(), LockPhase::Unlocked);
}

#[test]
fn reclaim_drives_the_state_machine_like_a_real_release() {
    let mut h = Harness::new();

    h.press(KEY_A);
    h.press(ButtonId::ESCAPE);
    h.press(ButtonId::LEFT_CONTROL);
    assert_eq!(h.engine.phase(), LockPhase::WaitAllReleased);

    h.release(ButtonId::ESCAPE);
    h.release(ButtonId::LEFT_CONTROL);
    // A's release never arrives (e.g. the hand lifted mid-transition).
    assert_eq!(h.engine.pressed_count(), 1);

    h.advance(130);
    assert_eq!(h.press(ButtonId::ESCAPE), Decision::Suppress);

    assert_eq!(h.fx.releases, vec![KEY_A]);
    // The reclaim crossed zero and moved the machine on; the Escape press is
    // combo traffic in the new phase.
    assert_eq!(h.engine.phase(), LockPhase::WaitUnlockCombo);
    assert_eq!(h.engine.pressed_count(), 1);
}

#[test]
fn partial_sweep_reclaims_only_the_swept_slots() {
    let mut h = Harness::new();

    h.press(KEY_A);
    h.advance(90);
    assert_eq!(h.press(KEY_B), Decision::Forward);
    // 90 ticks in, A's slot has not been swept yet.
    assert!(h.fx.releases.is_empty());
    assert_eq!(h.engine.pressed_count(), 2);

    h.advance(40);
    assert_eq!(h.press(KEY_C), Decision::Forward);
    // 130 ticks after A's press the wheel has passed its slot again; B's
    // press is only 40 ticks old and survives.
    assert_eq!(h.fx.releases, vec![KEY_A]);
    assert_eq!(h.engine.pressed_count(), 2);
}

#[test]
fn mouse_traffic_does_not_advance_the_wheel() {
    let mut h = Harness::new();

    h.feed(mouse(MouseButton::Left, false));
    h.advance(130);
    assert_eq!(h.feed(mouse(MouseButton::Right, false)), Decision::Forward);
    assert!(h.fx.releases.is_empty());
    assert_eq!(h.engine.pressed_count(), 2);

    // The next keyboard event runs the reclaim and sweeps both mouse presses.
    assert_eq!(h.press(KEY_A), Decision::Forward);
    assert_eq!(h.fx.releases.len(), 2);
    assert!(h.fx.releases.contains(&ButtonId::MOUSE_LEFT));
    assert!(h.fx.releases.contains(&ButtonId::MOUSE_RIGHT));
    assert_eq!(h.engine.pressed_count(), 1);
}

#[test]
fn injected_events_change_nothing() {
    let mut h = Harness::new();

    let injected_press = RawInput::Key {
        vk: KEY_A.code() as u32,
        released: false,
        injected: true,
    };
    assert_eq!(h.feed(injected_press), Decision::Forward);
    assert_eq!(h.engine.pressed_count(), 0);

    h.press(ButtonId::ESCAPE);
    h.press(ButtonId::LEFT_CONTROL);
    assert_eq!(h.engine.phase(), LockPhase::WaitUnlockCombo);

    // Still forwarded while locked, and still invisible to the bookkeeping.
    assert_eq!(h.feed(injected_press), Decision::Forward);
    let injected_mouse = RawInput::Button {
        button: MouseButton::Left,
        released: true,
        injected: true,
    };
    assert_eq!(h.feed(injected_mouse), Decision::Forward);
    assert_eq!(h.engine.pressed_count(), 2);
    assert_eq!(h.engine.phase(), LockPhase::WaitUnlockCombo);
}

#[test]
fn unhandled_events_are_gated_by_the_lock_state() {
    let mut h = Harness::new();

    let pointer = RawInput::Pointer { injected: false };
    let far_extra = mouse(MouseButton::Extra(3), false);
    let out_of_table = RawInput::Key {
        vk: 0x1FF,
        released: false,
        injected: false,
    };

    assert_eq!(h.feed(pointer), Decision::Forward);
    assert_eq!(h.feed(far_extra), Decision::Forward);
    assert_eq!(h.feed(out_of_table), Decision::Forward);
    assert_eq!(h.engine.pressed_count(), 0);

    h.press(ButtonId::ESCAPE);
    h.press(ButtonId::LEFT_CONTROL);
    assert!(h.engine.is_locked());

    assert_eq!(h.feed(pointer), Decision::Suppress);
    assert_eq!(h.feed(far_extra), Decision::Suppress);
    assert_eq!(h.feed(out_of_table), Decision::Suppress);
    assert_eq!(h.engine.pressed_count(), 2);
}

#[test]
fn extra_buttons_one_and_two_are_tracked() {
    let mut h = Harness::new();

    assert_eq!(h.feed(mouse(MouseButton::Extra(1), false)), Decision::Forward);
    assert_eq!(h.feed(mouse(MouseButton::Extra(2), false)), Decision::Forward);
    assert_eq!(h.engine.pressed_count(), 2);

    assert_eq!(h.feed(mouse(MouseButton::Extra(1), true)), Decision::Forward);
    assert_eq!(h.feed(mouse(MouseButton::Extra(2), true)), Decision::Forward);
    assert_eq!(h.engine.pressed_count(), 0);
}

#[test]
fn kill_switch_disables_locking_but_not_accounting() {
    let mut h = Harness::with_lock_enabled(false);

    assert_eq!(h.press(ButtonId::ESCAPE), Decision::Forward);
    assert_eq!(h.press(ButtonId::LEFT_CONTROL), Decision::Forward);

    assert_eq!(h.engine.phase(), LockPhase::Unlocked);
    assert_eq!(h.engine.pressed_count(), 2);
    assert!(h.fx.block_flags.is_empty());

    // The wheel keeps running too.
    h.advance(130);
    h.press(KEY_A);
    assert_eq!(h.fx.releases.len(), 2);
    assert_eq!(h.engine.pressed_count(), 1);
}

#[test]
fn auto_repeat_while_locked_demotes_a_pre_lock_press() {
    let mut h = Harness::new();

    h.press(KEY_A);
    h.press(ButtonId::ESCAPE);
    h.press(ButtonId::LEFT_CONTROL);
    assert_eq!(h.engine.phase(), LockPhase::WaitAllReleased);

    // A keeps auto-repeating under the held finger; the repeat press is
    // swallowed, and the press it re-records is a locked one.
    assert_eq!(h.press(KEY_A), Decision::Suppress);
    assert_eq!(h.engine.pressed_count(), 3);
    assert_eq!(h.release(KEY_A), Decision::Suppress);
}
