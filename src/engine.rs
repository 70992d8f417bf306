//! The lock state machine and its stuck-press recovery wheel.
//!
//! One [`LockEngine`] instance owns all mutable state: a 256-slot button
//! table, the pressed-button count, the current [`LockPhase`] and the timing
//! wheel. It is driven through [`LockEngine::handle`] by whatever delivers raw
//! events (the Windows hook thread in production, a plain loop in tests) and
//! returns a per-event [`Decision`]. Corrective releases and block-flag
//! toggles are requested through the [`Injector`] passed alongside each event.
//!
//! The protocol: in [`LockPhase::Unlocked`] everything is forwarded until
//! Escape+LeftControl (left Shift/Alt/Win up) or F12+RightControl (right
//! Shift/Alt/Win up) is held. From that point all input is swallowed until the
//! four combo buttons LeftControl, RightControl, F12 and Escape are held
//! together and then all buttons are released.
//!
//! A low-level hook can observe a press whose release never arrives (the
//! release was consumed elsewhere, or focus moved mid-press). Left alone such
//! a press would pin the pressed count above zero and wedge the machine in
//! [`LockPhase::WaitAllReleased`] forever. The timing wheel bounds that
//! staleness: every non-injected keyboard event advances a 127-slot wheel, and
//! any press whose recorded slot the wheel sweeps past is force-released, both
//! internally and at the OS level through the injector.

use std::time::{Duration, Instant};

use crate::event::{ButtonId, Classified, RawInput, classify};
use crate::injector::Injector;

/// Slots on the timing wheel; tick values live in `1..=WHEEL_SLOTS`.
const WHEEL_SLOTS: u8 = 127;

/// How long a press may go without its release before it is reclaimed.
pub const STUCK_PRESS_TIMEOUT: Duration = Duration::from_millis(15_000);

const TICK_MILLIS: u64 = STUCK_PRESS_TIMEOUT.as_millis() as u64 / WHEEL_SLOTS as u64;

/// Width of one wheel slot (the stuck-press timeout split across the wheel).
pub const TICK_DURATION: Duration = Duration::from_millis(TICK_MILLIS);

/// The four buttons that must be held together to commit an unlock.
pub const UNLOCK_COMBO: [ButtonId; 4] = [
    ButtonId::LEFT_CONTROL,
    ButtonId::RIGHT_CONTROL,
    ButtonId::F12,
    ButtonId::ESCAPE,
];

/// Per-event verdict returned to the hook procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Hand the event to the next hook in the chain.
    Forward,
    /// Swallow the event; no application sees it.
    Suppress,
}

/// Phase of the lock protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPhase {
    /// Input flows freely; the trigger predicate is evaluated on every press.
    Unlocked,
    /// Locked, waiting for the pressed count to reach zero.
    WaitAllReleased,
    /// Locked with nothing held; waiting for the unlock combo.
    WaitUnlockCombo,
    /// The combo was held together; waiting for it to be released.
    UnlockCommitted,
}

/// One slot of the button table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ButtonState {
    pressed: bool,
    /// Wheel slot current at the time of the press; 0 while released.
    last_tick: u8,
    /// The press was observed while a locked phase was active (or was itself
    /// the lock trigger): applications never saw it, so they must not see the
    /// matching release either.
    locked_press: bool,
}

/// Process-wide lock state, preallocated at startup.
pub struct LockEngine {
    buttons: [ButtonState; 256],
    pressed_count: usize,
    phase: LockPhase,
    current_tick: u8,
    window_start: Instant,
    lock_enabled: bool,
}

impl LockEngine {
    /// A fresh engine in [`LockPhase::Unlocked`], with the wheel anchored at
    /// `now`. With `lock_enabled` false the trigger never fires: events are
    /// tracked and forwarded but nothing is ever suppressed.
    pub fn new(lock_enabled: bool, now: Instant) -> Self {
        Self {
            buttons: [ButtonState::default(); 256],
            pressed_count: 0,
            phase: LockPhase::Unlocked,
            current_tick: 1,
            window_start: now,
            lock_enabled,
        }
    }

    pub fn phase(&self) -> LockPhase {
        self.phase
    }

    /// Number of table entries currently marked pressed.
    pub fn pressed_count(&self) -> usize {
        self.pressed_count
    }

    /// `true` in every phase except [`LockPhase::Unlocked`].
    pub fn is_locked(&self) -> bool {
        self.phase != LockPhase::Unlocked
    }

    /// Handles one raw event and decides its fate.
    ///
    /// `now` is only compared against earlier values of itself, so tests can
    /// fabricate any monotonic series of instants.
    pub fn handle(
        &mut self,
        input: &RawInput,
        now: Instant,
        injector: &mut dyn Injector,
    ) -> Decision {
        // The wheel turns on keyboard traffic only, and before the event
        // itself is evaluated, so a press lands on the freshest tick.
        if let RawInput::Key {
            injected: false, ..
        } = *input
        {
            self.reclaim_stuck(now, injector);
        }

        match classify(input) {
            Classified::Injected => Decision::Forward,
            Classified::Unhandled => {
                if self.is_locked() {
                    Decision::Suppress
                } else {
                    Decision::Forward
                }
            }
            Classified::Button { id, released } => self.transition(id, released, injector),
        }
    }

    /// Bookkeeping plus the phase transition for one tracked button event.
    fn transition(
        &mut self,
        id: ButtonId,
        released: bool,
        injector: &mut dyn Injector,
    ) -> Decision {
        let prior = self.buttons[id.index()];
        if prior.pressed {
            self.pressed_count -= 1;
        }
        self.buttons[id.index()] = if released {
            ButtonState::default()
        } else {
            self.pressed_count += 1;
            ButtonState {
                pressed: true,
                last_tick: self.current_tick,
                locked_press: self.is_locked(),
            }
        };

        match self.phase {
            LockPhase::Unlocked => {
                if self.lock_enabled && !released && self.trigger_held() {
                    self.buttons[id.index()].locked_press = true;
                    self.phase = if self.stray_held() {
                        #[cfg(feature = "log")]
                        log::info!("input locked, waiting for all buttons to be released");
                        LockPhase::WaitAllReleased
                    } else {
                        #[cfg(feature = "log")]
                        log::info!("input locked, waiting for the unlock combo");
                        LockPhase::WaitUnlockCombo
                    };
                    injector.set_block_input(true);
                    Decision::Suppress
                } else {
                    Decision::Forward
                }
            }
            LockPhase::WaitAllReleased => {
                if self.pressed_count == 0 {
                    self.phase = LockPhase::WaitUnlockCombo;
                    #[cfg(feature = "log")]
                    log::info!("all buttons released, waiting for the unlock combo");
                }
                // A press already in flight before the lock was forwarded, so
                // its release must reach applications too.
                if released && prior.pressed && !prior.locked_press {
                    Decision::Forward
                } else {
                    Decision::Suppress
                }
            }
            LockPhase::WaitUnlockCombo | LockPhase::UnlockCommitted => {
                if !released && !UNLOCK_COMBO.contains(&id) {
                    self.phase = LockPhase::WaitAllReleased;
                    #[cfg(feature = "log")]
                    log::info!("stray button pressed, waiting for all buttons to be released");
                } else if self.phase == LockPhase::WaitUnlockCombo
                    && self.pressed_count == UNLOCK_COMBO.len()
                    && self.combo_held()
                {
                    self.phase = LockPhase::UnlockCommitted;
                    #[cfg(feature = "log")]
                    log::info!("unlock combo held, waiting for it to be released");
                } else if self.phase == LockPhase::UnlockCommitted && self.pressed_count == 0 {
                    self.phase = LockPhase::Unlocked;
                    injector.set_block_input(false);
                    #[cfg(feature = "log")]
                    log::info!("all buttons released, input unlocked");
                }
                Decision::Suppress
            }
        }
    }

    fn trigger_held(&self) -> bool {
        let held = |id: ButtonId| self.buttons[id.index()].pressed;
        (held(ButtonId::ESCAPE)
            && held(ButtonId::LEFT_CONTROL)
            && !held(ButtonId::LEFT_SHIFT)
            && !held(ButtonId::LEFT_ALT)
            && !held(ButtonId::LEFT_WIN))
            || (held(ButtonId::F12)
                && held(ButtonId::RIGHT_CONTROL)
                && !held(ButtonId::RIGHT_SHIFT)
                && !held(ButtonId::RIGHT_ALT)
                && !held(ButtonId::RIGHT_WIN))
    }

    /// Any held button outside the unlock combo.
    fn stray_held(&self) -> bool {
        self.buttons.iter().enumerate().any(|(code, state)| {
            state.pressed && !UNLOCK_COMBO.contains(&ButtonId::from_code(code as u8))
        })
    }

    fn combo_held(&self) -> bool {
        UNLOCK_COMBO
            .iter()
            .all(|id| self.buttons[id.index()].pressed)
    }

    /// Advances the wheel to `now` and force-releases presses whose slot was
    /// swept.
    fn reclaim_stuck(&mut self, now: Instant, injector: &mut dyn Injector) {
        let elapsed = now.saturating_duration_since(self.window_start);
        let ticks = elapsed.as_millis() as u64 / TICK_MILLIS;
        if ticks == 0 {
            return;
        }
        if ticks > u64::from(WHEEL_SLOTS) {
            // Fully lapped (the process was suspended or input was idle past
            // the whole window): every recorded press is stale.
            self.current_tick = 1;
            self.window_start = now;
            self.force_release_where(injector, |_| true);
        } else {
            let from = self.current_tick;
            let span = ticks as u8;
            self.current_tick = (from - 1 + span) % WHEEL_SLOTS + 1;
            // Carry the sub-tick remainder over to the next advance.
            self.window_start += Duration::from_millis(ticks * TICK_MILLIS);
            self.force_release_where(injector, |mark| tick_swept(from, span, mark));
        }
    }

    /// Force-releases every pressed button whose `last_tick` satisfies
    /// `stale`, re-entering the full event path exactly as a real release
    /// would, after asking the injector for the matching OS-level release.
    fn force_release_where(&mut self, injector: &mut dyn Injector, stale: impl Fn(u8) -> bool) {
        let mut stuck = [0u8; 256];
        let mut count = 0;
        for (code, state) in self.buttons.iter().enumerate() {
            if state.pressed && stale(state.last_tick) {
                stuck[count] = code as u8;
                count += 1;
            }
        }
        for &code in &stuck[..count] {
            let id = ButtonId::from_code(code);
            #[cfg(feature = "log")]
            log::warn!(
                "no release seen for button {:#04x} within the stuck-press window, reclaiming it",
                code
            );
            injector.synthesize_release(id);
            let _ = self.transition(id, true, injector);
        }
    }
}

/// Whether slot `mark` lies in the range `(from, from + span]` modulo the
/// wheel size, i.e. among the slots the wheel just swept past. A press
/// recorded in the current slot (`mark == from`) is only swept by a full
/// 127-tick lap.
fn tick_swept(from: u8, span: u8, mark: u8) -> bool {
    let wheel = u16::from(WHEEL_SLOTS);
    (u16::from(mark) + wheel - 1 - u16::from(from)) % wheel < u16::from(span)
}
