//! Locks keyboard and mouse input behind a four-button combo, so the hardware
//! can be wiped down without unplugging it.
//!
//! Holding Escape+LeftControl (with the left Shift/Alt/Win keys up) or
//! F12+RightControl (right Shift/Alt/Win up) locks the machine's input: every
//! keyboard and mouse event is intercepted by low-level hooks and swallowed.
//! Input is released again by holding LeftControl, RightControl, F12 and
//! Escape together and then letting go of all four.
//!
//! [`start`] installs the hooks on a dedicated thread and returns a
//! [`hook::HookTask`] handle. The decision logic itself lives in
//! [`engine::LockEngine`], which has no OS dependencies and can be driven
//! directly; see the tests for deterministic, hook-free use.

pub mod engine;
pub mod error;
pub mod event;
#[cfg(target_os = "windows")]
pub mod hook;
pub mod injector;
#[cfg(target_os = "windows")]
pub mod layout;

pub use engine::{
    Decision, LockEngine, LockPhase, STUCK_PRESS_TIMEOUT, TICK_DURATION, UNLOCK_COMBO,
};
pub use event::{ButtonId, MouseButton, RawInput};
pub use injector::Injector;

/// The two configuration switches. Everything else is fixed.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Locking kill-switch: with `false` the hooks observe and track input but
    /// never suppress anything.
    pub lock_enabled: bool,
    /// Side feature: a CapsLock tap cycles to the next installed keyboard
    /// layout instead of toggling capitals.
    pub layout_switch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_enabled: true,
            layout_switch: false,
        }
    }
}

/// Installs the keyboard and mouse hooks on a dedicated pump thread.
///
/// Fails without side effects if either hook cannot be installed; the hooks
/// are process-global, so run at most one task per process.
#[cfg(target_os = "windows")]
pub fn start(config: Config) -> error::Result<hook::HookTask> {
    hook::start_hooks(config)
}
