//! Layout-switch side feature: CapsLock cycles the keyboard layout.
//!
//! Entirely outside the lock protocol. The hook thread offers this cycler
//! events the suppression gate already decided to forward; a CapsLock tap is
//! swallowed and turned into a request to move to the next installed layout,
//! posted to the foreground window. Everything else passes through untouched.

use windows::Win32::Foundation::{LPARAM, WPARAM};
use windows::Win32::UI::WindowsAndMessaging::{
    GetForegroundWindow, PostMessageW, WM_INPUTLANGCHANGEREQUEST,
};

use crate::event::{ButtonId, RawInput};

/// `INPUTLANGCHANGE_FORWARD`: pick the next layout in the system list.
const NEXT_LAYOUT: usize = 0x0002;

#[derive(Debug, Default)]
pub struct LayoutCycler;

impl LayoutCycler {
    pub fn new() -> Self {
        Self
    }

    /// Eats forwarded CapsLock transitions; a press also requests the layout
    /// change. Returns `true` when the event must be suppressed.
    pub fn intercept(&mut self, input: &RawInput) -> bool {
        let &RawInput::Key { vk, released, .. } = input else {
            return false;
        };
        if ButtonId::from_key(vk) != Some(ButtonId::CAPS_LOCK) {
            return false;
        }
        if !released {
            self.cycle();
        }
        true
    }

    fn cycle(&self) {
        let target = unsafe { GetForegroundWindow() };
        if target.is_invalid() {
            return;
        }
        let posted = unsafe {
            PostMessageW(
                Some(target),
                WM_INPUTLANGCHANGEREQUEST,
                WPARAM(NEXT_LAYOUT),
                LPARAM(0),
            )
        };
        match posted {
            Ok(()) => {
                #[cfg(feature = "log")]
                log::info!("requested the next keyboard layout");
            }
            Err(_e) => {
                #[cfg(feature = "log")]
                log::warn!("failed to request a keyboard layout change: {}", _e);
            }
        }
    }
}
