//! Synthetic input: corrective releases and the global block-input flag.
//!
//! The engine never touches the OS directly; it requests these two effects
//! through the [`Injector`] trait so tests can substitute a recording
//! implementation.

use crate::event::ButtonId;

/// Effects the lock engine requests from the outside world.
pub trait Injector {
    /// Emit an OS-level release for `button`, so that applications which saw
    /// its press also see a release. The emitted event comes back through the
    /// hooks flagged as injected and is not reprocessed.
    fn synthesize_release(&mut self, button: ButtonId);

    /// Request that the OS block (or stop blocking) all hardware input, as a
    /// second line of defense behind per-event suppression.
    fn set_block_input(&mut self, blocked: bool);
}

#[cfg(target_os = "windows")]
pub use self::windows_impl::SendInputInjector;

#[cfg(target_os = "windows")]
mod windows_impl {
    use windows::Win32::UI::Input::KeyboardAndMouse::{
        BlockInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYEVENTF_KEYUP,
        MOUSE_EVENT_FLAGS, MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_RIGHTUP,
        MOUSEEVENTF_XUP, MOUSEINPUT, SendInput, VIRTUAL_KEY,
    };

    use crate::event::{ButtonId, MouseButton};

    use super::Injector;

    /// [`Injector`] backed by `SendInput` and `BlockInput`.
    ///
    /// Failures are logged and swallowed: by the time a corrective release
    /// fails there is nothing better to do, and the per-event suppression
    /// path does not depend on either call succeeding.
    #[derive(Debug, Default)]
    pub struct SendInputInjector;

    impl Injector for SendInputInjector {
        fn synthesize_release(&mut self, button: ButtonId) {
            let input = match button.mouse_button() {
                Some(MouseButton::Left) => mouse_release(MOUSEEVENTF_LEFTUP, 0),
                Some(MouseButton::Right) => mouse_release(MOUSEEVENTF_RIGHTUP, 0),
                Some(MouseButton::Middle) => mouse_release(MOUSEEVENTF_MIDDLEUP, 0),
                Some(MouseButton::Extra(index)) => mouse_release(MOUSEEVENTF_XUP, index),
                None => key_release(button.code()),
            };
            if let Err(_e) = send_input(&[input]) {
                #[cfg(feature = "log")]
                log::error!(
                    "failed to synthesize a release for button {:#04x}: {}",
                    button.code(),
                    _e
                );
            }
        }

        fn set_block_input(&mut self, blocked: bool) {
            if let Err(_e) = unsafe { BlockInput(blocked) } {
                #[cfg(feature = "log")]
                log::warn!("BlockInput({}) failed: {}", blocked, _e);
            } else {
                #[cfg(feature = "log")]
                log::debug!("block input: {}", blocked);
            }
        }
    }

    fn key_release(vk: u8) -> INPUT {
        INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(vk.into()),
                    dwFlags: KEYEVENTF_KEYUP,
                    ..Default::default()
                },
            },
        }
    }

    fn mouse_release(flags: MOUSE_EVENT_FLAGS, data: u16) -> INPUT {
        INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    mouseData: data as _,
                    dwFlags: flags,
                    ..Default::default()
                },
            },
        }
    }

    fn send_input(inputs: &[INPUT]) -> std::io::Result<()> {
        let result = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };

        if result as usize != inputs.len() {
            Err(std::io::Error::last_os_error())
        } else {
            #[cfg(feature = "log")]
            log::trace!("SendInput: {} event(s)", inputs.len());
            Ok(())
        }
    }
}
