use std::{cell::RefCell, thread, time::Instant};

use windows::Win32::{
    Foundation::{LPARAM, LRESULT, WPARAM},
    System::LibraryLoader::GetModuleHandleW,
    System::Threading::GetCurrentThreadId,
    UI::WindowsAndMessaging::{
        CallNextHookEx, DispatchMessageW, GetMessageW, HC_ACTION, HHOOK, HOOKPROC,
        KBDLLHOOKSTRUCT, LLKHF_INJECTED, LLMHF_INJECTED, MSG, MSLLHOOKSTRUCT, PostThreadMessageW,
        SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, WH_KEYBOARD_LL, WH_MOUSE_LL,
        WINDOWS_HOOK_ID, WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP,
        WM_QUIT, WM_RBUTTONDOWN, WM_RBUTTONUP, WM_SYSKEYUP, WM_XBUTTONDOWN, WM_XBUTTONUP,
    },
};

use crate::{
    Config,
    engine::{Decision, LockEngine},
    error::{Error, HookKind, Result},
    event::{MouseButton, RawInput},
    injector::SendInputInjector,
    layout::LayoutCycler,
};

thread_local! {
    static RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

struct Runtime {
    engine: LockEngine,
    injector: SendInputInjector,
    layout: Option<LayoutCycler>,
}

/// The running hook thread: both hooks installed, pump spinning.
pub struct HookTask {
    thread: thread::JoinHandle<()>,
    thread_id: u32,
}

impl HookTask {
    /// Id of the pump thread, usable with [`request_stop`] from contexts (such
    /// as console control handlers) that cannot hold a reference to the task.
    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    /// Asks the pump to exit; the hooks are uninstalled as the thread unwinds.
    pub fn stop(&self) {
        request_stop(self.thread_id);
    }

    /// Waits for the pump thread to finish.
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}

/// Posts `WM_QUIT` to the pump thread identified by `thread_id`.
pub fn request_stop(thread_id: u32) {
    if let Err(_e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
        #[cfg(feature = "log")]
        log::warn!("failed to ask the hook thread to stop: {}", _e);
    }
}

pub(crate) fn start_hooks(config: Config) -> Result<HookTask> {
    let (result_tx, result_rx) = oneshot::channel::<Result<u32>>();

    let thread = thread::spawn(move || {
        RUNTIME.with(|r| {
            *r.borrow_mut() = Some(Runtime {
                engine: LockEngine::new(config.lock_enabled, Instant::now()),
                injector: SendInputInjector,
                layout: config.layout_switch.then(LayoutCycler::new),
            });
        });

        let keyboard = match install_hook(
            WH_KEYBOARD_LL,
            Some(low_level_keyboard_proc),
            HookKind::Keyboard,
        ) {
            Ok(guard) => guard,
            Err(e) => {
                let _ = result_tx.send(Err(e));
                return;
            }
        };
        let _mouse = match install_hook(WH_MOUSE_LL, Some(low_level_mouse_proc), HookKind::Mouse) {
            Ok(guard) => guard,
            Err(e) => {
                // No partial-hook operation: release the keyboard hook before
                // reporting the failure.
                drop(keyboard);
                let _ = result_tx.send(Err(e));
                return;
            }
        };
        let _keyboard = keyboard;

        let _ = result_tx.send(Ok(unsafe { GetCurrentThreadId() }));

        let mut msg = MSG::default();
        unsafe {
            while GetMessageW(&mut msg, None, 0, 0).into() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    });

    match result_rx.recv() {
        Ok(Ok(thread_id)) => Ok(HookTask { thread, thread_id }),
        Ok(Err(e)) => {
            let _ = thread.join();
            Err(e)
        }
        Err(_) => Err(Error::HookThreadCrashed),
    }
}

/// An installed hook that uninstalls itself when dropped, whatever the exit
/// path. Uninstall failure is logged and otherwise ignored: the process is
/// already going away.
struct InstalledHook {
    kind: HookKind,
    hook: HHOOK,
}

impl Drop for InstalledHook {
    fn drop(&mut self) {
        match unsafe { UnhookWindowsHookEx(self.hook) } {
            Ok(()) => {
                #[cfg(feature = "log")]
                log::info!("uninstalled the {} hook", self.kind);
            }
            Err(_e) => {
                #[cfg(feature = "log")]
                log::error!("failed to uninstall the {} hook: {}", self.kind, _e);
            }
        }
    }
}

fn install_hook(id: WINDOWS_HOOK_ID, f: HOOKPROC, kind: HookKind) -> Result<InstalledHook> {
    let hook = unsafe {
        SetWindowsHookExW(id, f, Some(GetModuleHandleW(None).unwrap().into()), 0)
    }
    .map_err(|e| Error::HookInstallFailed {
        kind,
        source: e.into(),
    })?;

    #[cfg(feature = "log")]
    log::info!("installed the {} hook", kind);

    Ok(InstalledHook { kind, hook })
}

/// Runs one raw event through the engine (and the layout side feature) on the
/// hook thread's own state.
fn dispatch(input: &RawInput) -> Decision {
    RUNTIME.with(|r| {
        let mut runtime = r.borrow_mut();
        let Some(runtime) = runtime.as_mut() else {
            return Decision::Forward;
        };
        let decision = runtime
            .engine
            .handle(input, Instant::now(), &mut runtime.injector);
        // The layout feature only ever eats events the gate would forward, so
        // the lock always wins.
        if decision == Decision::Forward
            && let Some(layout) = runtime.layout.as_mut()
            && layout.intercept(input)
        {
            return Decision::Suppress;
        }
        decision
    })
}

unsafe extern "system" fn low_level_keyboard_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code == HC_ACTION as i32 {
        let kbd = unsafe { *(l_param.0 as *const KBDLLHOOKSTRUCT) };
        let input = RawInput::Key {
            vk: kbd.vkCode,
            released: matches!(w_param.0 as u32, WM_KEYUP | WM_SYSKEYUP),
            injected: kbd.flags.contains(LLKHF_INJECTED),
        };
        if dispatch(&input) == Decision::Suppress {
            return LRESULT(1);
        }
    }

    unsafe { CallNextHookEx(None, n_code, w_param, l_param) }
}

unsafe extern "system" fn low_level_mouse_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code == HC_ACTION as i32 {
        let mouse = unsafe { *(l_param.0 as *const MSLLHOOKSTRUCT) };
        let injected = mouse.flags & LLMHF_INJECTED != 0;
        let input = match w_param.0 as u32 {
            WM_LBUTTONDOWN | WM_LBUTTONUP => RawInput::Button {
                button: MouseButton::Left,
                released: w_param.0 as u32 == WM_LBUTTONUP,
                injected,
            },
            WM_RBUTTONDOWN | WM_RBUTTONUP => RawInput::Button {
                button: MouseButton::Right,
                released: w_param.0 as u32 == WM_RBUTTONUP,
                injected,
            },
            WM_MBUTTONDOWN | WM_MBUTTONUP => RawInput::Button {
                button: MouseButton::Middle,
                released: w_param.0 as u32 == WM_MBUTTONUP,
                injected,
            },
            WM_XBUTTONDOWN | WM_XBUTTONUP => RawInput::Button {
                // The extra button index travels in the high word.
                button: MouseButton::Extra(((mouse.mouseData >> 16) & 0xFFFF) as u16),
                released: w_param.0 as u32 == WM_XBUTTONUP,
                injected,
            },
            _ => RawInput::Pointer { injected },
        };
        if dispatch(&input) == Decision::Suppress {
            return LRESULT(1);
        }
    }

    unsafe { CallNextHookEx(None, n_code, w_param, l_param) }
}
