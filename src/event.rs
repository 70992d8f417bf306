//! Raw input events and their classification into button-table slots.

/// A raw event as delivered by the low-level hooks, stripped down to what the
/// suppression gate consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    /// A keyboard key transition.
    Key {
        /// Virtual-key code from the hook payload.
        vk: u32,
        /// `true` for key-up, `false` for key-down.
        released: bool,
        /// The event was synthesized by `SendInput` (possibly our own).
        injected: bool,
    },
    /// A mouse button transition.
    Button {
        button: MouseButton,
        released: bool,
        injected: bool,
    },
    /// Any other pointer activity: movement, wheel.
    Pointer { injected: bool },
}

impl RawInput {
    /// `true` for events synthesized by `SendInput` rather than hardware.
    pub fn is_injected(&self) -> bool {
        match *self {
            RawInput::Key { injected, .. }
            | RawInput::Button { injected, .. }
            | RawInput::Pointer { injected } => injected,
        }
    }
}

/// Mouse button identifier used in [`RawInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    /// Extra button, carrying the raw 1-based index from the event payload.
    /// Only indices 1 and 2 have a table slot; the rest are pass-through.
    Extra(u16),
}

/// Canonical identity of one slot in the 256-entry button table.
///
/// Keyboard keys use their virtual-key code directly. Mouse buttons are folded
/// into the codes a low-level *keyboard* hook never delivers (the VK space
/// reserves 0x01/0x02/0x04/0x05/0x06 for exactly these buttons), so keyboard
/// and mouse share one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonId(u8);

impl ButtonId {
    pub const MOUSE_LEFT: Self = Self(0x01);
    pub const MOUSE_RIGHT: Self = Self(0x02);
    pub const MOUSE_MIDDLE: Self = Self(0x04);
    pub const MOUSE_X1: Self = Self(0x05);
    pub const MOUSE_X2: Self = Self(0x06);

    pub const CAPS_LOCK: Self = Self(0x14);
    pub const ESCAPE: Self = Self(0x1B);
    pub const LEFT_WIN: Self = Self(0x5B);
    pub const RIGHT_WIN: Self = Self(0x5C);
    pub const F12: Self = Self(0x7B);
    pub const LEFT_SHIFT: Self = Self(0xA0);
    pub const RIGHT_SHIFT: Self = Self(0xA1);
    pub const LEFT_CONTROL: Self = Self(0xA2);
    pub const RIGHT_CONTROL: Self = Self(0xA3);
    pub const LEFT_ALT: Self = Self(0xA4);
    pub const RIGHT_ALT: Self = Self(0xA5);

    /// Wraps a raw table code.
    pub const fn from_code(code: u8) -> Self {
        Self(code)
    }

    /// Slot for a virtual-key code, or `None` when the code falls outside the
    /// table.
    pub fn from_key(vk: u32) -> Option<Self> {
        u8::try_from(vk).ok().map(Self)
    }

    /// Slot for a mouse button, or `None` for an extra button the table does
    /// not cover.
    pub fn from_mouse(button: MouseButton) -> Option<Self> {
        match button {
            MouseButton::Left => Some(Self::MOUSE_LEFT),
            MouseButton::Right => Some(Self::MOUSE_RIGHT),
            MouseButton::Middle => Some(Self::MOUSE_MIDDLE),
            MouseButton::Extra(1) => Some(Self::MOUSE_X1),
            MouseButton::Extra(2) => Some(Self::MOUSE_X2),
            MouseButton::Extra(_) => None,
        }
    }

    /// The mouse button occupying this slot, if it is one of the mouse slots.
    pub fn mouse_button(self) -> Option<MouseButton> {
        match self {
            Self::MOUSE_LEFT => Some(MouseButton::Left),
            Self::MOUSE_RIGHT => Some(MouseButton::Right),
            Self::MOUSE_MIDDLE => Some(MouseButton::Middle),
            Self::MOUSE_X1 => Some(MouseButton::Extra(1)),
            Self::MOUSE_X2 => Some(MouseButton::Extra(2)),
            _ => None,
        }
    }

    /// The raw table code.
    pub const fn code(self) -> u8 {
        self.0
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Outcome of mapping a raw event onto the button table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Classified {
    /// Synthesized by this process; forwarded untouched and excluded from all
    /// bookkeeping, so our own corrective releases cannot re-enter the state
    /// machine.
    Injected,
    /// No table slot (vk out of range, extra button index out of range,
    /// pointer movement); gated on the current lock state only.
    Unhandled,
    /// A tracked button transition.
    Button { id: ButtonId, released: bool },
}

pub(crate) fn classify(input: &RawInput) -> Classified {
    if input.is_injected() {
        return Classified::Injected;
    }
    let slot = match *input {
        RawInput::Key { vk, released, .. } => (ButtonId::from_key(vk), released),
        RawInput::Button {
            button, released, ..
        } => (ButtonId::from_mouse(button), released),
        RawInput::Pointer { .. } => (None, false),
    };
    match slot {
        (Some(id), released) => Classified::Button { id, released },
        (None, _) => Classified::Unhandled,
    }
}
