use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to install the {kind} hook")]
    HookInstallFailed {
        kind: HookKind,
        source: std::io::Error,
    },
    #[error("the hook thread terminated unexpectedly")]
    HookThreadCrashed,
}

/// Which of the two low-level hooks an operation concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Keyboard,
    Mouse,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HookKind::Keyboard => "keyboard",
            HookKind::Mouse => "mouse",
        };
        write!(f, "{}", s)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
