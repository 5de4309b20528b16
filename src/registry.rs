use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe, Location};

use parking_lot::Mutex;

use crate::error::Error;
use crate::sink::CleanupSink;

/// Source location of a registration call site.
///
/// Carried alongside each pending cleanup and used only when reporting a
/// cleanup that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    file: &'static str,
    line: u32,
}

impl Origin {
    /// Capture the call site of the nearest `#[track_caller]` frame
    #[track_caller]
    pub(crate) fn caller() -> Self {
        let location = Location::caller();
        Origin {
            file: location.file(),
            line: location.line(),
        }
    }

    pub fn file(&self) -> &'static str {
        self.file
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One pending cleanup. Its arguments are whatever the closure captured at
/// registration time; the registry never looks inside the action.
pub(crate) struct CleanupEntry {
    action: Box<dyn FnOnce()>,
    origin: Origin,
}

impl CleanupEntry {
    pub(crate) fn new(action: Box<dyn FnOnce()>, origin: Origin) -> Self {
        CleanupEntry { action, origin }
    }
}

/// Entry list of one scope invocation. Open accepts new entries and flips
/// to Drained exactly once.
enum Chain {
    Open(Vec<CleanupEntry>),
    Drained,
}

/// Ordered registry of the cleanups pending in one scope invocation
pub(crate) struct Registry {
    chain: Mutex<Chain>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry {
            chain: Mutex::new(Chain::Open(Vec::new())),
        }
    }

    /// Queue one entry, keeping insertion order.
    /// Fails once the owning scope has started draining.
    pub(crate) fn append(&self, entry: CleanupEntry) -> Result<(), Error> {
        match &mut *self.chain.lock() {
            Chain::Open(entries) => {
                entries.push(entry);
                Ok(())
            }
            Chain::Drained => Err(Error::RegistryClosed),
        }
    }

    /// Run every pending entry, last registered first. Calling this on an
    /// already drained registry does nothing.
    pub(crate) fn drain(&self, sink: &dyn CleanupSink) {
        // Flip to Drained before running anything, so a cleanup that tries
        // to register more work gets RegistryClosed instead of queueing an
        // entry that would never run.
        let chain = std::mem::replace(&mut *self.chain.lock(), Chain::Drained);
        let entries = match chain {
            Chain::Open(entries) => entries,
            Chain::Drained => return,
        };
        for entry in entries.into_iter().rev() {
            // A failing action must not stop the remaining cleanups and
            // must never reach the scope's caller. Report it and move on.
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry.action)) {
                sink.report(entry.origin, &panic_message(payload.as_ref()));
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
