//! Synthetic mouse input posted into a window's message queue.
//!
//! Messages go straight to the target window with PostMessage, so the real
//! cursor never moves and the window does not need focus. The platform call
//! sits behind `MessageSink` so sequences can be checked without a window.

use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::InjectionError;
use crate::geometry::Point;

/// One left-button mouse message at a client-space position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowMessage {
    ButtonDown(Point),
    Move(Point),
    ButtonUp(Point),
}

/// Delivers mouse messages to one window.
pub trait MessageSink {
    fn post(&mut self, message: WindowMessage) -> Result<(), InjectionError>;
}

impl<T: MessageSink + ?Sized> MessageSink for Box<T> {
    fn post(&mut self, message: WindowMessage) -> Result<(), InjectionError> {
        (**self).post(message)
    }
}

/// How an injected gesture ended.
#[derive(Clone, Debug, PartialEq)]
pub enum InjectionOutcome {
    /// Below the minimum drag distance; nothing was posted
    Skipped,
    Completed { posted: usize },
    /// A post failed part way; the remaining messages were not sent
    Partial {
        posted: usize,
        expected: usize,
        error: InjectionError,
    },
}

impl InjectionOutcome {
    pub fn is_partial(&self) -> bool {
        matches!(self, InjectionOutcome::Partial { .. })
    }
}

/// Plays click and drag gestures through a sink.
pub struct Injector<S: MessageSink> {
    sink: S,
    click_hold: Duration,
}

impl<S: MessageSink> Injector<S> {
    pub fn new(sink: S, click_hold_ms: u64) -> Self {
        Self {
            sink,
            click_hold: Duration::from_millis(click_hold_ms),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Button down, hold, button up at `point`.
    pub fn click(&mut self, point: Point) -> InjectionOutcome {
        debug!(%point, "Click");
        let mut sequence = Sequence::new(2);
        if let Err(outcome) = sequence.post(&mut self.sink, WindowMessage::ButtonDown(point)) {
            return outcome;
        }
        thread::sleep(self.click_hold);
        if let Err(outcome) = sequence.post(&mut self.sink, WindowMessage::ButtonUp(point)) {
            return outcome;
        }
        sequence.completed()
    }

    /// Presses at `from`, moves toward `to` in `steps` evenly spaced moves
    /// over `duration_ms`, and releases at `to`.
    ///
    /// Moves are at fractions i / steps for i in 0..steps, so the last move
    /// stops one step short of `to` and the release lands on it.
    pub fn drag(
        &mut self,
        from: Point,
        to: Point,
        duration_ms: u64,
        steps: u32,
        min_distance: u32,
    ) -> InjectionOutcome {
        let distance = from.manhattan(to);
        if distance < min_distance {
            debug!(%from, %to, distance, min_distance, "Drag too short, skipped");
            return InjectionOutcome::Skipped;
        }

        let steps = steps.max(1);
        let interval = Duration::from_millis(duration_ms) / steps;
        debug!(%from, %to, steps, ?interval, "Drag");

        let mut sequence = Sequence::new(steps as usize + 2);
        if let Err(outcome) = sequence.post(&mut self.sink, WindowMessage::ButtonDown(from)) {
            return outcome;
        }
        for i in 0..steps {
            let point = from.lerp(to, i as f64 / steps as f64);
            if let Err(outcome) = sequence.post(&mut self.sink, WindowMessage::Move(point)) {
                return outcome;
            }
            thread::sleep(interval);
        }
        if let Err(outcome) = sequence.post(&mut self.sink, WindowMessage::ButtonUp(to)) {
            return outcome;
        }
        sequence.completed()
    }
}

/// Counts posts and turns the first failure into a `Partial` outcome.
struct Sequence {
    posted: usize,
    expected: usize,
}

impl Sequence {
    fn new(expected: usize) -> Self {
        Self {
            posted: 0,
            expected,
        }
    }

    fn post<S: MessageSink>(
        &mut self,
        sink: &mut S,
        message: WindowMessage,
    ) -> Result<(), InjectionOutcome> {
        match sink.post(message) {
            Ok(()) => {
                self.posted += 1;
                Ok(())
            }
            Err(error) => {
                warn!(
                    ?message,
                    posted = self.posted,
                    expected = self.expected,
                    error = %error,
                    "Message post failed, gesture abandoned"
                );
                Err(InjectionOutcome::Partial {
                    posted: self.posted,
                    expected: self.expected,
                    error,
                })
            }
        }
    }

    fn completed(self) -> InjectionOutcome {
        InjectionOutcome::Completed {
            posted: self.posted,
        }
    }
}

/// Packs client coordinates into a mouse message lParam: x in the low word,
/// y in the high word, each as 16-bit two's complement.
pub fn pack_lparam(point: Point) -> isize {
    let x = point.x as u16 as u32;
    let y = point.y as u16 as u32;
    ((y << 16) | x) as i32 as isize
}

#[cfg(windows)]
pub use platform::PostMessageSink;

#[cfg(windows)]
mod platform {
    use windows::Win32::Foundation::{LPARAM, WPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        PostMessageW, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MOUSEMOVE,
    };

    use super::{pack_lparam, MessageSink, WindowMessage};
    use crate::capture::window::is_window;
    use crate::capture::WindowHandle;
    use crate::error::InjectionError;

    /// wParam flag: left button held
    const MK_LBUTTON: usize = 0x0001;

    /// Posts messages to a window with `PostMessageW`.
    pub struct PostMessageSink {
        handle: WindowHandle,
    }

    impl PostMessageSink {
        pub fn new(handle: WindowHandle) -> Self {
            Self { handle }
        }
    }

    impl MessageSink for PostMessageSink {
        fn post(&mut self, message: WindowMessage) -> Result<(), InjectionError> {
            let (msg, wparam, point) = match message {
                WindowMessage::ButtonDown(p) => (WM_LBUTTONDOWN, MK_LBUTTON, p),
                WindowMessage::Move(p) => (WM_MOUSEMOVE, MK_LBUTTON, p),
                WindowMessage::ButtonUp(p) => (WM_LBUTTONUP, 0, p),
            };
            let lparam = LPARAM(pack_lparam(point));

            unsafe { PostMessageW(self.handle.hwnd(), msg, WPARAM(wparam), lparam) }.map_err(|e| {
                if is_window(self.handle) {
                    InjectionError::Os(e.to_string())
                } else {
                    InjectionError::WindowGone(self.handle)
                }
            })
        }
    }
}
