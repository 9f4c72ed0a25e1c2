use std::time::{Duration, Instant};

/// How long a blocking operation may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitTimeout {
    /// Do not wait at all; fail at once if the condition does not hold.
    #[default]
    Immediate,
    /// Wait at most this long.
    After(Duration),
    /// Wait until woken.
    Infinite,
}

impl WaitTimeout {
    /// True for non-blocking polls (including a zero duration).
    pub fn is_immediate(self) -> bool {
        match self {
            WaitTimeout::Immediate => true,
            WaitTimeout::After(d) => d.is_zero(),
            WaitTimeout::Infinite => false,
        }
    }

    /// Absolute deadline, `None` when waiting forever.
    ///
    /// A duration too large to represent as an `Instant` waits forever.
    pub(crate) fn deadline(self) -> Option<Instant> {
        match self {
            WaitTimeout::Immediate => Some(Instant::now()),
            WaitTimeout::After(d) => Instant::now().checked_add(d),
            WaitTimeout::Infinite => None,
        }
    }

    /// Timeout left until `deadline`.
    pub(crate) fn until(deadline: Option<Instant>) -> Self {
        match deadline {
            None => WaitTimeout::Infinite,
            Some(at) => match at.checked_duration_since(Instant::now()) {
                Some(left) if !left.is_zero() => WaitTimeout::After(left),
                _ => WaitTimeout::Immediate,
            },
        }
    }
}

impl From<Duration> for WaitTimeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            WaitTimeout::Immediate
        } else {
            WaitTimeout::After(d)
        }
    }
}
