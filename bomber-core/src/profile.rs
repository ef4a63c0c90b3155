use crate::ProfileError;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
#[cfg(feature = "serde")]
use serde_with::{serde_as, DurationMilliSeconds};
use std::fmt;
use std::time::Duration;

/// One contiguous segment of a [`LoadProfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", cfg_eval::cfg_eval, serde_as)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum Phase {
    /// Hold `copies` virtual users for the whole phase.
    KeepConstant {
        copies: usize,
        #[cfg_attr(feature = "serde", serde_as(as = "DurationMilliSeconds<u64>"))]
        during: Duration,
    },
    /// Linearly move from the previous phase's level to `copies` over the phase.
    RampingConstant {
        copies: usize,
        #[cfg_attr(feature = "serde", serde_as(as = "DurationMilliSeconds<u64>"))]
        during: Duration,
    },
    /// No virtual users.
    Pause {
        #[cfg_attr(feature = "serde", serde_as(as = "DurationMilliSeconds<u64>"))]
        during: Duration,
    },
}

impl Phase {
    pub fn keep_constant(copies: usize, during: Duration) -> Self {
        Self::KeepConstant { copies, during }
    }

    pub fn ramping_constant(copies: usize, during: Duration) -> Self {
        Self::RampingConstant { copies, during }
    }

    pub fn pause(during: Duration) -> Self {
        Self::Pause { during }
    }

    pub fn during(&self) -> Duration {
        match self {
            Self::KeepConstant { during, .. }
            | Self::RampingConstant { during, .. }
            | Self::Pause { during } => *during,
        }
    }

    /// Level the profile sits at once the phase has run its course.
    fn end_level(&self) -> usize {
        match self {
            Self::KeepConstant { copies, .. } | Self::RampingConstant { copies, .. } => *copies,
            Self::Pause { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    start: Duration,
    end: Duration,
    from: usize,
    phase: Phase,
}

impl Segment {
    fn level_at(&self, elapsed: Duration) -> usize {
        match self.phase {
            Phase::KeepConstant { copies, .. } => copies,
            Phase::Pause { .. } => 0,
            Phase::RampingConstant { copies, during } => {
                let progress = (elapsed - self.start).as_secs_f64() / during.as_secs_f64();
                let from = self.from as f64;
                let level = from + (copies as f64 - from) * progress;
                level.round().max(0.) as usize
            }
        }
    }

    fn peak(&self) -> usize {
        match self.phase {
            Phase::KeepConstant { copies, .. } => copies,
            Phase::RampingConstant { copies, .. } => copies.max(self.from),
            Phase::Pause { .. } => 0,
        }
    }
}

/// Target concurrency as a pure function of elapsed run time.
///
/// Phases are laid end to end starting at zero. The level at a phase boundary is the level
/// of the phase starting there, and the level at or after [`LoadProfile::total_duration`] is
/// zero. Zero-length phases occupy no instant, but still set the starting level of a
/// following ramp.
///
/// # Example
/// ```
/// use bomber_core::{LoadProfile, Phase};
/// use std::time::Duration;
///
/// let profile = LoadProfile::new(vec![
///     Phase::ramping_constant(10, Duration::from_secs(10)),
///     Phase::keep_constant(10, Duration::from_secs(60)),
/// ])
/// .unwrap();
///
/// assert_eq!(profile.concurrency_at(Duration::from_secs(5)), 5);
/// assert_eq!(profile.concurrency_at(Duration::from_secs(30)), 10);
/// assert_eq!(profile.total_duration(), Duration::from_secs(70));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Vec<Phase>", into = "Vec<Phase>")
)]
pub struct LoadProfile {
    segments: Vec<Segment>,
    total: Duration,
}

impl LoadProfile {
    pub fn new(phases: Vec<Phase>) -> Result<Self, ProfileError> {
        if phases.is_empty() {
            return Err(ProfileError::Empty);
        }

        let mut segments = Vec::with_capacity(phases.len());
        let mut start = Duration::ZERO;
        let mut level = 0;
        for phase in phases {
            let end = start
                .checked_add(phase.during())
                .ok_or(ProfileError::DurationOverflow)?;
            segments.push(Segment {
                start,
                end,
                from: level,
                phase,
            });
            start = end;
            level = phase.end_level();
        }

        Ok(Self {
            segments,
            total: start,
        })
    }

    /// Single phase holding `copies` virtual users for `during`.
    pub fn keep_constant(copies: usize, during: Duration) -> Self {
        Self {
            segments: vec![Segment {
                start: Duration::ZERO,
                end: during,
                from: 0,
                phase: Phase::keep_constant(copies, during),
            }],
            total: during,
        }
    }

    pub fn concurrency_at(&self, elapsed: Duration) -> usize {
        if elapsed >= self.total {
            return 0;
        }

        // Segment ends are non-decreasing, so the first one ending after `elapsed` contains it.
        let idx = self.segments.partition_point(|s| s.end <= elapsed);
        self.segments
            .get(idx)
            .map(|segment| segment.level_at(elapsed))
            .unwrap_or(0)
    }

    pub fn total_duration(&self) -> Duration {
        self.total
    }

    /// Highest concurrency the profile will ever ask for.
    pub fn peak(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| s.end > s.start)
            .map(Segment::peak)
            .max()
            .unwrap_or(0)
    }

    pub fn phases(&self) -> impl Iterator<Item = &Phase> + '_ {
        self.segments.iter().map(|s| &s.phase)
    }
}

impl TryFrom<Vec<Phase>> for LoadProfile {
    type Error = ProfileError;

    fn try_from(phases: Vec<Phase>) -> Result<Self, Self::Error> {
        Self::new(phases)
    }
}

impl From<LoadProfile> for Vec<Phase> {
    fn from(profile: LoadProfile) -> Self {
        profile.segments.into_iter().map(|s| s.phase).collect()
    }
}

impl fmt::Display for LoadProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                write!(f, " -> ")?;
            }
            let during = humantime::format_duration(segment.phase.during());
            match segment.phase {
                Phase::KeepConstant { copies, .. } => write!(f, "keep {copies} for {during}")?,
                Phase::RampingConstant { copies, .. } => {
                    write!(f, "ramp {}..{copies} over {during}", segment.from)?
                }
                Phase::Pause { .. } => write!(f, "pause {during}")?,
            }
        }
        Ok(())
    }
}
