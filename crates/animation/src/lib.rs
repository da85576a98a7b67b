//! Logical frame timeline and keyframe-driven parameter animation.
//!
//! The clock advances independently of the GPU frame rate and wraps inside a
//! loop window. Animated parameters resolve their value per frame from a
//! keyframe track (linear or quadratic) or from a procedural oscillator.

mod animator;
mod clock;
mod interpolate;
mod keyframes;
mod oscillator;

pub use animator::{AnimationError, Animator, AnimatorSet};
pub use clock::{AnimationClock, AnimationState, LoopRangeError, TickOutcome};
pub use interpolate::{
    Interpolation, Interpolator, LinearInterpolator, QuadraticInterpolator, solve3, value_at,
};
pub use keyframes::{Bracket, Keyframe, KeyframeTrack};
pub use oscillator::SinusoidalOscillator;
