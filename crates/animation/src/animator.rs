use parameters::{ParameterError, ParameterId, ParameterStore};
use thiserror::Error;

use crate::interpolate::{Interpolation, value_at};
use crate::keyframes::KeyframeTrack;
use crate::oscillator::SinusoidalOscillator;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnimationError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error("parameter `{0}` is not animatable")]
    NotAnimatable(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Animator {
    Keyframed {
        track: KeyframeTrack,
        interpolation: Interpolation,
    },
    Sinusoidal(SinusoidalOscillator),
}

impl Animator {
    pub fn keyframed(interpolation: Interpolation) -> Self {
        Animator::Keyframed {
            track: KeyframeTrack::new(),
            interpolation,
        }
    }

    pub fn evaluate(&self, frame: i64, live_value: f64) -> f64 {
        match self {
            Animator::Keyframed {
                track,
                interpolation,
            } => value_at(track, frame, interpolation.interpolator(), live_value),
            Animator::Sinusoidal(oscillator) => oscillator.value_at(frame),
        }
    }
}

#[derive(Debug, Clone)]
struct Binding {
    parameter: ParameterId,
    animator: Animator,
}

/// Animators bound to scalar parameters, applied once per clock tick.
#[derive(Debug, Clone, Default)]
pub struct AnimatorSet {
    bindings: Vec<Binding>,
}

impl AnimatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Replaces and returns any animator already bound to `parameter`.
    pub fn bind(
        &mut self,
        store: &ParameterStore,
        parameter: ParameterId,
        animator: Animator,
    ) -> Result<Option<Animator>, AnimationError> {
        let info = store.info(parameter)?;
        if !info.animatable {
            return Err(AnimationError::NotAnimatable(info.name));
        }
        store.scalar(parameter)?;
        if let Some(binding) = self.binding_mut(parameter) {
            return Ok(Some(std::mem::replace(&mut binding.animator, animator)));
        }
        self.bindings.push(Binding {
            parameter,
            animator,
        });
        Ok(None)
    }

    pub fn unbind(&mut self, parameter: ParameterId) -> Option<Animator> {
        let index = self
            .bindings
            .iter()
            .position(|binding| binding.parameter == parameter)?;
        Some(self.bindings.remove(index).animator)
    }

    pub fn animator(&self, parameter: ParameterId) -> Option<&Animator> {
        self.bindings
            .iter()
            .find(|binding| binding.parameter == parameter)
            .map(|binding| &binding.animator)
    }

    pub fn animator_mut(&mut self, parameter: ParameterId) -> Option<&mut Animator> {
        self.binding_mut(parameter).map(|binding| &mut binding.animator)
    }

    /// Records the parameter's current value as a keyframe at `frame`.
    /// Returns `Ok(false)` when the parameter has no keyframed animator.
    pub fn capture_keyframe(
        &mut self,
        store: &ParameterStore,
        parameter: ParameterId,
        frame: i64,
    ) -> Result<bool, AnimationError> {
        let value = store.scalar(parameter)?;
        match self.animator_mut(parameter) {
            Some(Animator::Keyframed { track, .. }) => {
                track.insert(frame, value);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Writes each animated value for `frame` into the store and returns how
    /// many parameters actually changed.
    pub fn apply(&self, store: &mut ParameterStore, frame: i64) -> Result<usize, AnimationError> {
        let mut changed = 0;
        for binding in &self.bindings {
            let live_value = store.scalar(binding.parameter)?;
            let value = binding.animator.evaluate(frame, live_value);
            if store.set_scalar(binding.parameter, value)? {
                changed += 1;
            }
        }
        if changed > 0 {
            tracing::trace!(frame, changed, "applied animated parameters");
        }
        Ok(changed)
    }

    fn binding_mut(&mut self, parameter: ParameterId) -> Option<&mut Binding> {
        self.bindings
            .iter_mut()
            .find(|binding| binding.parameter == parameter)
    }
}

#[cfg(test)]
mod tests {
    use parameters::ParameterSpec;

    use super::*;

    #[test]
    fn apply_writes_interpolated_values_and_flags_changes() {
        let mut store = ParameterStore::new();
        let zoom = store
            .register(ParameterSpec::new("Zoom", 0.0).range(0.0, 100.0).animatable())
            .expect("register zoom");
        let mut animators = AnimatorSet::new();
        animators
            .bind(&store, zoom.id(), Animator::keyframed(Interpolation::Linear))
            .expect("bind zoom");
        if let Some(Animator::Keyframed { track, .. }) = animators.animator_mut(zoom.id()) {
            track.insert(0, 0.0);
            track.insert(10, 100.0);
        }

        assert_eq!(animators.apply(&mut store, 5).expect("apply"), 1);
        assert_eq!(store.get(zoom).expect("get zoom"), 50.0);
        assert!(store.drain_changes().contains(zoom));

        assert_eq!(animators.apply(&mut store, 5).expect("apply"), 0);
        assert!(store.drain_changes().is_empty());
    }

    #[test]
    fn empty_track_leaves_live_value_untouched() {
        let mut store = ParameterStore::new();
        let zoom = store
            .register(ParameterSpec::new("Zoom", 3.0).animatable())
            .expect("register zoom");
        let mut animators = AnimatorSet::new();
        animators
            .bind(&store, zoom.id(), Animator::keyframed(Interpolation::Quadratic))
            .expect("bind zoom");

        store.set(zoom, 7.0).expect("set zoom");
        store.drain_changes();
        assert_eq!(animators.apply(&mut store, 12).expect("apply"), 0);
        assert_eq!(store.get(zoom).expect("get zoom"), 7.0);
    }

    #[test]
    fn capture_keyframe_records_current_value() {
        let mut store = ParameterStore::new();
        let count = store
            .register(ParameterSpec::new("Count", 4_i64).animatable())
            .expect("register count");
        let mut animators = AnimatorSet::new();
        animators
            .bind(&store, count.id(), Animator::keyframed(Interpolation::Linear))
            .expect("bind count");

        assert!(animators.capture_keyframe(&store, count.id(), 9).expect("capture"));
        match animators.animator(count.id()) {
            Some(Animator::Keyframed { track, .. }) => assert_eq!(track.get(9), Some(4.0)),
            other => panic!("unexpected animator {other:?}"),
        }
    }

    #[test]
    fn bind_rejects_non_animatable_parameters() {
        let mut store = ParameterStore::new();
        let seed = store
            .register(ParameterSpec::new("Seed", 1_i64))
            .expect("register seed");
        let mut animators = AnimatorSet::new();
        assert_eq!(
            animators.bind(&store, seed.id(), Animator::keyframed(Interpolation::Linear)),
            Err(AnimationError::NotAnimatable("Seed"))
        );
        assert!(animators.is_empty());
    }

    #[test]
    fn rebinding_replaces_and_unbind_removes() {
        let mut store = ParameterStore::new();
        let zoom = store
            .register(ParameterSpec::new("Zoom", 1.0).animatable())
            .expect("register zoom");
        let mut animators = AnimatorSet::new();
        animators
            .bind(&store, zoom.id(), Animator::keyframed(Interpolation::Linear))
            .expect("bind zoom");
        let previous = animators
            .bind(
                &store,
                zoom.id(),
                Animator::Sinusoidal(SinusoidalOscillator::for_loop(0, 10, 1.0, None)),
            )
            .expect("rebind zoom");
        assert!(matches!(previous, Some(Animator::Keyframed { .. })));
        assert_eq!(animators.len(), 1);
        assert!(matches!(
            animators.unbind(zoom.id()),
            Some(Animator::Sinusoidal(_))
        ));
        assert!(animators.is_empty());
    }
}
