use std::f64::consts::TAU;

use parameters::Domain;

const DEFAULT_AMPLITUDE: f64 = 50.0;
const SCROLL_SHRINK: f64 = 0.9;
const SCROLL_GROW: f64 = 1.1;
const DRAG_PERIOD_STEP: f64 = 0.1;

/// Procedural `amplitude * sin((f - locus) / period * 2π) + intercept`,
/// shaped by direct manipulation rather than stored keyframes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SinusoidalOscillator {
    locus: f64,
    period: f64,
    amplitude: f64,
    intercept: f64,
    domain: Option<Domain>,
}

impl SinusoidalOscillator {
    /// One period across the loop window, centred on it, oscillating around
    /// the parameter's live value.
    pub fn for_loop(loop_start: i64, loop_end: i64, live_value: f64, domain: Option<Domain>) -> Self {
        let mut oscillator = Self {
            locus: (loop_start + loop_end) as f64 / 2.0,
            period: (loop_end - loop_start).max(0) as f64,
            amplitude: DEFAULT_AMPLITUDE,
            intercept: live_value,
            domain,
        };
        oscillator.clamp_to_domain();
        oscillator
    }

    pub fn locus(&self) -> f64 {
        self.locus
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn value_at(&self, frame: i64) -> f64 {
        let raw = if self.period == 0.0 {
            self.intercept
        } else {
            self.amplitude * ((frame as f64 - self.locus) / self.period * TAU).sin() + self.intercept
        };
        match self.domain {
            Some(domain) => domain.clamp(raw),
            None => raw,
        }
    }

    /// Horizontal drag: moves the locus and shifts the resting value.
    pub fn drag_horizontal(&mut self, locus_delta: f64, intercept_delta: f64) {
        self.locus += locus_delta;
        self.intercept += intercept_delta;
        self.clamp_to_domain();
    }

    /// Vertical drag changes the amplitude; the sign of `period_direction`
    /// nudges the period.
    pub fn drag_vertical(&mut self, amplitude_delta: f64, period_direction: f64) {
        if period_direction < 0.0 {
            self.period -= DRAG_PERIOD_STEP;
        } else if period_direction > 0.0 {
            self.period += DRAG_PERIOD_STEP;
        }
        self.amplitude += amplitude_delta;
        self.clamp_to_domain();
    }

    pub fn scroll(&mut self, delta: f64) {
        if delta < 0.0 {
            self.period *= SCROLL_SHRINK;
        } else if delta > 0.0 {
            self.period *= SCROLL_GROW;
        }
        self.clamp_to_domain();
    }

    pub fn set_period(&mut self, period: f64) {
        self.period = period;
        self.clamp_to_domain();
    }

    fn clamp_to_domain(&mut self) {
        if self.period.is_nan() || self.period < 0.0 {
            self.period = 0.0;
        }
        let Some(domain) = self.domain else {
            return;
        };
        self.intercept = domain.clamp(self.intercept);
        let span = domain.span();
        self.amplitude = self.amplitude.clamp(-span, span);
    }
}
