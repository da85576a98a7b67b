#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValue {
    Float(f64),
    Int(i64),
    Toggle(bool),
    Vector2([f64; 2]),
    Color([f32; 4]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Float,
    Int,
    Toggle,
    Vector2,
    Color,
}

impl ParameterValue {
    pub const fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::Float(_) => ParameterKind::Float,
            ParameterValue::Int(_) => ParameterKind::Int,
            ParameterValue::Toggle(_) => ParameterKind::Toggle,
            ParameterValue::Vector2(_) => ParameterKind::Vector2,
            ParameterValue::Color(_) => ParameterKind::Color,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match *self {
            ParameterValue::Float(value) => Some(value),
            ParameterValue::Int(value) => Some(value as f64),
            _ => None,
        }
    }

    pub(crate) fn clamped(self, domain: Option<Domain>) -> Self {
        let Some(domain) = domain else {
            return self;
        };
        match self {
            ParameterValue::Float(value) => ParameterValue::Float(domain.clamp(value)),
            ParameterValue::Int(value) => {
                ParameterValue::Int(domain.clamp(value as f64).round() as i64)
            }
            ParameterValue::Vector2([x, y]) => {
                ParameterValue::Vector2([domain.clamp(x), domain.clamp(y)])
            }
            ParameterValue::Toggle(_) | ParameterValue::Color(_) => self,
        }
    }
}

/// Inclusive numeric range a scalar or vector parameter is clamped into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub min: f64,
    pub max: f64,
}

impl Domain {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f64 {}
    impl Sealed for i64 {}
    impl Sealed for bool {}
    impl Sealed for [f64; 2] {}
    impl Sealed for [f32; 4] {}
}

/// Rust types a [`crate::ParamHandle`] can be typed with.
pub trait ParameterType: sealed::Sealed + Copy + Send + 'static {
    const KIND: ParameterKind;

    fn from_value(value: ParameterValue) -> Option<Self>;
    fn into_value(self) -> ParameterValue;
}

impl ParameterType for f64 {
    const KIND: ParameterKind = ParameterKind::Float;

    fn from_value(value: ParameterValue) -> Option<Self> {
        match value {
            ParameterValue::Float(value) => Some(value),
            _ => None,
        }
    }

    fn into_value(self) -> ParameterValue {
        ParameterValue::Float(self)
    }
}

impl ParameterType for i64 {
    const KIND: ParameterKind = ParameterKind::Int;

    fn from_value(value: ParameterValue) -> Option<Self> {
        match value {
            ParameterValue::Int(value) => Some(value),
            _ => None,
        }
    }

    fn into_value(self) -> ParameterValue {
        ParameterValue::Int(self)
    }
}

impl ParameterType for bool {
    const KIND: ParameterKind = ParameterKind::Toggle;

    fn from_value(value: ParameterValue) -> Option<Self> {
        match value {
            ParameterValue::Toggle(value) => Some(value),
            _ => None,
        }
    }

    fn into_value(self) -> ParameterValue {
        ParameterValue::Toggle(self)
    }
}

impl ParameterType for [f64; 2] {
    const KIND: ParameterKind = ParameterKind::Vector2;

    fn from_value(value: ParameterValue) -> Option<Self> {
        match value {
            ParameterValue::Vector2(value) => Some(value),
            _ => None,
        }
    }

    fn into_value(self) -> ParameterValue {
        ParameterValue::Vector2(self)
    }
}

impl ParameterType for [f32; 4] {
    const KIND: ParameterKind = ParameterKind::Color;

    fn from_value(value: ParameterValue) -> Option<Self> {
        match value {
            ParameterValue::Color(value) => Some(value),
            _ => None,
        }
    }

    fn into_value(self) -> ParameterValue {
        ParameterValue::Color(self)
    }
}
