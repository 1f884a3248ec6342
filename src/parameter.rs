//! Parameter descriptors and value updates, for building UIs for synthesis parameters.

use std::{fmt::Debug, ops::RangeInclusive, sync::Arc};

use four_cc::FourCC;

// -------------------------------------------------------------------------------------------------

/// An update for a parameter value, as sent from e.g. a slider in a host UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterValueUpdate {
    /// A plain value in the parameter's range.
    Value(f32),
    /// A value in range `0.0..=1.0`, mapped to the parameter's range.
    Normalized(f32),
}

// -------------------------------------------------------------------------------------------------

/// A continuous (float) parameter descriptor.
#[derive(Clone)]
pub struct FloatParameter {
    id: FourCC,
    name: &'static str,
    range: RangeInclusive<f32>,
    default: f32,
    unit: &'static str,
    #[allow(clippy::type_complexity)]
    value_to_string: Option<Arc<dyn Fn(f32) -> String + Send + Sync>>,
    #[allow(clippy::type_complexity)]
    string_to_value: Option<Arc<dyn Fn(&str) -> Option<f32> + Send + Sync>>,
}

impl Debug for FloatParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FloatParameter")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("range", &self.range)
            .field("default", &self.default)
            .field("unit", &self.unit)
            .field("value_to_string", &self.value_to_string.is_some())
            .field("string_to_value", &self.string_to_value.is_some())
            .finish()
    }
}

impl FloatParameter {
    /// Create a new float parameter descriptor.
    pub const fn new(
        id: FourCC,
        name: &'static str,
        range: RangeInclusive<f32>,
        default: f32,
    ) -> Self {
        assert!(
            default >= *range.start() && default <= *range.end(),
            "Invalid parameter default value"
        );
        Self {
            id,
            name,
            range,
            default,
            unit: "",
            value_to_string: None,
            string_to_value: None,
        }
    }

    /// Optional unit for string displays.
    pub const fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = unit;
        self
    }

    /// Optional custom conversion functions to convert a plain value to a string and string
    /// to a plain value. Returned strings should not contain the unit.
    pub fn with_display<
        ValueToString: Fn(f32) -> String + Send + Sync + 'static,
        StringToValue: Fn(&str) -> Option<f32> + Send + Sync + 'static,
    >(
        mut self,
        value_to_string: ValueToString,
        string_to_value: StringToValue,
    ) -> Self {
        self.value_to_string = Some(Arc::new(value_to_string));
        self.string_to_value = Some(Arc::new(string_to_value));
        self
    }

    /// The parameter's unique id.
    pub fn id(&self) -> FourCC {
        self.id
    }

    /// The parameter's display name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The parameter's display unit. May be empty.
    pub fn unit(&self) -> &'static str {
        self.unit
    }

    /// The parameter's value range.
    pub fn range(&self) -> &RangeInclusive<f32> {
        &self.range
    }

    /// The parameter's default value.
    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// Clamp the given plain value to the parameter's range.
    pub fn clamp_value(&self, value: f32) -> f32 {
        value.clamp(*self.range.start(), *self.range.end())
    }

    /// Normalize the given plain value to a 0.0-1.0 range.
    pub fn normalize_value(&self, value: f32) -> f32 {
        (value - *self.range.start()) / (*self.range.end() - *self.range.start())
    }

    /// Denormalize a 0.0-1.0 ranged value to the corresponding plain value.
    pub fn denormalize_value(&self, normalized: f32) -> f32 {
        let normalized = normalized.clamp(0.0, 1.0);
        *self.range.start() + normalized * (*self.range.end() - *self.range.start())
    }

    /// Resolve a plain value from the given update, clamping it into the parameter's range.
    pub fn update_value(&self, update: ParameterValueUpdate) -> f32 {
        match update {
            ParameterValueUpdate::Value(value) => self.clamp_value(value),
            ParameterValueUpdate::Normalized(normalized) => self.denormalize_value(normalized),
        }
    }

    /// Convert the given plain value to a string, using a custom conversion function if provided.
    pub fn value_to_string(&self, value: f32, include_unit: bool) -> String {
        match (&self.value_to_string, include_unit && !self.unit.is_empty()) {
            (Some(f), true) => format!("{} {}", f(value), self.unit),
            (Some(f), false) => f(value),
            (None, true) => format!("{:.2} {}", value, self.unit),
            (None, false) => format!("{:.2}", value),
        }
    }

    /// Convert the given string to a plain value, using a custom conversion function if provided.
    pub fn string_to_value(&self, string: &str) -> Option<f32> {
        let value = match &self.string_to_value {
            Some(f) => f(string.trim()),
            None => string
                .trim()
                .trim_end_matches(self.unit)
                .trim_end()
                .parse()
                .ok(),
        }?;
        Some(self.clamp_value(value))
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const GAIN: FloatParameter =
        FloatParameter::new(FourCC(*b"GAIN"), "Gain", 0.0..=2.0, 1.0).with_unit("x");

    #[test]
    fn normalization() {
        assert_eq!(GAIN.normalize_value(1.0), 0.5);
        assert_eq!(GAIN.denormalize_value(0.25), 0.5);
        assert_eq!(GAIN.denormalize_value(4.0), 2.0);
        assert_eq!(GAIN.clamp_value(-1.0), 0.0);
        assert_eq!(GAIN.update_value(ParameterValueUpdate::Value(3.0)), 2.0);
        assert_eq!(GAIN.update_value(ParameterValueUpdate::Normalized(1.0)), 2.0);
    }

    #[test]
    fn string_conversion() {
        assert_eq!(GAIN.value_to_string(0.5, true), "0.50 x");
        assert_eq!(GAIN.value_to_string(0.5, false), "0.50");
        assert_eq!(GAIN.string_to_value(" 1.5 x"), Some(1.5));
        assert_eq!(GAIN.string_to_value("7"), Some(2.0));
        assert_eq!(GAIN.string_to_value("abc"), None);

        let percent = GAIN.clone().with_display(
            |v| format!("{:.0}", v * 100.0),
            |s| s.trim_end_matches('%').parse::<f32>().ok().map(|v| v / 100.0),
        );
        assert_eq!(percent.value_to_string(0.5, false), "50");
        assert_eq!(percent.string_to_value("25%"), Some(0.25));
    }
}
