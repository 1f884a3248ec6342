//! Live tunable granular synthesis parameters.

use four_cc::FourCC;

use crate::{
    error::Error,
    parameter::{FloatParameter, ParameterValueUpdate},
};

// -------------------------------------------------------------------------------------------------

/// The parameter set grains are created with.
///
/// Parameters are mutated by the host UI via validated setters and read by the grain scheduler
/// at trigger time. The struct is `Copy`, so each trigger computation works on a single,
/// consistent snapshot of all values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisParameters {
    attack: f32,
    release: f32,
    density: f32,
    spread: f32,
    pan: f32,
    transpose: f32,
}

impl Default for SynthesisParameters {
    fn default() -> Self {
        Self {
            attack: Self::ATTACK.default_value(),
            release: Self::RELEASE.default_value(),
            density: Self::DENSITY.default_value(),
            spread: Self::SPREAD.default_value(),
            pan: Self::PAN.default_value(),
            transpose: Self::TRANSPOSE.default_value(),
        }
    }
}

impl SynthesisParameters {
    pub const ATTACK: FloatParameter =
        FloatParameter::new(FourCC(*b"GATK"), "Attack", 0.01..=1.0, 0.4).with_unit("s");
    pub const RELEASE: FloatParameter =
        FloatParameter::new(FourCC(*b"GREL"), "Release", 0.01..=1.0, 0.4).with_unit("s");
    pub const DENSITY: FloatParameter =
        FloatParameter::new(FourCC(*b"GDNS"), "Density", 0.0..=1.0, 0.85);
    pub const SPREAD: FloatParameter =
        FloatParameter::new(FourCC(*b"GSPR"), "Spread", 0.0..=1.0, 0.2).with_unit("s");
    pub const PAN: FloatParameter = FloatParameter::new(FourCC(*b"GPAN"), "Pan", 0.0..=1.0, 0.1);
    pub const TRANSPOSE: FloatParameter =
        FloatParameter::new(FourCC(*b"GTRN"), "Transpose", 0.0625..=16.0, 1.0).with_unit("x");

    /// Create new parameters with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// All parameter descriptors, in display order.
    pub fn descriptors() -> [FloatParameter; 6] {
        [
            Self::ATTACK,
            Self::RELEASE,
            Self::DENSITY,
            Self::SPREAD,
            Self::PAN,
            Self::TRANSPOSE,
        ]
    }

    /// Grain attack time in seconds.
    pub fn attack(&self) -> f32 {
        self.attack
    }
    pub fn set_attack(&mut self, seconds: f32) -> Result<(), Error> {
        self.attack = Self::validated(&Self::ATTACK, seconds)?;
        Ok(())
    }

    /// Grain release time in seconds.
    pub fn release(&self) -> f32 {
        self.release
    }
    pub fn set_release(&mut self, seconds: f32) -> Result<(), Error> {
        self.release = Self::validated(&Self::RELEASE, seconds)?;
        Ok(())
    }

    /// Grain repeat density while a contact is held. 0 disables repeats.
    pub fn density(&self) -> f32 {
        self.density
    }
    pub fn set_density(&mut self, density: f32) -> Result<(), Error> {
        self.density = Self::validated(&Self::DENSITY, density)?;
        Ok(())
    }

    /// Random offset jitter bound in seconds.
    pub fn spread(&self) -> f32 {
        self.spread
    }
    pub fn set_spread(&mut self, seconds: f32) -> Result<(), Error> {
        self.spread = Self::validated(&Self::SPREAD, seconds)?;
        Ok(())
    }

    /// Random stereo panning jitter bound.
    pub fn pan(&self) -> f32 {
        self.pan
    }
    pub fn set_pan(&mut self, pan: f32) -> Result<(), Error> {
        self.pan = Self::validated(&Self::PAN, pan)?;
        Ok(())
    }

    /// Playback rate multiplier of new grains.
    pub fn transpose(&self) -> f32 {
        self.transpose
    }
    pub fn set_transpose(&mut self, ratio: f32) -> Result<(), Error> {
        self.transpose = Self::validated(&Self::TRANSPOSE, ratio)?;
        Ok(())
    }

    /// Transpose one octave up, stopping at the highest allowed ratio.
    pub fn transpose_up(&mut self) {
        self.transpose = Self::TRANSPOSE.clamp_value(self.transpose * 2.0);
    }

    /// Transpose one octave down, stopping at the lowest allowed ratio.
    pub fn transpose_down(&mut self) {
        self.transpose = Self::TRANSPOSE.clamp_value(self.transpose / 2.0);
    }

    /// Grain duration in seconds: attack + release.
    pub fn grain_duration(&self) -> f32 {
        self.attack + self.release
    }

    /// Apply a plain or normalized value update to the parameter with the given id.
    /// Finite values get clamped into the parameter's range, NaN and infinite values are rejected.
    pub fn set_parameter(&mut self, id: FourCC, update: ParameterValueUpdate) -> Result<(), Error> {
        let (ParameterValueUpdate::Value(value) | ParameterValueUpdate::Normalized(value)) = update;
        if !value.is_finite() {
            return Err(Error::ParameterError(format!(
                "Invalid value for synthesis parameter '{id}': {value}"
            )));
        }
        match id {
            _ if id == Self::ATTACK.id() => self.attack = Self::ATTACK.update_value(update),
            _ if id == Self::RELEASE.id() => self.release = Self::RELEASE.update_value(update),
            _ if id == Self::DENSITY.id() => self.density = Self::DENSITY.update_value(update),
            _ if id == Self::SPREAD.id() => self.spread = Self::SPREAD.update_value(update),
            _ if id == Self::PAN.id() => self.pan = Self::PAN.update_value(update),
            _ if id == Self::TRANSPOSE.id() => {
                self.transpose = Self::TRANSPOSE.update_value(update)
            }
            _ => {
                return Err(Error::ParameterError(format!(
                    "Invalid/unknown synthesis parameter '{id}'"
                )))
            }
        }
        Ok(())
    }

    /// Get the plain value of the parameter with the given id.
    pub fn parameter_value(&self, id: FourCC) -> Option<f32> {
        match id {
            _ if id == Self::ATTACK.id() => Some(self.attack),
            _ if id == Self::RELEASE.id() => Some(self.release),
            _ if id == Self::DENSITY.id() => Some(self.density),
            _ if id == Self::SPREAD.id() => Some(self.spread),
            _ if id == Self::PAN.id() => Some(self.pan),
            _ if id == Self::TRANSPOSE.id() => Some(self.transpose),
            _ => None,
        }
    }

    fn validated(descriptor: &FloatParameter, value: f32) -> Result<f32, Error> {
        if !value.is_finite() || !descriptor.range().contains(&value) {
            return Err(Error::ParameterError(format!(
                "{} must be between {} and {}, but is {}",
                descriptor.name(),
                descriptor.range().start(),
                descriptor.range().end(),
                value
            )));
        }
        Ok(value)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let parameters = SynthesisParameters::default();
        assert_eq!(parameters.attack(), 0.4);
        assert_eq!(parameters.release(), 0.4);
        assert_eq!(parameters.density(), 0.85);
        assert_eq!(parameters.spread(), 0.2);
        assert_eq!(parameters.pan(), 0.1);
        assert_eq!(parameters.transpose(), 1.0);
        assert_eq!(parameters.grain_duration(), 0.8);
    }

    #[test]
    fn validated_setters() -> Result<(), Error> {
        let mut parameters = SynthesisParameters::new();
        parameters.set_attack(0.1)?;
        parameters.set_density(0.0)?;
        assert_eq!(parameters.attack(), 0.1);
        assert_eq!(parameters.density(), 0.0);

        assert!(parameters.set_attack(0.0).is_err());
        assert!(parameters.set_release(1.5).is_err());
        assert!(parameters.set_density(-0.1).is_err());
        assert!(parameters.set_pan(f32::NAN).is_err());
        assert!(parameters.set_transpose(0.0).is_err());
        // failed updates keep the previous value
        assert_eq!(parameters.attack(), 0.1);
        Ok(())
    }

    #[test]
    fn transpose_octaves() {
        let mut parameters = SynthesisParameters::new();
        parameters.transpose_up();
        assert_eq!(parameters.transpose(), 2.0);
        parameters.transpose_down();
        parameters.transpose_down();
        assert_eq!(parameters.transpose(), 0.5);
        for _ in 0..10 {
            parameters.transpose_down();
        }
        assert_eq!(parameters.transpose(), 0.0625);
        for _ in 0..20 {
            parameters.transpose_up();
        }
        assert_eq!(parameters.transpose(), 16.0);
    }

    #[test]
    fn parameter_updates_by_id() -> Result<(), Error> {
        let mut parameters = SynthesisParameters::new();
        parameters.set_parameter(
            SynthesisParameters::DENSITY.id(),
            ParameterValueUpdate::Normalized(0.5),
        )?;
        assert_eq!(parameters.density(), 0.5);
        parameters.set_parameter(
            SynthesisParameters::SPREAD.id(),
            ParameterValueUpdate::Value(5.0),
        )?;
        assert_eq!(parameters.spread(), 1.0);
        assert_eq!(
            parameters.parameter_value(SynthesisParameters::SPREAD.id()),
            Some(1.0)
        );
        assert!(parameters
            .set_parameter(FourCC(*b"XXXX"), ParameterValueUpdate::Value(0.0))
            .is_err());
        assert!(parameters.parameter_value(FourCC(*b"XXXX")).is_none());
        Ok(())
    }

    #[test]
    fn non_finite_updates_are_rejected() {
        let mut parameters = SynthesisParameters::new();
        let attack = SynthesisParameters::ATTACK.id();
        for update in [
            ParameterValueUpdate::Value(f32::NAN),
            ParameterValueUpdate::Normalized(f32::NAN),
            ParameterValueUpdate::Value(f32::INFINITY),
            ParameterValueUpdate::Normalized(f32::NEG_INFINITY),
        ] {
            assert!(parameters.set_parameter(attack, update).is_err());
        }
        assert_eq!(parameters.attack(), 0.4);
        assert!(parameters.grain_duration().is_finite());
    }

    #[test]
    fn descriptors() {
        let descriptors = SynthesisParameters::descriptors();
        let mut ids = descriptors.iter().map(|d| d.id()).collect::<Vec<_>>();
        ids.dedup();
        assert_eq!(ids.len(), 6);
        assert_eq!(descriptors[0].name(), "Attack");
    }
}
