//! Per channel rendering settings.
//!
//! [`RenderingSettings`] is a validated value: it can only be obtained from
//! [`RenderingSettingsBuilder::build`] or [`RenderingSettings::with_property`],
//! both of which reject invalid input with [`ConfigError`].

use nalgebra::{Point3, Vector3};

use crate::{
    color::{self, Rgb8},
    common::BoundBox,
    defaults,
    error::ConfigError,
};

/// Clamped, gamma shaped linear ramp between `min` and `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferFunction {
    min: f32,
    max: f32,
    gamma: f32,
}

impl TransferFunction {
    pub fn new(what: &'static str, min: f32, max: f32, gamma: f32) -> Result<Self, ConfigError> {
        finite(what, min)?;
        finite(what, max)?;
        finite(what, gamma)?;
        if min > max {
            return Err(ConfigError::EmptyRange { what, min, max });
        }
        if gamma <= 0.0 {
            return Err(ConfigError::NonPositiveGamma { what, gamma });
        }
        Ok(Self { min, max, gamma })
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Map sample value into <0;1>.
    ///
    /// A degenerate range (`min == max`) is a step at `max`.
    pub fn map(&self, value: f32) -> f32 {
        let ramp = if self.max > self.min {
            ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
        } else if value >= self.max {
            1.0
        } else {
            0.0
        };
        ramp.powf(1.0 / self.gamma)
    }
}

/// Phong coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting {
    pub k_object: f32,
    pub k_diffuse: f32,
    pub k_specular: f32,
    pub shininess: f32,
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            k_object: defaults::LIGHT_K_OBJECT,
            k_diffuse: defaults::LIGHT_K_DIFFUSE,
            k_specular: defaults::LIGHT_K_SPECULAR,
            shininess: defaults::LIGHT_SHININESS,
        }
    }
}

/// Scalar properties of a channel, addressable one at a time.
///
/// Used by keyframe producers which interpolate properties individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelProperty {
    IntensityMin,
    IntensityMax,
    IntensityGamma,
    AlphaMin,
    AlphaMax,
    AlphaGamma,
    Weight,
    ColorRed,
    ColorGreen,
    ColorBlue,
    UseLight,
    LightKObject,
    LightKDiffuse,
    LightKSpecular,
    LightShininess,
    BoundingBoxXMin,
    BoundingBoxYMin,
    BoundingBoxZMin,
    BoundingBoxXMax,
    BoundingBoxYMax,
    BoundingBoxZMax,
    Near,
    Far,
}

impl ChannelProperty {
    pub const ALL: [ChannelProperty; 23] = [
        ChannelProperty::IntensityMin,
        ChannelProperty::IntensityMax,
        ChannelProperty::IntensityGamma,
        ChannelProperty::AlphaMin,
        ChannelProperty::AlphaMax,
        ChannelProperty::AlphaGamma,
        ChannelProperty::Weight,
        ChannelProperty::ColorRed,
        ChannelProperty::ColorGreen,
        ChannelProperty::ColorBlue,
        ChannelProperty::UseLight,
        ChannelProperty::LightKObject,
        ChannelProperty::LightKDiffuse,
        ChannelProperty::LightKSpecular,
        ChannelProperty::LightShininess,
        ChannelProperty::BoundingBoxXMin,
        ChannelProperty::BoundingBoxYMin,
        ChannelProperty::BoundingBoxZMin,
        ChannelProperty::BoundingBoxXMax,
        ChannelProperty::BoundingBoxYMax,
        ChannelProperty::BoundingBoxZMax,
        ChannelProperty::Near,
        ChannelProperty::Far,
    ];
}

/// Rendering parameters of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderingSettings {
    intensity: TransferFunction,
    alpha: TransferFunction,
    weight: f32,
    color: Rgb8,
    use_light: bool,
    light: Lighting,
    bounding_box: BoundBox,
    near: f32,
    far: f32,
}

impl RenderingSettings {
    pub fn builder() -> RenderingSettingsBuilder {
        RenderingSettingsBuilder::default()
    }

    /// Builder pre-filled with these settings.
    pub fn to_builder(&self) -> RenderingSettingsBuilder {
        RenderingSettingsBuilder {
            intensity: (self.intensity.min, self.intensity.max, self.intensity.gamma),
            alpha: (self.alpha.min, self.alpha.max, self.alpha.gamma),
            weight: self.weight,
            color: self.color,
            use_light: self.use_light,
            light: self.light,
            bounding_box: self.bounding_box,
            near: self.near,
            far: self.far,
        }
    }

    pub fn intensity(&self) -> &TransferFunction {
        &self.intensity
    }

    pub fn alpha(&self) -> &TransferFunction {
        &self.alpha
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn color(&self) -> Rgb8 {
        self.color
    }

    pub fn use_light(&self) -> bool {
        self.use_light
    }

    pub fn light(&self) -> &Lighting {
        &self.light
    }

    /// Box in voxel coordinates, samples outside are ignored for this channel.
    pub fn bounding_box(&self) -> &BoundBox {
        &self.bounding_box
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    /// Empty depth interval, channel contributes nothing.
    pub fn is_clipped_away(&self) -> bool {
        self.near >= self.far
    }

    pub fn property(&self, property: ChannelProperty) -> f32 {
        let bb = &self.bounding_box;
        match property {
            ChannelProperty::IntensityMin => self.intensity.min,
            ChannelProperty::IntensityMax => self.intensity.max,
            ChannelProperty::IntensityGamma => self.intensity.gamma,
            ChannelProperty::AlphaMin => self.alpha.min,
            ChannelProperty::AlphaMax => self.alpha.max,
            ChannelProperty::AlphaGamma => self.alpha.gamma,
            ChannelProperty::Weight => self.weight,
            ChannelProperty::ColorRed => self.color[0] as f32,
            ChannelProperty::ColorGreen => self.color[1] as f32,
            ChannelProperty::ColorBlue => self.color[2] as f32,
            ChannelProperty::UseLight => {
                if self.use_light {
                    1.0
                } else {
                    0.0
                }
            }
            ChannelProperty::LightKObject => self.light.k_object,
            ChannelProperty::LightKDiffuse => self.light.k_diffuse,
            ChannelProperty::LightKSpecular => self.light.k_specular,
            ChannelProperty::LightShininess => self.light.shininess,
            ChannelProperty::BoundingBoxXMin => bb.lower.x,
            ChannelProperty::BoundingBoxYMin => bb.lower.y,
            ChannelProperty::BoundingBoxZMin => bb.lower.z,
            ChannelProperty::BoundingBoxXMax => bb.upper.x,
            ChannelProperty::BoundingBoxYMax => bb.upper.y,
            ChannelProperty::BoundingBoxZMax => bb.upper.z,
            ChannelProperty::Near => self.near,
            ChannelProperty::Far => self.far,
        }
    }

    /// Copy of these settings with one property replaced.
    ///
    /// Colour components are clamped to <0;255>, everything else is validated.
    pub fn with_property(
        &self,
        property: ChannelProperty,
        value: f32,
    ) -> Result<RenderingSettings, ConfigError> {
        let mut b = self.to_builder();
        match property {
            ChannelProperty::IntensityMin => b.intensity.0 = value,
            ChannelProperty::IntensityMax => b.intensity.1 = value,
            ChannelProperty::IntensityGamma => b.intensity.2 = value,
            ChannelProperty::AlphaMin => b.alpha.0 = value,
            ChannelProperty::AlphaMax => b.alpha.1 = value,
            ChannelProperty::AlphaGamma => b.alpha.2 = value,
            ChannelProperty::Weight => b.weight = value,
            ChannelProperty::ColorRed => b.color[0] = color::clamp_rgb8(value, 0.0, 0.0)[0],
            ChannelProperty::ColorGreen => b.color[1] = color::clamp_rgb8(value, 0.0, 0.0)[0],
            ChannelProperty::ColorBlue => b.color[2] = color::clamp_rgb8(value, 0.0, 0.0)[0],
            ChannelProperty::UseLight => b.use_light = value != 0.0,
            ChannelProperty::LightKObject => b.light.k_object = value,
            ChannelProperty::LightKDiffuse => b.light.k_diffuse = value,
            ChannelProperty::LightKSpecular => b.light.k_specular = value,
            ChannelProperty::LightShininess => b.light.shininess = value,
            ChannelProperty::BoundingBoxXMin => b.bounding_box.lower.x = value,
            ChannelProperty::BoundingBoxYMin => b.bounding_box.lower.y = value,
            ChannelProperty::BoundingBoxZMin => b.bounding_box.lower.z = value,
            ChannelProperty::BoundingBoxXMax => b.bounding_box.upper.x = value,
            ChannelProperty::BoundingBoxYMax => b.bounding_box.upper.y = value,
            ChannelProperty::BoundingBoxZMax => b.bounding_box.upper.z = value,
            ChannelProperty::Near => b.near = value,
            ChannelProperty::Far => b.far = value,
        }
        b.build()
    }
}

/// Builder for [`RenderingSettings`].
///
/// Starts from the renderer defaults, a unit intensity range and a
/// zero sized bounding box.
#[derive(Debug, Clone)]
pub struct RenderingSettingsBuilder {
    intensity: (f32, f32, f32),
    alpha: (f32, f32, f32),
    weight: f32,
    color: Rgb8,
    use_light: bool,
    light: Lighting,
    bounding_box: BoundBox,
    near: f32,
    far: f32,
}

impl Default for RenderingSettingsBuilder {
    fn default() -> Self {
        Self {
            intensity: (0.0, 1.0, defaults::INTENSITY_GAMMA),
            alpha: (0.0, 1.0, defaults::ALPHA_GAMMA),
            weight: defaults::WEIGHT,
            color: defaults::CHANNEL_COLOR,
            use_light: false,
            light: Lighting::default(),
            bounding_box: BoundBox::empty(),
            near: 0.0,
            far: 0.0,
        }
    }
}

impl RenderingSettingsBuilder {
    pub fn intensity(mut self, min: f32, max: f32, gamma: f32) -> Self {
        self.intensity = (min, max, gamma);
        self
    }

    pub fn alpha(mut self, min: f32, max: f32, gamma: f32) -> Self {
        self.alpha = (min, max, gamma);
        self
    }

    pub fn weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn color(mut self, color: Rgb8) -> Self {
        self.color = color;
        self
    }

    pub fn use_light(mut self, use_light: bool) -> Self {
        self.use_light = use_light;
        self
    }

    pub fn light(mut self, light: Lighting) -> Self {
        self.light = light;
        self
    }

    /// Bounding box in voxel coordinates, given by origin and size.
    pub fn bounding_box(mut self, origin: Point3<f32>, size: Vector3<f32>) -> Self {
        self.bounding_box = BoundBox::from_position_dims(origin, size);
        self
    }

    pub fn near_far(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn build(self) -> Result<RenderingSettings, ConfigError> {
        let (imin, imax, igamma) = self.intensity;
        let intensity = TransferFunction::new("intensity", imin, imax, igamma)?;
        let (amin, amax, agamma) = self.alpha;
        let alpha = TransferFunction::new("alpha", amin, amax, agamma)?;

        finite("weight", self.weight)?;
        if self.weight < 0.0 {
            return Err(ConfigError::NegativeWeight(self.weight));
        }

        finite("k_object", self.light.k_object)?;
        finite("k_diffuse", self.light.k_diffuse)?;
        finite("k_specular", self.light.k_specular)?;
        finite("shininess", self.light.shininess)?;

        let bb = self.bounding_box;
        for v in bb.lower.coords.iter().chain(bb.upper.coords.iter()) {
            finite("bounding box", *v)?;
        }
        if bb.dims().iter().any(|d| *d < 0.0) {
            return Err(ConfigError::InvalidBoundingBox);
        }

        finite("near", self.near)?;
        finite("far", self.far)?;

        Ok(RenderingSettings {
            intensity,
            alpha,
            weight: self.weight,
            color: self.color,
            use_light: self.use_light,
            light: self.light,
            bounding_box: bb,
            near: self.near,
            far: self.far,
        })
    }
}

fn finite(what: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonFinite { what, value })
    }
}

#[cfg(test)]
mod test {
    use nalgebra::{point, vector};

    use super::*;

    fn settings() -> RenderingSettings {
        RenderingSettings::builder()
            .intensity(10.0, 110.0, 1.0)
            .alpha(10.0, 110.0, 2.0)
            .bounding_box(point![0.0, 0.0, 0.0], vector![8.0, 8.0, 4.0])
            .near_far(-5.0, 5.0)
            .build()
            .unwrap()
    }

    #[test]
    fn transfer_function_ramp() {
        let tf = TransferFunction::new("t", 10.0, 110.0, 1.0).unwrap();
        assert_eq!(tf.map(0.0), 0.0);
        assert_eq!(tf.map(60.0), 0.5);
        assert_eq!(tf.map(500.0), 1.0);

        let tf = TransferFunction::new("t", 0.0, 100.0, 2.0).unwrap();
        assert!((tf.map(25.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn degenerate_range_is_step() {
        let tf = TransferFunction::new("t", 50.0, 50.0, 1.0).unwrap();
        assert_eq!(tf.map(49.9), 0.0);
        assert_eq!(tf.map(50.0), 1.0);
    }

    #[test]
    fn rejects_inverted_range() {
        let err = RenderingSettings::builder()
            .intensity(5.0, 1.0, 1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRange { what: "intensity", .. }));

        let err = RenderingSettings::builder()
            .alpha(5.0, 1.0, 1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRange { what: "alpha", .. }));
    }

    #[test]
    fn rejects_bad_gamma_and_weight() {
        let err = RenderingSettings::builder()
            .intensity(0.0, 1.0, -1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NonPositiveGamma { .. }));

        let err = RenderingSettings::builder().weight(-0.5).build().unwrap_err();
        assert_eq!(err, ConfigError::NegativeWeight(-0.5));

        let err = RenderingSettings::builder()
            .near_far(f32::NAN, 1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NonFinite { what: "near", .. }));
    }

    #[test]
    fn property_roundtrip() {
        let s = settings();
        for p in ChannelProperty::ALL {
            let v = s.property(p);
            assert_eq!(s.with_property(p, v).unwrap(), s, "{p:?}");
        }
    }

    #[test]
    fn property_update_is_validated() {
        let s = settings();
        let updated = s.with_property(ChannelProperty::IntensityMin, 20.0).unwrap();
        assert_eq!(updated.intensity().min(), 20.0);
        assert_eq!(s.intensity().min(), 10.0);

        assert!(s.with_property(ChannelProperty::IntensityMin, 200.0).is_err());
        assert!(s.with_property(ChannelProperty::BoundingBoxXMax, -1.0).is_err());

        let clamped = s.with_property(ChannelProperty::ColorGreen, 400.0).unwrap();
        assert_eq!(clamped.color()[1], 255);
    }

    #[test]
    fn empty_depth_interval() {
        let s = settings().with_property(ChannelProperty::Far, -5.0).unwrap();
        assert!(s.is_clipped_away());
        assert!(!settings().is_clipped_away());
    }
}
