//! Volume to output raster mapping.

use nalgebra::{point, vector, Matrix4, Point3, Rotation3, Unit, Vector3, Vector4};

use crate::{common::Ray, error::ConfigError};

/// Composition of voxel scaling, a user transformation about the rotation
/// centre and output pixel scaling.
///
/// `forward = S_out^-1 * T(c) * M * T(-c) * S_in`
///
/// * `S_in` - voxel to world, by input spacing
/// * `M` - user transformation (rotation, translation, zoom), world units
/// * `c` - rotation centre, world units
/// * `S_out` - output pixel to world, by output spacing
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedTransform {
    input_spacing: Vector3<f32>,
    output_spacing: Vector3<f32>,
    center: Point3<f32>,
    transformation: Matrix4<f32>,
    inverse_transformation: Matrix4<f32>,
}

impl CombinedTransform {
    pub fn new(
        input_spacing: Vector3<f32>,
        output_spacing: Vector3<f32>,
        center: Point3<f32>,
    ) -> Result<Self, ConfigError> {
        check_spacing(&input_spacing)?;
        check_spacing(&output_spacing)?;
        Ok(Self {
            input_spacing,
            output_spacing,
            center,
            transformation: Matrix4::identity(),
            inverse_transformation: Matrix4::identity(),
        })
    }

    /// Transform for a volume of `size` voxels rendered into `target` pixels.
    ///
    /// The whole xy extent of the volume fills the target, depth spacing is
    /// kept, rotation centre is the volume centre.
    pub fn for_volume(
        size: Vector3<usize>,
        input_spacing: Vector3<f32>,
        target: (usize, usize),
    ) -> Result<Self, ConfigError> {
        let output_spacing = fov_spacing(size, input_spacing, target, input_spacing.z)?;
        let center = point![
            size.x as f32 * input_spacing.x / 2.0,
            size.y as f32 * input_spacing.y / 2.0,
            size.z as f32 * input_spacing.z / 2.0
        ];
        Self::new(input_spacing, output_spacing, center)
    }

    pub fn input_spacing(&self) -> Vector3<f32> {
        self.input_spacing
    }

    pub fn output_spacing(&self) -> Vector3<f32> {
        self.output_spacing
    }

    pub fn set_output_spacing(&mut self, spacing: Vector3<f32>) -> Result<(), ConfigError> {
        check_spacing(&spacing)?;
        self.output_spacing = spacing;
        Ok(())
    }

    /// Recompute xy output spacing so that `size` voxels still span the
    /// whole `target`. Depth spacing is preserved.
    pub fn adjust_output_spacing(
        &mut self,
        size: Vector3<usize>,
        target: (usize, usize),
    ) -> Result<(), ConfigError> {
        let spacing = fov_spacing(size, self.input_spacing, target, self.output_spacing.z)?;
        self.output_spacing = spacing;
        Ok(())
    }

    pub fn center(&self) -> Point3<f32> {
        self.center
    }

    /// User transformation, applied about the rotation centre.
    pub fn transformation(&self) -> &Matrix4<f32> {
        &self.transformation
    }

    pub fn set_transformation(&mut self, m: Matrix4<f32>) -> Result<(), ConfigError> {
        if m.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::SingularTransform);
        }
        let inverse = m.try_inverse().ok_or(ConfigError::SingularTransform)?;
        self.transformation = m;
        self.inverse_transformation = inverse;
        Ok(())
    }

    /// Rotate by `angle` radians around `axis` (world axes, through the centre).
    pub fn rotate(&mut self, axis: Vector3<f32>, angle: f32) -> Result<(), ConfigError> {
        let axis = Unit::try_new(axis, f32::EPSILON).ok_or(ConfigError::SingularTransform)?;
        let r = Rotation3::from_axis_angle(&axis, angle).to_homogeneous();
        let r_inv = Rotation3::from_axis_angle(&axis, -angle).to_homogeneous();
        self.transformation = r * self.transformation;
        self.inverse_transformation *= r_inv;
        Ok(())
    }

    /// Translate, world units.
    pub fn translate(&mut self, delta: Vector3<f32>) {
        self.transformation = Matrix4::new_translation(&delta) * self.transformation;
        self.inverse_transformation *= Matrix4::new_translation(&-delta);
    }

    /// Uniform scaling about the centre.
    pub fn zoom(&mut self, factor: f32) -> Result<(), ConfigError> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ConfigError::SingularTransform);
        }
        self.transformation = Matrix4::new_scaling(factor) * self.transformation;
        self.inverse_transformation *= Matrix4::new_scaling(1.0 / factor);
        Ok(())
    }

    /// Drop the user transformation.
    pub fn reset(&mut self) {
        self.transformation = Matrix4::identity();
        self.inverse_transformation = Matrix4::identity();
    }

    /// Voxel coordinates to output coordinates.
    pub fn forward(&self) -> Matrix4<f32> {
        let c = self.center.coords;
        let s_out_inv = Matrix4::new_nonuniform_scaling(&self.output_spacing.map(|v| 1.0 / v));
        let s_in = Matrix4::new_nonuniform_scaling(&self.input_spacing);
        s_out_inv
            * Matrix4::new_translation(&c)
            * self.transformation
            * Matrix4::new_translation(&-c)
            * s_in
    }

    /// Output coordinates to voxel coordinates.
    pub fn inverse(&self) -> Matrix4<f32> {
        let c = self.center.coords;
        let s_in_inv = Matrix4::new_nonuniform_scaling(&self.input_spacing.map(|v| 1.0 / v));
        let s_out = Matrix4::new_nonuniform_scaling(&self.output_spacing);
        s_in_inv
            * Matrix4::new_translation(&c)
            * self.inverse_transformation
            * Matrix4::new_translation(&-c)
            * s_out
    }

    /// Orthographic ray through the centre of output pixel `(x, y)`.
    ///
    /// Ray parameter is output depth in world units.
    pub fn ray(&self, inverse: &Matrix4<f32>, x: usize, y: usize) -> Ray {
        let o = inverse * Vector4::new(x as f32 + 0.5, y as f32 + 0.5, 0.0, 1.0);
        let d = inverse * Vector4::new(0.0, 0.0, 1.0 / self.output_spacing.z, 0.0);
        Ray::new(point![o.x, o.y, o.z], vector![d.x, d.y, d.z])
    }

    /// Unit viewing direction expressed in the (untransformed) world frame
    /// of the volume.
    pub fn view_direction(&self) -> Vector3<f32> {
        let d = self.inverse_transformation * Vector4::new(0.0, 0.0, 1.0, 0.0);
        let d = vector![d.x, d.y, d.z];
        let n = d.norm();
        if n > 0.0 {
            d / n
        } else {
            vector![0.0, 0.0, 1.0]
        }
    }

    /// Physical extent of a `target` raster, world units.
    pub fn field_of_view(&self, target: (usize, usize)) -> (f32, f32) {
        (
            self.output_spacing.x * target.0 as f32,
            self.output_spacing.y * target.1 as f32,
        )
    }
}

fn fov_spacing(
    size: Vector3<usize>,
    input_spacing: Vector3<f32>,
    target: (usize, usize),
    depth: f32,
) -> Result<Vector3<f32>, ConfigError> {
    let (width, height) = target;
    if width == 0 || height == 0 {
        return Err(ConfigError::InvalidTargetSize { width, height });
    }
    let spacing = vector![
        size.x as f32 * input_spacing.x / width as f32,
        size.y as f32 * input_spacing.y / height as f32,
        depth
    ];
    check_spacing(&spacing)?;
    Ok(spacing)
}

fn check_spacing(spacing: &Vector3<f32>) -> Result<(), ConfigError> {
    for &v in spacing.iter() {
        if !v.is_finite() {
            return Err(ConfigError::NonFinite {
                what: "spacing",
                value: v,
            });
        }
        if v <= 0.0 {
            return Err(ConfigError::SingularTransform);
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::f32::consts::FRAC_PI_2;

    use nalgebra::Point3;

    use super::*;

    fn transform() -> CombinedTransform {
        CombinedTransform::for_volume(vector![64, 64, 32], vector![1.0, 1.0, 2.0], (128, 32))
            .unwrap()
    }

    fn apply(m: &Matrix4<f32>, p: Point3<f32>) -> Point3<f32> {
        m.transform_point(&p)
    }

    #[test]
    fn output_spacing_from_fov() {
        let t = transform();
        assert_eq!(t.output_spacing(), vector![0.5, 2.0, 2.0]);
        assert_eq!(t.center(), point![32.0, 32.0, 32.0]);
    }

    #[test]
    fn forward_maps_volume_onto_target() {
        let t = transform();
        let fwd = t.forward();
        assert_eq!(apply(&fwd, point![0.0, 0.0, 0.0]), point![0.0, 0.0, 0.0]);
        assert_eq!(apply(&fwd, point![64.0, 64.0, 32.0]), point![128.0, 32.0, 32.0]);
    }

    #[test]
    fn inverse_is_inverse() {
        let mut t = transform();
        t.rotate(vector![0.0, 1.0, 0.0], 0.7).unwrap();
        t.translate(vector![3.0, -2.0, 1.0]);
        t.zoom(1.5).unwrap();

        let roundtrip = t.inverse() * t.forward();
        assert!((roundtrip - Matrix4::identity()).norm() < 1e-4);
    }

    #[test]
    fn rotation_about_center() {
        let mut t = transform();
        t.rotate(vector![0.0, 0.0, 1.0], FRAC_PI_2).unwrap();
        // centre voxel stays in place
        let c = apply(&t.forward(), point![32.0, 32.0, 16.0]);
        assert!((c - point![64.0, 16.0, 16.0]).norm() < 1e-4);
    }

    #[test]
    fn ray_through_pixel() {
        let t = CombinedTransform::for_volume(vector![4, 4, 4], vector![1.0, 1.0, 1.0], (4, 4))
            .unwrap();
        let ray = t.ray(&t.inverse(), 1, 2);
        assert_eq!(ray.origin, point![1.5, 2.5, 0.0]);
        assert_eq!(ray.direction, vector![0.0, 0.0, 1.0]);
        assert_eq!(t.view_direction(), vector![0.0, 0.0, 1.0]);
    }

    #[test]
    fn resize_keeps_depth_and_fov() {
        let mut t = transform();
        let fov = t.field_of_view((128, 32));
        t.adjust_output_spacing(vector![64, 64, 32], (100, 77)).unwrap();
        let new_fov = t.field_of_view((100, 77));
        assert!((fov.0 - new_fov.0).abs() < 1e-3);
        assert!((fov.1 - new_fov.1).abs() < 1e-3);
        assert_eq!(t.output_spacing().z, 2.0);
    }

    #[test]
    fn rejects_degenerate_input() {
        assert!(CombinedTransform::for_volume(vector![4, 4, 4], vector![1.0, 0.0, 1.0], (4, 4))
            .is_err());
        let mut t = transform();
        assert_eq!(
            t.adjust_output_spacing(vector![4, 4, 4], (0, 4)),
            Err(ConfigError::InvalidTargetSize {
                width: 0,
                height: 4
            })
        );
        assert!(t.zoom(0.0).is_err());
        assert!(t.set_transformation(Matrix4::zeros()).is_err());
    }
}
