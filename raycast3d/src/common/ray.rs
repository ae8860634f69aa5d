use nalgebra::{Point3, Vector3};

/// Ray through the volume, in voxel coordinates.
///
/// Parameter `t` is depth along the viewing axis in world units, so
/// `t` values are directly comparable with near / far clip distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Voxel position at `t = 0`
    pub origin: Point3<f32>,
    /// Voxel displacement per world unit of depth, not normalized
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Ray {
        Ray { origin, direction }
    }

    /// Returns point at depth `t`
    pub fn point_from_t(&self, t: f32) -> Point3<f32> {
        self.origin + t * self.direction
    }
}

#[cfg(test)]
mod test {

    use nalgebra::{point, vector};

    use super::*;

    #[test]
    fn point_at_depth() {
        let ray = Ray::new(point![1.0, 2.0, 0.0], vector![0.0, 0.0, 0.5]);

        assert_eq!(ray.point_from_t(0.0), point![1.0, 2.0, 0.0]);
        assert_eq!(ray.point_from_t(4.0), point![1.0, 2.0, 2.0]);
    }
}
