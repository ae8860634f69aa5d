use nalgebra::{point, Point3, Vector3};

use super::Ray;

/// Axis aligned box in voxel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundBox {
    pub lower: Point3<f32>,
    pub upper: Point3<f32>,
}

impl BoundBox {
    pub fn new(lower: Point3<f32>, upper: Point3<f32>) -> BoundBox {
        BoundBox { lower, upper }
    }

    /// Zero sized boundbox
    pub fn empty() -> BoundBox {
        BoundBox {
            lower: point![0.0, 0.0, 0.0],
            upper: point![0.0, 0.0, 0.0],
        }
    }

    pub fn from_position_dims(position: Point3<f32>, dimensions: Vector3<f32>) -> BoundBox {
        BoundBox {
            lower: position,
            upper: position + dimensions,
        }
    }

    pub fn dims(&self) -> Vector3<f32> {
        self.upper - self.lower
    }

    /// Overlap of two boxes, `None` if they do not overlap.
    pub fn intersection(&self, other: &BoundBox) -> Option<BoundBox> {
        let lower = Point3::from(self.lower.coords.sup(&other.lower.coords));
        let upper = Point3::from(self.upper.coords.inf(&other.upper.coords));
        if lower.x < upper.x && lower.y < upper.y && lower.z < upper.z {
            Some(BoundBox { lower, upper })
        } else {
            None
        }
    }

    /// Parameter interval `(t_in, t_out)` of the ray inside the box.
    ///
    /// Unlike a camera ray test, intervals behind the ray origin are kept,
    /// clipping against near / far is the caller's business.
    pub fn intersect(&self, ray: &Ray) -> Option<(f32, f32)> {
        // Source: An Efficient and Robust Ray–Box Intersection Algorithm. Amy Williams et al. 2004.
        let mut tmin = f32::NEG_INFINITY;
        let mut tmax = f32::INFINITY;

        for axis in 0..3 {
            let o = ray.origin[axis];
            let d = ray.direction[axis];
            let (lo, hi) = (self.lower[axis], self.upper[axis]);

            if d == 0.0 {
                // parallel to the slab
                if o < lo || o >= hi {
                    return None;
                }
                continue;
            }

            let t0 = (lo - o) / d;
            let t1 = (hi - o) / d;
            let (near, far) = if t0 < t1 { (t0, t1) } else { (t1, t0) };
            tmin = f32::max(tmin, near);
            tmax = f32::min(tmax, far);
        }

        if tmin >= tmax {
            return None;
        }

        Some((tmin, tmax))
    }
}

#[cfg(test)]
mod test {

    use nalgebra::vector;

    use super::*;

    fn unit_box() -> BoundBox {
        BoundBox::new(point![0.0, 0.0, 0.0], point![1.0, 1.0, 1.0])
    }

    #[test]
    fn intersect_works() {
        let ray = Ray::new(point![-1.0, -1.0, -0.5], vector![1.0, 1.0, 1.0]);
        let inter = unit_box().intersect(&ray);
        assert_eq!(inter, Some((1.0, 1.5)));
    }

    #[test]
    fn axis_parallel_ray() {
        let ray = Ray::new(point![0.5, 0.5, -3.0], vector![0.0, 0.0, 0.5]);
        assert_eq!(unit_box().intersect(&ray), Some((6.0, 8.0)));

        let outside = Ray::new(point![1.5, 0.5, -3.0], vector![0.0, 0.0, 0.5]);
        assert_eq!(unit_box().intersect(&outside), None);
    }

    #[test]
    fn keeps_interval_behind_origin() {
        let ray = Ray::new(point![0.5, 0.5, 5.0], vector![0.0, 0.0, 1.0]);
        assert_eq!(unit_box().intersect(&ray), Some((-5.0, -4.0)));
    }

    #[test]
    fn not_intersecting() {
        let ray = Ray::new(point![200.0, 200.0, 200.0], vector![1.0, 0.0, 0.0]);
        assert!(unit_box().intersect(&ray).is_none());
    }

    #[test]
    fn box_overlap() {
        let a = unit_box();
        let b = BoundBox::from_position_dims(point![0.5, 0.5, 0.5], vector![2.0, 2.0, 2.0]);
        let o = a.intersection(&b).unwrap();
        assert_eq!(o.lower, point![0.5, 0.5, 0.5]);
        assert_eq!(o.upper, point![1.0, 1.0, 1.0]);

        let far = BoundBox::from_position_dims(point![3.0, 0.0, 0.0], vector![1.0, 1.0, 1.0]);
        assert!(a.intersection(&far).is_none());
    }
}
