/*
    raycast3d
    Colour helpers
*/

use nalgebra::{vector, Vector3};

/// Linear colour, components in <0;1>.
pub type RGB = Vector3<f32>;

/// Display colour, one byte per component.
pub type Rgb8 = [u8; 3];

pub const BLACK: Rgb8 = [0, 0, 0];
pub const WHITE: Rgb8 = [255, 255, 255];

pub fn new(r: f32, g: f32, b: f32) -> RGB {
    vector![r, g, b]
}

pub fn zero() -> RGB {
    vector![0.0, 0.0, 0.0]
}

pub fn mono(v: f32) -> RGB {
    vector![v, v, v]
}

/// Byte colour to <0;1> range.
pub fn from_rgb8(c: Rgb8) -> RGB {
    vector![c[0] as f32, c[1] as f32, c[2] as f32] / 255.0
}

/// <0;1> colour to bytes, out of range components are clamped.
pub fn to_rgb8(c: &RGB) -> Rgb8 {
    let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [q(c.x), q(c.y), q(c.z)]
}

/// Colour with components in <0;255> given as floats, for example
/// produced by interpolating two keyframes. Components are clamped.
pub fn clamp_rgb8(r: f32, g: f32, b: f32) -> Rgb8 {
    let q = |v: f32| v.clamp(0.0, 255.0).round() as u8;
    [q(r), q(g), q(b)]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn byte_conversion() {
        let c = from_rgb8([255, 0, 51]);
        assert_eq!(c, new(1.0, 0.0, 0.2));
        assert_eq!(to_rgb8(&c), [255, 0, 51]);
    }

    #[test]
    fn clamps() {
        assert_eq!(to_rgb8(&new(1.5, -0.2, 0.5)), [255, 0, 128]);
        assert_eq!(clamp_rgb8(300.0, -4.0, 17.4), [255, 0, 17]);
    }
}
