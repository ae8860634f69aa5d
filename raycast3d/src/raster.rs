//! Rendered image.

use crate::color::Rgb8;

/// RGB24 image, rows top to bottom.
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Raster {
    /// Black image.
    pub fn new(width: usize, height: usize) -> Raster {
        Raster {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    /// Image with every pixel set to `color`.
    pub fn filled(width: usize, height: usize, color: Rgb8) -> Raster {
        let data = color.iter().copied().cycle().take(width * height * 3).collect();
        Raster {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Colour of pixel `(x, y)`, `None` outside the image.
    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 3;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    pub fn pixels(&self) -> impl Iterator<Item = Rgb8> + '_ {
        self.data.chunks_exact(3).map(|p| [p[0], p[1], p[2]])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Keep the buffer, change dimensions. Contents are unspecified afterwards.
    pub(crate) fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.data.resize(width * height * 3, 0);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn filled_pixels() {
        let r = Raster::filled(3, 2, [1, 2, 3]);
        assert_eq!(r.as_bytes().len(), 18);
        assert_eq!(r.pixel(2, 1), Some([1, 2, 3]));
        assert_eq!(r.pixel(3, 0), None);
        assert!(r.pixels().all(|p| p == [1, 2, 3]));
    }

    #[test]
    fn row_major_layout() {
        let mut r = Raster::new(2, 2);
        r.as_bytes_mut()[6..9].copy_from_slice(&[9, 8, 7]);
        assert_eq!(r.pixel(0, 1), Some([9, 8, 7]));
        assert_eq!(r.pixel(1, 0), Some([0, 0, 0]));
    }
}
