mod bound_box;
mod ray;
mod value_range;

pub use bound_box::BoundBox;
pub use ray::Ray;
pub use value_range::ValueRange;
