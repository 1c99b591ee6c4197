pub mod svg;
pub mod transform;
