pub mod stitch;
pub mod tempo;
