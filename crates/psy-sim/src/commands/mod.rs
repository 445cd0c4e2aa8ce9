pub mod design;
pub mod resume;
pub mod simulate;
