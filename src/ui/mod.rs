pub mod icons;
pub mod progress;

pub use progress::{BuildUI, status_lines};
