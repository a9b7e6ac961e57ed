mod axis;
mod bounding_box;
mod metrics;
mod sah;

pub use self::axis::*;
pub use self::bounding_box::*;
pub use self::metrics::*;
pub use self::sah::*;
