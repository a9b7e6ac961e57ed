mod aac;
mod binned_sah;
mod bottom_up_sah;

pub use self::aac::*;
pub use self::binned_sah::*;
pub use self::bottom_up_sah::*;
