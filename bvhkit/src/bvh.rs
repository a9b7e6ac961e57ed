mod boundable;
mod builder;
mod builders;
mod error;
mod node;
mod printer;

pub use self::boundable::*;
pub use self::builder::*;
pub use self::builders::*;
pub use self::error::*;
pub use self::node::*;
pub use self::printer::*;
