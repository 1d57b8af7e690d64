pub mod error;
pub mod markup;
pub mod result;

pub use error::*;
pub use markup::*;
pub use result::*;
