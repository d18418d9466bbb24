pub mod capture;
pub mod error;
pub mod layout;
pub mod sample;
pub mod spectrum;

pub use capture::*;
pub use error::*;
pub use layout::*;
pub use sample::*;
pub use spectrum::*;
