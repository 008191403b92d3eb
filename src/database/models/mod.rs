pub mod embedding;
pub mod image;
pub mod migration;
pub mod provider;
pub mod queue;
pub mod setting;
pub mod tag;

pub use embedding::*;
pub use image::*;
pub use migration::*;
pub use provider::*;
pub use queue::*;
pub use setting::*;
pub use tag::*;
