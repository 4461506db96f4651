pub mod descriptor;
pub mod geometry;
pub mod keypoint;
pub mod robust;
pub mod runtime;

pub use descriptor::*;
pub use geometry::*;
pub use keypoint::*;
pub use robust::*;
pub use runtime::*;
