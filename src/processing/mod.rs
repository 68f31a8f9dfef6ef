pub mod blur;
pub mod color;
pub mod filters;
pub mod noise;
pub mod pipeline;
pub mod shadow;
pub mod transform;
