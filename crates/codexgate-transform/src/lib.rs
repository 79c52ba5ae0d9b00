pub mod error_remap;
pub mod input;
pub mod model;
pub mod reasoning;
pub mod request;
pub mod stream2nostream;
