pub mod local;
pub mod markers;
pub mod props;

pub use local::{LocalModule, ModuleRoot};
pub use markers::MarkerChange;
