pub mod clock;
pub mod path;
pub mod telemetry;

pub use clock::*;
pub use path::*;
pub use telemetry::*;
