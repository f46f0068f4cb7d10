pub mod alerts;
pub mod anomaly;
pub mod geo;
pub mod model;
pub mod risk;

pub use alerts::*;
pub use anomaly::*;
pub use geo::*;
pub use model::*;
pub use risk::*;
