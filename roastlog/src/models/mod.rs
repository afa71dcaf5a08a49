//! Domain models for canonical roast records

mod computed;
mod events;
mod phases;
mod roast;
mod series;

pub use computed::*;
pub use events::*;
pub use phases::*;
pub use roast::*;
pub use series::*;
