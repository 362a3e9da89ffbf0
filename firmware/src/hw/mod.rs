//! Board drivers behind the controller's peripheral seams.

pub mod analog;
pub mod ds1307;
pub mod vfd;
