//! Mouse tracking and the damped orbit camera controller.

mod mouse;
mod orbit_controls;

pub use mouse::MouseState;
pub use orbit_controls::{OrbitControls, OrbitSettings, Spherical};
