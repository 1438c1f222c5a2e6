//! Gate nonlinearities: int16 fixed-point approximations plus their float
//! counterparts.

pub mod fixed;
pub mod float;
pub mod layer_norm;

pub use fixed::{apply_sigmoid, apply_tanh, apply_tanh3, apply_tanh4};
pub use float::{apply_activation_to_vector, apply_sigmoid_to_vector, Activation};
pub use layer_norm::apply_layer_norm;
