use serde::{Deserialize, Serialize};

/// Fused float activation applied after a gate's matmul.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    None,
    Relu,
    ReluN1To1,
    Relu6,
    Tanh,
    /// 1.0 when the sign bit is set (including -0.0), else 0.0.
    SignBit,
    Sigmoid,
}

impl Activation {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::None => x,
            Activation::Relu => x.max(0.0),
            Activation::ReluN1To1 => x.clamp(-1.0, 1.0),
            Activation::Relu6 => x.clamp(0.0, 6.0),
            Activation::Tanh => x.tanh(),
            Activation::SignBit => {
                if x.is_sign_negative() { 1.0 } else { 0.0 }
            }
            Activation::Sigmoid => sigmoid(x),
        }
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 { 1.0 / (1.0 + (-x).exp()) }

pub fn apply_activation_to_vector(vector: &[f32], activation: Activation, result: &mut [f32]) {
    for (r, &v) in result.iter_mut().zip(vector) { *r = activation.apply(v); }
}

pub fn apply_sigmoid_to_vector(vector: &[f32], result: &mut [f32]) {
    for (r, &v) in result.iter_mut().zip(vector) { *r = sigmoid(v); }
}
