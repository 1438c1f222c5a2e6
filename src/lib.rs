// Float and fixed-point micro-kernels for recurrent cell inference
pub mod activation;
pub mod elementwise;
pub mod error;
pub mod fixed_point;
pub mod matmul;
pub mod parallel;
pub mod quantize;
pub mod vector;

// Re-exports for the common entry points
pub use error::{SparseError, SparseResult};
pub use fixed_point::{QuantInt, Requant};
pub use matmul::BlockSparseMatrix;
pub use quantize::{symmetric_quantize, QuantParams};
