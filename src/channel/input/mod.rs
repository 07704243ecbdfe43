//! Input channel implementations

pub mod confirmed;
pub mod load_balanced;

pub use confirmed::ConfirmedInput;
pub use load_balanced::LoadBalancedInput;
