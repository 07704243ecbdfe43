//! Output channel implementations

pub mod confirmed;
pub mod load_balanced;
pub mod raw;
pub mod side_channel;

pub use confirmed::ConfirmedOutput;
pub use load_balanced::LoadBalancedOutput;
pub use raw::RawOutput;
pub use side_channel::RawWithSideChannel;
