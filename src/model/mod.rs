pub mod element;
pub mod inbox;
pub mod mask;
pub mod spec;
pub mod status;

pub use element::Element;
pub use inbox::InboxElement;
pub use mask::Mask;
pub use spec::{EndPolicyName, Spec, SpecTask, StartPolicyName};
pub use status::Status;
