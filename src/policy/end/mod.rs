pub mod single_shot;

pub use single_shot::{single_shot, EndPolicyOutcome};
