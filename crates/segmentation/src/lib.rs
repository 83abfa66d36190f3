//! Rule-based customer segmentation.
//!
//! Conditions are evaluated against typed customer fields and combined with
//! AND over one owner's customers. Also home to RFM scoring and storage.

pub mod builder;
pub mod engine;
pub mod fields;
pub mod predicates;
pub mod scoring;
pub mod seed;
pub mod store;

pub use builder::SegmentBuilder;
pub use engine::{Segment, SegmentDraft, SegmentUpdate};
pub use fields::CustomerField;
pub use predicates::{Condition, Operator};
pub use store::{AudienceStore, CustomerStats};
