pub mod answer;
pub mod document;
pub mod job;
pub mod section;
pub mod summary;

pub use answer::{Answer, SectionOutcome, ValidationResult};
pub use document::{Block, Cell, Document, ParagraphStyle, Segment, TextRun};
pub use job::{CompletionJob, JobResult, JobStatus, ProcessingMetadata, SubscriptionTier};
pub use section::{BlankKind, ContentType, LocationHandle, Section};
pub use summary::{ConfidenceBucket, SectionDetail, ValidationSummary};
