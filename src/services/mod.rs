pub mod ai_dispatcher;
pub mod event_bus;
pub mod resolver;

pub use ai_dispatcher::{AiDispatcher, AnswerFormat, BatchRequestItem, BatchResults};
pub use event_bus::{EventBus, ProgressEvent};
pub use resolver::{ChoiceMode, ChoiceResolver, Resolver, SubjectFeedback, TextResolver};
