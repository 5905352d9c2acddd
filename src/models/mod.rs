pub mod activity;
pub mod exam;
pub mod subject;

pub use activity::{ActivityType, CourseActivity, CourseGroup, Progress};
pub use exam::{
    AnsweredSubject, Distribution, ExamKind, ExamSession, SubmissionDetail, SubmissionList,
    SubmissionSummary, SubmittedAnswer,
};
pub use subject::{AnswerShape, Subject, SubjectOption, SubjectType};
