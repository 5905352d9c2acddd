mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

use common::{
    bad_request, choice_subject, dispatcher, rate_limited, text_subject, FnAi, MockExamApi,
};
use course_runner::config::ExamSettings;
use course_runner::error::{AppError, ExamError};
use course_runner::models::{ExamKind, SubjectType};
use course_runner::workflow::{ExamEngine, ExamOutcome};

fn settings() -> ExamSettings {
    ExamSettings {
        submit_jitter: Duration::ZERO,
        ..Default::default()
    }
}

fn engine(ai: Arc<FnAi>) -> ExamEngine {
    ExamEngine::new(ExamKind::Exam, 1, "[测验 1]", settings(), dispatcher(ai))
}

fn two_single_choice() -> MockExamApi {
    MockExamApi::new(
        vec![
            choice_subject(1, SubjectType::SingleSelection, 5.0),
            choice_subject(2, SubjectType::SingleSelection, 5.0),
        ],
        &[(1, &[13]), (2, &[24])],
    )
}

#[tokio::test(start_paused = true)]
async fn test_passes_after_first_scoring_submission() {
    let api = MockExamApi::new(
        vec![
            choice_subject(1, SubjectType::SingleSelection, 5.0),
            choice_subject(2, SubjectType::TrueOrFalse, 5.0),
        ],
        &[(1, &[13]), (2, &[23])],
    );
    let ai = FnAi::constant("C");
    let mut engine = engine(ai.clone());

    let outcome = assert_ok!(engine.run(&api).await);

    assert_eq!(
        outcome,
        ExamOutcome::Passed {
            best_score: 10.0,
            threshold: 8.0,
            attempts: 1
        }
    );
    assert_eq!(api.posts(), 1);
    assert_eq!(ai.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_existing_passing_history_submits_nothing() {
    let api = two_single_choice().with_history_score(9.0);
    let ai = FnAi::constant("A");
    let mut engine = engine(ai.clone());

    let outcome = assert_ok!(engine.run(&api).await);

    assert!(matches!(outcome, ExamOutcome::Passed { attempts: 0, .. }));
    assert_eq!(api.posts(), 0);
    assert_eq!(ai.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_exhausts_after_max_retries_plus_one_submissions() {
    let api = two_single_choice();
    let ai = FnAi::constant("A");
    let mut engine = engine(ai);

    let outcome = assert_ok!(engine.run(&api).await);

    assert_eq!(
        outcome,
        ExamOutcome::Exhausted {
            best_score: 0.0,
            threshold: 8.0,
            attempts: 4
        }
    );
    assert_eq!(api.posts(), settings().max_retries as usize + 1);
}

#[tokio::test(start_paused = true)]
async fn test_scored_subject_is_forced_without_asking_ai_again() {
    let api = two_single_choice();
    let second_subject_calls = Arc::new(AtomicUsize::new(0));
    let counter = second_subject_calls.clone();
    let ai = FnAi::new(move |prompt| {
        if prompt.contains("第1题") {
            "C".to_string()
        } else if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            "A".to_string()
        } else {
            "D".to_string()
        }
    });
    let mut engine = engine(ai.clone());

    let outcome = assert_ok!(engine.run(&api).await);

    assert!(matches!(outcome, ExamOutcome::Passed { attempts: 2, .. }));
    let first_subject_prompts = ai
        .prompts()
        .iter()
        .filter(|p| p.contains("第1题"))
        .count();
    assert_eq!(first_subject_prompts, 1);
    assert_eq!(second_subject_calls.load(Ordering::SeqCst), 2);

    let posted = api.posted_answers();
    assert_eq!(posted[1][0].answer_option_ids, vec![13]);
    assert_eq!(posted[1][1].answer_option_ids, vec![24]);
    assert_eq!(api.detail_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_score_never_eliminates_options() {
    let api = two_single_choice();
    let ai = FnAi::constant("A");
    let mut engine = engine(ai.clone());

    assert_ok!(engine.run(&api).await);

    // 每一轮两道题都还要问 AI
    assert_eq!(ai.calls(), 2 * api.posts());
    for prompt in ai.prompts() {
        assert!(prompt.contains("D. 选项4"), "{}", prompt);
    }
}

#[tokio::test(start_paused = true)]
async fn test_multi_select_never_resubmits_a_combination() {
    let api = MockExamApi::new(
        vec![choice_subject(1, SubjectType::MultipleSelection, 10.0)],
        &[(1, &[11, 13])],
    );
    let ai = FnAi::constant("AB");
    let mut engine = engine(ai);

    let outcome = assert_ok!(engine.run(&api).await);
    assert!(matches!(outcome, ExamOutcome::Exhausted { attempts: 4, .. }));

    let combinations: Vec<Vec<u64>> = api
        .posted_answers()
        .iter()
        .map(|answers| answers[0].answer_option_ids.clone())
        .collect();
    let distinct: HashSet<_> = combinations.iter().cloned().collect();
    assert_eq!(combinations.len(), 4);
    assert_eq!(distinct.len(), 4);
    assert_eq!(combinations[0], vec![11, 12]);
}

#[tokio::test(start_paused = true)]
async fn test_free_text_subject_passes() {
    let api = MockExamApi::new(vec![text_subject(1, 10.0)], &[]);
    let ai = FnAi::constant("社会存在决定社会意识");
    let mut engine = engine(ai);

    let outcome = assert_ok!(engine.run(&api).await);

    assert!(matches!(outcome, ExamOutcome::Passed { attempts: 1, .. }));
    assert_eq!(
        api.posted_answers()[0][0].answer.as_deref(),
        Some("社会存在决定社会意识")
    );
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_submission_is_retried_with_backoff() {
    let api = two_single_choice().with_post_errors(vec![rate_limited(), rate_limited()]);
    let ai = FnAi::new(|prompt| {
        let label = if prompt.contains("第1题") { "C" } else { "D" };
        label.to_string()
    });
    let mut engine = engine(ai);

    let started = Instant::now();
    let outcome = assert_ok!(engine.run(&api).await);

    assert!(matches!(outcome, ExamOutcome::Passed { attempts: 1, .. }));
    assert_eq!(api.posts(), 3);
    assert_eq!(api.accepted_submissions(), 1);
    assert!(started.elapsed() >= Duration::from_secs(20));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_gives_up_after_five_retries() {
    let api = two_single_choice().with_post_errors((0..6).map(|_| rate_limited()).collect());
    let mut engine = engine(FnAi::constant("C"));

    let err = assert_err!(engine.run(&api).await);

    assert!(matches!(
        err,
        AppError::Exam(ExamError::SubmitRateLimited { attempts: 5, .. })
    ));
    assert!(!err.is_fatal());
    assert_eq!(api.posts(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_bad_request_aborts_without_retry() {
    let api = two_single_choice().with_post_errors(vec![bad_request()]);
    let mut engine = engine(FnAi::constant("C"));

    let err = assert_err!(engine.run(&api).await);

    assert!(err.is_fatal());
    assert_eq!(api.posts(), 1);
    assert_eq!(api.accepted_submissions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_attempt_token_is_fatal() {
    let api = two_single_choice().without_token();
    let mut engine = engine(FnAi::constant("C"));

    let err = assert_err!(engine.run(&api).await);

    assert!(matches!(
        err,
        AppError::Exam(ExamError::MissingAttemptToken { exam_id: 1 })
    ));
    assert!(err.is_fatal());
    assert_eq!(api.posts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_pending_grading() {
    let api = two_single_choice().with_history_score(9.0).with_grading_delay(2);
    let mut engine = engine(FnAi::constant("C"));

    let started = Instant::now();
    let outcome = assert_ok!(engine.run(&api).await);

    assert!(matches!(outcome, ExamOutcome::Passed { attempts: 0, .. }));
    assert_eq!(api.history_calls.load(Ordering::SeqCst), 3);
    assert!(started.elapsed() >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_preflight_skips_unsupported_types() {
    let api = MockExamApi::new(
        vec![
            choice_subject(1, SubjectType::SingleSelection, 5.0),
            choice_subject(2, SubjectType::Unsupported, 5.0),
        ],
        &[],
    );
    let mut engine = engine(FnAi::constant("A"));

    let reason = assert_ok!(engine.preflight(&api).await);
    assert!(reason.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_preflight_skips_papers_without_questions_to_answer() {
    let api = MockExamApi::new(vec![choice_subject(1, SubjectType::Text, 0.0)], &[]);
    let mut engine = engine(FnAi::constant("A"));

    let reason = assert_ok!(engine.preflight(&api).await);
    assert!(reason.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_preflight_then_run() {
    let api = two_single_choice();
    let mut engine = engine(FnAi::new(|prompt| {
        let label = if prompt.contains("第1题") { "C" } else { "D" };
        label.to_string()
    }));

    assert_eq!(assert_ok!(engine.preflight(&api).await), None);
    let outcome = assert_ok!(engine.run(&api).await);
    assert!(matches!(outcome, ExamOutcome::Passed { attempts: 1, .. }));
}
