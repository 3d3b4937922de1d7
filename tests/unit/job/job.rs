use super::*;

#[test]
fn happy_path_is_monotonic() {
    let mut job = CompositionJob::new(CancelToken::new());
    for s in [
        JobState::Loading,
        JobState::Encoding,
        JobState::Muxing,
        JobState::Done,
    ] {
        job.transition(s).unwrap();
    }
    assert_eq!(job.state(), JobState::Done);
    assert_eq!(job.history().len(), 5);
}

#[test]
fn terminal_states_are_final() {
    let mut job = CompositionJob::new(CancelToken::new());
    job.transition(JobState::Loading).unwrap();
    job.transition(JobState::Aborted).unwrap();
    assert!(job.transition(JobState::Encoding).is_err());
    assert!(job.transition(JobState::Done).is_err());
    assert!(job.transition(JobState::Failed).is_err());
}

#[test]
fn backwards_and_skipping_to_done_are_rejected() {
    let mut job = CompositionJob::new(CancelToken::new());
    job.transition(JobState::Encoding).unwrap();
    assert!(job.transition(JobState::Loading).is_err());
    assert!(job.transition(JobState::Done).is_err());
    job.transition(JobState::Failed).unwrap();
}

#[test]
fn cancel_is_shared_and_idempotent() {
    let token = CancelToken::new();
    let job = CompositionJob::new(token.clone());
    assert!(job.checkpoint().is_ok());
    token.cancel();
    token.cancel();
    assert!(matches!(job.checkpoint(), Err(ReelError::Cancelled)));
    assert!(job.cancel_token().is_cancelled());
}

#[test]
fn output_bytes_accumulate() {
    let mut job = CompositionJob::new(CancelToken::new());
    job.add_output_bytes(10);
    job.add_output_bytes(u64::MAX);
    assert_eq!(job.output_bytes(), u64::MAX);
    job.clear_output_bytes();
    assert_eq!(job.output_bytes(), 0);
}
