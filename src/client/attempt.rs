use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use futures::future::try_join_all;
use tokio::sync::oneshot;

use super::{ApiClient, ClientError};
use crate::{
    db::models::{Question, TestSession},
    models::AnswerInput,
    names,
    services::assessment::Finished,
};

/// The calls a test attempt makes against the server.
#[cfg_attr(test, mockall::automock)]
pub trait AttemptApi: Send + Sync {
    fn submit_answer(
        &self,
        session_id: i64,
        question_id: i64,
        answer: &AnswerInput,
    ) -> impl Future<Output = Result<i64, ClientError>> + Send;

    fn finish(&self, session_id: i64) -> impl Future<Output = Result<Finished, ClientError>> + Send;
}

impl AttemptApi for ApiClient {
    async fn submit_answer(
        &self,
        session_id: i64,
        question_id: i64,
        answer: &AnswerInput,
    ) -> Result<i64, ClientError> {
        ApiClient::submit_answer(self, session_id, question_id, answer).await
    }

    async fn finish(&self, session_id: i64) -> Result<Finished, ClientError> {
        ApiClient::finish(self, session_id).await
    }
}

/// Where the caller should go after an attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Navigation {
    pub path: String,
}

impl Navigation {
    pub fn results(session_id: i64) -> Self {
        Self {
            path: names::results_url(session_id),
        }
    }
}

/// A test being taken: the session, its questions and the answers so far.
#[derive(Clone, Debug)]
pub struct Attempt {
    pub session_id: i64,
    pub questions: Vec<Question>,
    answers: BTreeMap<i64, AnswerInput>,
}

impl Attempt {
    pub fn new(session_id: i64, questions: Vec<Question>) -> Self {
        Self {
            session_id,
            questions,
            answers: BTreeMap::new(),
        }
    }

    /// Record or replace the answer to a question. Unknown questions are ignored.
    pub fn answer(&mut self, question_id: i64, answer: AnswerInput) -> bool {
        if !self.questions.iter().any(|q| q.id == question_id) {
            tracing::warn!(
                "session_id={} has no question_id={question_id}",
                self.session_id
            );
            return false;
        }
        self.answers.insert(question_id, answer);
        true
    }

    pub fn answers(&self) -> &BTreeMap<i64, AnswerInput> {
        &self.answers
    }

    /// Send every answer, then close the session once.
    pub async fn submit<A: AttemptApi>(&self, api: &A) -> Result<Navigation, ClientError> {
        try_join_all(
            self.answers
                .iter()
                .map(|(question_id, answer)| api.submit_answer(self.session_id, *question_id, answer)),
        )
        .await?;

        let finished = api.finish(self.session_id).await?;
        tracing::info!(
            "session_id={} finished as {} with {:.2}",
            finished.session_id,
            finished.status,
            finished.total_score
        );
        Ok(Navigation::results(self.session_id))
    }
}

/// Time left on a session as reported by the server.
pub fn time_left(session: &TestSession) -> Duration {
    Duration::from_secs(session.remaining_seconds.max(0) as u64)
}

/// Submit when the student asks to, or when time runs out, whichever is first.
///
/// Dropping the sender of `submit_signal` without sending leaves only the
/// countdown.
pub async fn run_with_countdown<A: AttemptApi>(
    attempt: &Attempt,
    api: &A,
    time_limit: Duration,
    submit_signal: oneshot::Receiver<()>,
) -> Result<Navigation, ClientError> {
    tokio::select! {
        _ = tokio::time::sleep(time_limit) => {
            tracing::info!("session_id={} ran out of time", attempt.session_id);
        }
        Ok(()) = submit_signal => {
            tracing::debug!("session_id={} submitted", attempt.session_id);
        }
    }

    attempt.submit(api).await
}
