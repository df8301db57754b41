use color_eyre::{eyre::OptionExt, Result};
use serde::{Deserialize, Serialize};

use super::{analytics, Outcome, Refusal};
use crate::db::{
    models::{
        Answer, CategoryPoints, CognitiveTest, PerformanceSummary, Question, TestResult,
        TestSession, User,
    },
    Completion, Db, LevelStep,
};
use crate::models::{
    AnswerInput, GradeSubmission, NewTest, QuestionInput, QuestionType, Role, SessionStatus,
    TestType, TestUpdate,
};
use crate::names::{MAX_LEVEL, MIN_LEVEL};

const PENDING_LIST_LIMIT: i64 = 500;
const HISTORY_LIMIT: i64 = 500;

// ---------------------------------------------------------------------------
// Scoring and level rules
// ---------------------------------------------------------------------------

/// Auto-graded answers and the resulting session score.
#[derive(Debug, PartialEq)]
pub struct AutoScore {
    /// `(answer_id, score_earned)` for every mcq answer with a selected choice.
    pub graded: Vec<(i64, f64)>,
    pub total_score: f64,
}

/// Grade the multiple-choice answers of a session. Text answers are left for review.
pub fn auto_score(answers: &[Answer], total_points: i64) -> AutoScore {
    let graded: Vec<(i64, f64)> = answers
        .iter()
        .filter(|a| a.question_type == QuestionType::Mcq && a.selected_choice.is_some())
        .map(|a| {
            let earned = if a.selected_choice_correct == Some(true) {
                a.points as f64
            } else {
                0.0
            };
            (a.id, earned)
        })
        .collect();

    let earned: f64 = graded.iter().map(|(_, score)| score).sum();
    AutoScore {
        graded,
        total_score: percentage(earned, total_points as f64),
    }
}

pub fn percentage(earned: f64, possible: f64) -> f64 {
    if possible > 0.0 {
        earned / possible * 100.0
    } else {
        0.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LevelUpdate {
    pub new_level: i64,
    pub reason: String,
    pub placement: bool,
}

/// The level a student moves to after completing `test` with `score`, if any.
pub fn level_after(test: &CognitiveTest, score: f64, old_level: i64) -> Option<LevelUpdate> {
    if test.test_type == TestType::Placement {
        return Some(LevelUpdate {
            new_level: (score.trunc() as i64).clamp(MIN_LEVEL, MAX_LEVEL),
            reason: "Placement test".to_string(),
            placement: true,
        });
    }

    if score < test.passing_score as f64 || test.target_level < old_level - 10 {
        return None;
    }

    let increment = if score >= 90.0 { 5 } else { 2 };
    let new_level = (old_level + increment).min(MAX_LEVEL);
    (new_level != old_level).then(|| LevelUpdate {
        new_level,
        reason: format!("Passed test {}", test.title),
        placement: false,
    })
}

/// What `owner` completing `test` with `score` changes: level, placement
/// flag and running summary, plus warnings for weak categories.
pub fn completion_for(
    test: &CognitiveTest,
    owner: &User,
    score: f64,
    mut summary: PerformanceSummary,
    points: &[CategoryPoints],
) -> Completion {
    let mut completion = Completion::default();

    if owner.is_student() {
        let old_level = owner.level();
        if let Some(update) = level_after(test, score, old_level) {
            completion.placement = update.placement;
            if update.new_level != old_level || update.placement {
                completion.level = Some(LevelStep {
                    old_level,
                    new_level: update.new_level,
                    reason: update.reason,
                });
            }
        }
    }

    completion.notifications = analytics::apply_session(&mut summary, points)
        .into_iter()
        .map(|(category, score)| analytics::low_score_message(category, score))
        .collect();
    completion.summary = summary;
    completion
}

// ---------------------------------------------------------------------------
// Presence checks
// ---------------------------------------------------------------------------

pub fn validate_question(question: &QuestionInput) -> std::result::Result<(), &'static str> {
    if question.text.trim().is_empty() {
        return Err("question text is required");
    }
    if question.points <= 0 {
        return Err("points must be positive");
    }
    if question.question_type == QuestionType::Mcq {
        if question.choices.len() < 2 {
            return Err("a multiple choice question needs at least two choices");
        }
        if question.choices.iter().any(|c| c.text.trim().is_empty()) {
            return Err("choice text is required");
        }
        if question.choices.iter().filter(|c| c.is_correct).count() != 1 {
            return Err("exactly one choice must be correct");
        }
    }
    Ok(())
}

fn valid_level(level: i64) -> bool {
    (MIN_LEVEL..=MAX_LEVEL).contains(&level)
}

fn validate_settings(
    min_level: i64,
    target_level: i64,
    time_limit_minutes: i64,
    passing_score: i64,
) -> std::result::Result<(), &'static str> {
    if !valid_level(min_level) || !valid_level(target_level) {
        return Err("levels must be between 1 and 100");
    }
    if time_limit_minutes <= 0 {
        return Err("time limit must be positive");
    }
    if !(0..=100).contains(&passing_score) {
        return Err("passing score must be between 0 and 100");
    }
    Ok(())
}

pub fn validate_new_test(test: &NewTest) -> std::result::Result<(), &'static str> {
    if test.title.trim().is_empty() {
        return Err("title is required");
    }
    if test.questions.is_empty() {
        return Err("at least one question is required");
    }
    validate_settings(
        test.min_level,
        test.target_level,
        test.time_limit_minutes,
        test.passing_score,
    )?;

    let mut positions = std::collections::HashSet::new();
    for (idx, question) in test.questions.iter().enumerate() {
        validate_question(question)?;
        if !positions.insert(question.order.unwrap_or(idx as i64 + 1)) {
            return Err("question order must be unique");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Results returned to handlers
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestDetail {
    #[serde(flatten)]
    pub test: CognitiveTest,
    pub questions: Vec<Question>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Started {
    pub session: TestSession,
    pub created: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentTest {
    pub test: CognitiveTest,
    pub created: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Finished {
    pub session_id: i64,
    pub status: SessionStatus,
    pub total_score: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionDetail {
    pub session: TestSession,
    pub answers: Vec<Answer>,
}

// ---------------------------------------------------------------------------
// AssessmentService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AssessmentService {
    db: Db,
}

impl AssessmentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Admins, the test's creator, and the author of its related content may manage a test.
    pub async fn can_manage(&self, user: &User, test: &CognitiveTest) -> Result<bool> {
        if user.role == Role::Admin || test.created_by == Some(user.id) {
            return Ok(true);
        }
        let author = self.db.related_content_author(test.id).await?;
        Ok(author == Some(user.id))
    }

    async fn managed_test(&self, user: &User, test_id: i64) -> Result<Outcome<CognitiveTest>> {
        let Some(test) = self.db.get_test(test_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if !self.can_manage(user, &test).await? {
            tracing::warn!("user_id={} may not manage test_id={test_id}", user.id);
            return Ok(Err(Refusal::Forbidden));
        }
        Ok(Ok(test))
    }

    // -----------------------------------------------------------------------
    // Test management
    // -----------------------------------------------------------------------

    pub async fn all_tests(&self) -> Result<Vec<CognitiveTest>> {
        self.db.all_tests().await
    }

    pub async fn create_test(
        &self,
        user: &User,
        mut test: NewTest,
        placement: bool,
    ) -> Result<Outcome<CognitiveTest>> {
        if placement {
            test.test_type = TestType::Placement;
        }
        if let Err(msg) = validate_new_test(&test) {
            return Ok(Err(Refusal::Invalid(msg)));
        }

        let test_id = self.db.create_test(&test, Some(user.id), None).await?;
        let created = self
            .db
            .get_test(test_id)
            .await?
            .ok_or_eyre("test missing after insert")?;
        Ok(Ok(created))
    }

    pub async fn update_test(
        &self,
        user: &User,
        test_id: i64,
        update: &TestUpdate,
    ) -> Result<Outcome<CognitiveTest>> {
        let test = match self.managed_test(user, test_id).await? {
            Ok(test) => test,
            Err(refusal) => return Ok(Err(refusal)),
        };

        if update
            .title
            .as_deref()
            .is_some_and(|title| title.trim().is_empty())
        {
            return Ok(Err(Refusal::Invalid("title is required")));
        }
        if let Err(msg) = validate_settings(
            update.min_level.unwrap_or(test.min_level),
            update.target_level.unwrap_or(test.target_level),
            update.time_limit_minutes.unwrap_or(test.time_limit_minutes),
            update.passing_score.unwrap_or(test.passing_score),
        ) {
            return Ok(Err(Refusal::Invalid(msg)));
        }

        self.db.update_test(test_id, update).await?;
        let updated = self
            .db
            .get_test(test_id)
            .await?
            .ok_or_eyre("test missing after update")?;
        Ok(Ok(updated))
    }

    pub async fn delete_test(&self, user: &User, test_id: i64) -> Result<Outcome<()>> {
        if let Err(refusal) = self.managed_test(user, test_id).await? {
            return Ok(Err(refusal));
        }
        self.db.delete_test(test_id).await?;
        Ok(Ok(()))
    }

    /// Return the test attached to a content item, creating an empty one if needed.
    pub async fn content_test(&self, user: &User, content_id: i64) -> Result<Outcome<ContentTest>> {
        let Some(content) = self.db.get_content(content_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if user.role != Role::Admin && content.author != user.id {
            return Ok(Err(Refusal::Forbidden));
        }

        if let Some(test) = self.db.test_for_content(content_id).await? {
            return Ok(Ok(ContentTest {
                test,
                created: false,
            }));
        }

        let new_test = NewTest {
            title: format!("Test: {}", content.title),
            description: String::new(),
            test_type: TestType::ContentBased,
            min_level: content.min_level,
            target_level: content.min_level,
            time_limit_minutes: crate::names::DEFAULT_TIME_LIMIT_MINUTES,
            passing_score: crate::names::DEFAULT_PASSING_SCORE,
            questions: Vec::new(),
        };
        let test_id = self
            .db
            .create_test(&new_test, Some(user.id), Some(content_id))
            .await?;
        let test = self
            .db
            .get_test(test_id)
            .await?
            .ok_or_eyre("test missing after insert")?;

        Ok(Ok(ContentTest {
            test,
            created: true,
        }))
    }

    // -----------------------------------------------------------------------
    // Question management
    // -----------------------------------------------------------------------

    pub async fn questions(&self, user: &User, test_id: i64) -> Result<Outcome<Vec<Question>>> {
        if let Err(refusal) = self.managed_test(user, test_id).await? {
            return Ok(Err(refusal));
        }
        Ok(Ok(self.db.questions_for_test(test_id).await?))
    }

    pub async fn add_question(
        &self,
        user: &User,
        test_id: i64,
        question: &QuestionInput,
    ) -> Result<Outcome<Question>> {
        if let Err(refusal) = self.managed_test(user, test_id).await? {
            return Ok(Err(refusal));
        }
        if let Err(msg) = validate_question(question) {
            return Ok(Err(Refusal::Invalid(msg)));
        }

        let position = match question.order {
            Some(position) => {
                if self
                    .db
                    .question_position_taken(test_id, position, None)
                    .await?
                {
                    return Ok(Err(Refusal::Invalid(
                        "a question with this order already exists",
                    )));
                }
                position
            }
            None => self.db.next_question_position(test_id).await?,
        };

        let question_id = self.db.add_question(test_id, question, position).await?;
        let created = self
            .db
            .get_question(question_id)
            .await?
            .ok_or_eyre("question missing after insert")?;
        Ok(Ok(created))
    }

    pub async fn update_question(
        &self,
        user: &User,
        question_id: i64,
        question: &QuestionInput,
    ) -> Result<Outcome<Question>> {
        let Some(existing) = self.db.get_question(question_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if let Err(refusal) = self.managed_test(user, existing.test_id).await? {
            return Ok(Err(refusal));
        }
        if let Err(msg) = validate_question(question) {
            return Ok(Err(Refusal::Invalid(msg)));
        }

        let position = question.order.unwrap_or(existing.order);
        if self
            .db
            .question_position_taken(existing.test_id, position, Some(question_id))
            .await?
        {
            return Ok(Err(Refusal::Invalid(
                "a question with this order already exists",
            )));
        }

        self.db
            .update_question(question_id, question, position)
            .await?;
        let updated = self
            .db
            .get_question(question_id)
            .await?
            .ok_or_eyre("question missing after update")?;
        Ok(Ok(updated))
    }

    pub async fn delete_question(&self, user: &User, question_id: i64) -> Result<Outcome<i64>> {
        let Some(existing) = self.db.get_question(question_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if let Err(refusal) = self.managed_test(user, existing.test_id).await? {
            return Ok(Err(refusal));
        }
        self.db.delete_question(question_id).await?;
        Ok(Ok(existing.test_id))
    }

    // -----------------------------------------------------------------------
    // Taking tests
    // -----------------------------------------------------------------------

    /// Tests visible to the user: everything active for staff, placement tests
    /// for unplaced students, otherwise tests at or below the student's level.
    pub async fn tests_for(&self, user: &User) -> Result<Vec<CognitiveTest>> {
        if !user.is_student() {
            return self.db.active_tests().await;
        }
        if !user.has_taken_placement_test {
            return self.db.active_tests_of_type(TestType::Placement).await;
        }
        self.db.active_tests_up_to_level(user.level()).await
    }

    pub async fn test_detail(&self, user: &User, test_id: i64) -> Result<Outcome<TestDetail>> {
        let Some(test) = self.db.get_test(test_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if user.is_student() && !test.is_active {
            return Ok(Err(Refusal::NotFound));
        }

        let mut questions = self.db.questions_for_test(test_id).await?;
        if user.is_student() {
            questions = questions.into_iter().map(Question::redacted).collect();
        }
        Ok(Ok(TestDetail { test, questions }))
    }

    /// Resume the user's in-progress session for a test or open a new one.
    pub async fn start(&self, user: &User, test_id: i64) -> Result<Outcome<Started>> {
        let Some(test) = self.db.get_test(test_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if !test.is_active {
            return Ok(Err(Refusal::Invalid("this test is not active")));
        }
        if user.needs_placement() && test.test_type != TestType::Placement {
            return Ok(Err(Refusal::Forbidden));
        }

        if let Some(session) = self.db.in_progress_session(user.id, test_id).await? {
            return Ok(Ok(Started {
                session,
                created: false,
            }));
        }

        let session_id = self
            .db
            .create_session(user.id, test_id, test.time_limit_minutes)
            .await?;
        self.db
            .log_event(
                user.id,
                "start_test",
                &serde_json::json!({ "test_id": test_id, "session_id": session_id }),
            )
            .await?;

        let session = self
            .db
            .get_session(session_id)
            .await?
            .ok_or_eyre("session missing after insert")?;
        Ok(Ok(Started {
            session,
            created: true,
        }))
    }

    pub async fn submit_answer(
        &self,
        user: &User,
        session_id: i64,
        question_id: i64,
        answer: &AnswerInput,
    ) -> Result<Outcome<i64>> {
        let Some(session) = self.db.get_session(session_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if session.user != user.id {
            return Ok(Err(Refusal::NotFound));
        }
        if session.status != SessionStatus::InProgress {
            return Ok(Err(Refusal::Invalid("this session is already finished")));
        }
        if session.is_expired() {
            return Ok(Err(Refusal::Invalid("time is up for this session")));
        }

        let Some(question) = self.db.get_question(question_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if question.test_id != session.test {
            return Ok(Err(Refusal::Invalid("question is not part of this test")));
        }
        if let Some(choice_id) = answer.selected_choice {
            if !question.choices.iter().any(|c| c.id == choice_id) {
                return Ok(Err(Refusal::Invalid("choice is not part of this question")));
            }
        }

        let answer_id = self
            .db
            .upsert_answer(session_id, question_id, answer)
            .await?;
        Ok(Ok(answer_id))
    }

    /// Close a session. Finishing twice returns the stored result unchanged.
    pub async fn finish(&self, user: &User, session_id: i64) -> Result<Outcome<Finished>> {
        let Some(session) = self.db.get_session(session_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if session.user != user.id {
            return Ok(Err(Refusal::NotFound));
        }
        if session.status != SessionStatus::InProgress {
            return Ok(Ok(Finished {
                session_id,
                status: session.status,
                total_score: session.total_score,
            }));
        }

        let test = self
            .db
            .get_test(session.test)
            .await?
            .ok_or_eyre("session refers to a missing test")?;
        let answers = self.db.session_answers(session_id).await?;
        let total_points = self.db.test_total_points(test.id).await?;
        let score = auto_score(&answers, total_points);

        let status = if self.db.test_has_text_questions(test.id).await? {
            SessionStatus::PendingReview
        } else {
            SessionStatus::Completed
        };

        let closed = self
            .db
            .close_session(
                session_id,
                &score.graded,
                score.total_score,
                status,
                |owner, total, summary, points| completion_for(&test, owner, total, summary, points),
            )
            .await?;
        if !closed {
            // Another request finished it first.
            let current = self
                .db
                .get_session(session_id)
                .await?
                .ok_or_eyre("session vanished while finishing")?;
            return Ok(Ok(Finished {
                session_id,
                status: current.status,
                total_score: current.total_score,
            }));
        }

        self.db
            .log_event(
                user.id,
                "finish_test",
                &serde_json::json!({
                    "session_id": session_id,
                    "status": status,
                    "score": score.total_score,
                }),
            )
            .await?;

        Ok(Ok(Finished {
            session_id,
            status,
            total_score: score.total_score,
        }))
    }

    // -----------------------------------------------------------------------
    // Review
    // -----------------------------------------------------------------------

    pub async fn pending_reviews(&self, user: &User) -> Result<Vec<TestSession>> {
        let managed_by = (user.role != Role::Admin).then_some(user.id);
        self.db
            .pending_review_sessions(managed_by, PENDING_LIST_LIMIT)
            .await
    }

    async fn reviewable_session(
        &self,
        user: &User,
        session_id: i64,
    ) -> Result<Outcome<TestSession>> {
        let Some(session) = self.db.get_session(session_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if let Err(refusal) = self.managed_test(user, session.test).await? {
            return Ok(Err(refusal));
        }
        Ok(Ok(session))
    }

    pub async fn session_detail(
        &self,
        user: &User,
        session_id: i64,
    ) -> Result<Outcome<SessionDetail>> {
        let session = match self.reviewable_session(user, session_id).await? {
            Ok(session) => session,
            Err(refusal) => return Ok(Err(refusal)),
        };
        let answers = self.db.session_answers(session_id).await?;
        Ok(Ok(SessionDetail { session, answers }))
    }

    pub async fn grade(
        &self,
        user: &User,
        session_id: i64,
        submission: &GradeSubmission,
    ) -> Result<Outcome<Finished>> {
        let session = match self.reviewable_session(user, session_id).await? {
            Ok(session) => session,
            Err(refusal) => return Ok(Err(refusal)),
        };
        if session.status != SessionStatus::PendingReview {
            return Ok(Err(Refusal::Invalid("this session is not waiting for review")));
        }

        let answers = self.db.session_answers(session_id).await?;
        let mut grades = Vec::with_capacity(submission.grades.len());
        for grade in &submission.grades {
            let Some(answer) = answers.iter().find(|a| a.id == grade.answer_id) else {
                return Ok(Err(Refusal::Invalid("answer is not part of this session")));
            };
            if !grade.score.is_finite() || grade.score < 0.0 || grade.score > answer.points as f64
            {
                return Ok(Err(Refusal::Invalid(
                    "score must be between zero and the question's points",
                )));
            }
            grades.push((answer.id, grade.score));
        }

        let feedback = submission
            .feedback
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty());
        let test = self
            .db
            .get_test(session.test)
            .await?
            .ok_or_eyre("session refers to a missing test")?;
        let Some(total_score) = self
            .db
            .grade_session(
                session_id,
                &grades,
                feedback,
                user.id,
                |owner, total, summary, points| completion_for(&test, owner, total, summary, points),
            )
            .await?
        else {
            return Ok(Err(Refusal::Invalid("this session is not waiting for review")));
        };

        Ok(Ok(Finished {
            session_id,
            status: SessionStatus::Completed,
            total_score,
        }))
    }

    // -----------------------------------------------------------------------
    // Student results
    // -----------------------------------------------------------------------

    pub async fn result(&self, user: &User, session_id: i64) -> Result<Outcome<TestResult>> {
        let Some(session) = self.db.get_session(session_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if session.user != user.id {
            return Ok(Err(Refusal::NotFound));
        }
        let test = self
            .db
            .get_test(session.test)
            .await?
            .ok_or_eyre("session refers to a missing test")?;
        let answers = self.db.answer_results(session_id).await?;

        Ok(Ok(TestResult {
            id: session.id,
            test_title: test.title,
            test_type: test.test_type,
            status: session.status,
            total_score: session.total_score,
            started_at: session.started_at,
            finished_at: session.finished_at,
            teacher_feedback: session.teacher_feedback,
            answers,
        }))
    }

    pub async fn history(&self, user: &User) -> Result<Vec<TestSession>> {
        self.db.session_history(user.id, HISTORY_LIMIT).await
    }
}
