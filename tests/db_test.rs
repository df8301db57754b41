mod common;

use std::collections::HashSet;

use common::{
    create_test_db, create_user, essay, mcq, new_content, new_test, placed_student,
};
use coglearn::db::{models::User, Db};
use coglearn::models::{
    AnswerInput, GradeInput, GradeSubmission, Role, SessionStatus, TestType,
};
use coglearn::services::{
    adaptive::AdaptiveService, assessment::AssessmentService, Refusal,
};

async fn refresh(db: &Db, user: &User) -> User {
    db.find_user(user.id).await.unwrap().unwrap()
}

fn choice(answer: i64) -> AnswerInput {
    AnswerInput {
        selected_choice: Some(answer),
        ..Default::default()
    }
}

fn text(answer: &str) -> AnswerInput {
    AnswerInput {
        text_answer: Some(answer.to_string()),
        ..Default::default()
    }
}

/// `(correct_choice_id, wrong_choice_id)` for each question of a test, in order.
async fn choice_ids(db: &Db, test_id: i64) -> Vec<(i64, i64)> {
    db.questions_for_test(test_id)
        .await
        .unwrap()
        .iter()
        .filter(|q| !q.choices.is_empty())
        .map(|q| {
            let correct = q.choices.iter().find(|c| c.is_correct == Some(true)).unwrap();
            let wrong = q.choices.iter().find(|c| c.is_correct == Some(false)).unwrap();
            (correct.id, wrong.id)
        })
        .collect()
}

#[tokio::test]
async fn migrations_are_tracked() {
    let db = create_test_db().await;
    assert!(db.migration_applied("V1").await.unwrap());
}

#[tokio::test]
async fn mcq_session_scores_and_raises_level() {
    let db = create_test_db().await;
    let assessment = AssessmentService::new(db.clone());
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let student = placed_student(&db, "student", 10).await;

    let test = assessment
        .create_test(
            &teacher,
            new_test("Logic", TestType::General, vec![mcq("a", 10), mcq("b", 10)]),
            false,
        )
        .await
        .unwrap()
        .unwrap();
    let questions = db.questions_for_test(test.id).await.unwrap();
    let choices = choice_ids(&db, test.id).await;

    // Half right: below the passing score, level stays put.
    let started = assessment.start(&student, test.id).await.unwrap().unwrap();
    assert!(started.created);
    let session_id = started.session.id;
    assessment
        .submit_answer(&student, session_id, questions[0].id, &choice(choices[0].0))
        .await
        .unwrap()
        .unwrap();
    assessment
        .submit_answer(&student, session_id, questions[1].id, &choice(choices[1].1))
        .await
        .unwrap()
        .unwrap();
    let finished = assessment.finish(&student, session_id).await.unwrap().unwrap();
    assert_eq!(finished.status, SessionStatus::Completed);
    assert_eq!(finished.total_score, 50.0);
    assert_eq!(refresh(&db, &student).await.level(), 10);

    // All right: a score of 90 or more adds five levels.
    let session_id = assessment
        .start(&student, test.id)
        .await
        .unwrap()
        .unwrap()
        .session
        .id;
    for (question, (correct, _)) in questions.iter().zip(&choices) {
        assessment
            .submit_answer(&student, session_id, question.id, &choice(*correct))
            .await
            .unwrap()
            .unwrap();
    }
    let finished = assessment.finish(&student, session_id).await.unwrap().unwrap();
    assert_eq!(finished.total_score, 100.0);
    assert_eq!(refresh(&db, &student).await.level(), 15);

    let history = db.level_history(student.id).await.unwrap();
    assert!(history.iter().any(|change| change.new_level == 15));
}

#[tokio::test]
async fn unanswered_questions_count_against_the_score() {
    let db = create_test_db().await;
    let assessment = AssessmentService::new(db.clone());
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let student = placed_student(&db, "student", 10).await;

    let test = assessment
        .create_test(
            &teacher,
            new_test(
                "Logic",
                TestType::General,
                vec![mcq("a", 5), mcq("b", 5), mcq("c", 5), mcq("d", 5)],
            ),
            false,
        )
        .await
        .unwrap()
        .unwrap();
    let questions = db.questions_for_test(test.id).await.unwrap();
    let choices = choice_ids(&db, test.id).await;

    let session_id = assessment
        .start(&student, test.id)
        .await
        .unwrap()
        .unwrap()
        .session
        .id;
    assessment
        .submit_answer(&student, session_id, questions[0].id, &choice(choices[0].0))
        .await
        .unwrap()
        .unwrap();

    let finished = assessment.finish(&student, session_id).await.unwrap().unwrap();
    assert_eq!(finished.total_score, 25.0);
}

#[tokio::test]
async fn finishing_twice_changes_nothing() {
    let db = create_test_db().await;
    let assessment = AssessmentService::new(db.clone());
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let student = placed_student(&db, "student", 10).await;

    let test = assessment
        .create_test(&teacher, new_test("Logic", TestType::General, vec![mcq("a", 10)]), false)
        .await
        .unwrap()
        .unwrap();
    let question = &db.questions_for_test(test.id).await.unwrap()[0];
    let (correct, _) = choice_ids(&db, test.id).await[0];

    let session_id = assessment
        .start(&student, test.id)
        .await
        .unwrap()
        .unwrap()
        .session
        .id;
    assessment
        .submit_answer(&student, session_id, question.id, &choice(correct))
        .await
        .unwrap()
        .unwrap();

    let first = assessment.finish(&student, session_id).await.unwrap().unwrap();
    let level_after_first = refresh(&db, &student).await.level();
    let history_len = db.level_history(student.id).await.unwrap().len();

    let second = assessment.finish(&student, session_id).await.unwrap().unwrap();
    assert_eq!(first, second);
    assert_eq!(refresh(&db, &student).await.level(), level_after_first);
    assert_eq!(db.level_history(student.id).await.unwrap().len(), history_len);

    // A closed session takes no more answers.
    assert_eq!(
        assessment
            .submit_answer(&student, session_id, question.id, &choice(correct))
            .await
            .unwrap(),
        Err(Refusal::Invalid("this session is already finished"))
    );
}

#[tokio::test]
async fn starting_again_resumes_the_open_session() {
    let db = create_test_db().await;
    let assessment = AssessmentService::new(db.clone());
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let student = placed_student(&db, "student", 10).await;

    let test = assessment
        .create_test(&teacher, new_test("Logic", TestType::General, vec![mcq("a", 10)]), false)
        .await
        .unwrap()
        .unwrap();

    let first = assessment.start(&student, test.id).await.unwrap().unwrap();
    let second = assessment.start(&student, test.id).await.unwrap().unwrap();
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.session.id, second.session.id);
}

#[tokio::test]
async fn essay_sessions_wait_for_review_and_grades_are_bounded() {
    let db = create_test_db().await;
    let assessment = AssessmentService::new(db.clone());
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let other_teacher = create_user(&db, "other", Role::Teacher).await;
    let admin = create_user(&db, "admin", Role::Admin).await;
    let student = placed_student(&db, "student", 10).await;

    let test = assessment
        .create_test(
            &teacher,
            new_test(
                "Memory",
                TestType::General,
                vec![mcq("pick", 10), essay("explain", 10)],
            ),
            false,
        )
        .await
        .unwrap()
        .unwrap();
    let questions = db.questions_for_test(test.id).await.unwrap();
    let (correct, _) = choice_ids(&db, test.id).await[0];

    let session_id = assessment
        .start(&student, test.id)
        .await
        .unwrap()
        .unwrap()
        .session
        .id;
    assessment
        .submit_answer(&student, session_id, questions[0].id, &choice(correct))
        .await
        .unwrap()
        .unwrap();
    let essay_answer = assessment
        .submit_answer(&student, session_id, questions[1].id, &text("chunking"))
        .await
        .unwrap()
        .unwrap();

    let finished = assessment.finish(&student, session_id).await.unwrap().unwrap();
    assert_eq!(finished.status, SessionStatus::PendingReview);
    assert_eq!(finished.total_score, 50.0);

    let pending = |sessions: Vec<coglearn::db::models::TestSession>| {
        sessions.iter().any(|s| s.id == session_id)
    };
    assert!(pending(assessment.pending_reviews(&teacher).await.unwrap()));
    assert!(pending(assessment.pending_reviews(&admin).await.unwrap()));
    assert!(!pending(assessment.pending_reviews(&other_teacher).await.unwrap()));

    let grade = |score: f64| GradeSubmission {
        grades: vec![GradeInput {
            answer_id: essay_answer,
            score,
        }],
        feedback: Some("Good".to_string()),
    };

    assert_eq!(
        assessment
            .grade(&other_teacher, session_id, &grade(5.0))
            .await
            .unwrap(),
        Err(Refusal::Forbidden)
    );
    for out_of_bounds in [-1.0, 10.5, f64::NAN] {
        assert!(matches!(
            assessment
                .grade(&teacher, session_id, &grade(out_of_bounds))
                .await
                .unwrap(),
            Err(Refusal::Invalid(_))
        ));
    }

    let graded = assessment
        .grade(&teacher, session_id, &grade(5.0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(graded.status, SessionStatus::Completed);
    assert_eq!(graded.total_score, 75.0);

    let result = assessment.result(&student, session_id).await.unwrap().unwrap();
    assert_eq!(result.teacher_feedback.as_deref(), Some("Good"));
    assert!(!pending(assessment.pending_reviews(&teacher).await.unwrap()));

    assert!(matches!(
        assessment
            .grade(&teacher, session_id, &grade(5.0))
            .await
            .unwrap(),
        Err(Refusal::Invalid(_))
    ));
}

#[tokio::test]
async fn placement_sets_the_starting_level() {
    let db = create_test_db().await;
    let assessment = AssessmentService::new(db.clone());
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let student = create_user(&db, "newcomer", Role::Student).await;
    assert!(student.needs_placement());

    let placement = assessment
        .create_test(
            &teacher,
            new_test("Placement", TestType::General, vec![mcq("a", 10), mcq("b", 10)]),
            true,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(placement.test_type, TestType::Placement);
    let general = assessment
        .create_test(&teacher, new_test("Logic", TestType::General, vec![mcq("a", 10)]), false)
        .await
        .unwrap()
        .unwrap();

    let visible: Vec<i64> = assessment
        .tests_for(&student)
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(visible, vec![placement.id]);
    assert_eq!(
        assessment.start(&student, general.id).await.unwrap().err(),
        Some(Refusal::Forbidden)
    );

    let questions = db.questions_for_test(placement.id).await.unwrap();
    let choices = choice_ids(&db, placement.id).await;
    let session_id = assessment
        .start(&student, placement.id)
        .await
        .unwrap()
        .unwrap()
        .session
        .id;
    assessment
        .submit_answer(&student, session_id, questions[0].id, &choice(choices[0].0))
        .await
        .unwrap()
        .unwrap();
    assessment.finish(&student, session_id).await.unwrap().unwrap();

    let placed = refresh(&db, &student).await;
    assert!(placed.has_taken_placement_test);
    assert_eq!(placed.level(), 50);
}

#[tokio::test]
async fn placed_students_see_tests_up_to_their_level() {
    let db = create_test_db().await;
    let assessment = AssessmentService::new(db.clone());
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let student = placed_student(&db, "student", 10).await;

    let mut easy = new_test("Easy", TestType::General, vec![mcq("a", 10)]);
    easy.min_level = 5;
    let mut hard = new_test("Hard", TestType::General, vec![mcq("a", 10)]);
    hard.min_level = 20;
    let easy = assessment.create_test(&teacher, easy, false).await.unwrap().unwrap();
    assessment.create_test(&teacher, hard, false).await.unwrap().unwrap();

    let visible: Vec<i64> = assessment
        .tests_for(&student)
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(visible, vec![easy.id]);

    // Students never see the answer key.
    let detail = assessment
        .test_detail(&student, easy.id)
        .await
        .unwrap()
        .unwrap();
    assert!(detail
        .questions
        .iter()
        .flat_map(|q| &q.choices)
        .all(|c| c.is_correct.is_none()));
}

#[tokio::test]
async fn recommendations_stay_within_five_levels() {
    let db = create_test_db().await;
    let adaptive = AdaptiveService::new(db.clone());
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let student = placed_student(&db, "student", 20).await;

    let mut expected = HashSet::new();
    for (title, min, max, inside) in [
        ("far below", 1, 10, false),
        ("just below", 10, 15, true),
        ("around", 18, 22, true),
        ("just above", 25, 30, true),
        ("far above", 26, 40, false),
    ] {
        let content = adaptive
            .create_content(&teacher, &new_content(title, min, max), None)
            .await
            .unwrap()
            .unwrap();
        if inside {
            expected.insert(content.id);
        }
    }

    let recommendations = adaptive
        .regenerate_recommendations(&student)
        .await
        .unwrap()
        .unwrap();
    let got: HashSet<i64> = recommendations.iter().map(|r| r.content.id).collect();
    assert_eq!(got, expected);
    assert!(recommendations
        .iter()
        .all(|r| r.recommendation_type == "Recommended for level 20"));

    // Completed content is no longer recommended.
    let done = *expected.iter().next().unwrap();
    adaptive
        .record_progress(&student, done, 100.0)
        .await
        .unwrap()
        .unwrap();
    let again = adaptive
        .regenerate_recommendations(&student)
        .await
        .unwrap()
        .unwrap();
    assert!(again.iter().all(|r| r.content.id != done));
    assert_eq!(again.len(), expected.len() - 1);
}

#[tokio::test]
async fn learning_path_unlocks_in_order() {
    let db = create_test_db().await;
    let adaptive = AdaptiveService::new(db.clone());
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let student = placed_student(&db, "student", 10).await;

    let mut ids = Vec::new();
    for (title, min, max) in [("A", 5, 15), ("B", 8, 12), ("C", 20, 30), ("D", 12, 40)] {
        let content = adaptive
            .create_content(&teacher, &new_content(title, min, max), None)
            .await
            .unwrap()
            .unwrap();
        ids.push(content.id);
    }
    let (a, b, c, d) = (ids[0], ids[1], ids[2], ids[3]);

    let path = adaptive.reset_learning_path(&student).await.unwrap();
    assert_eq!(path.name, "Learning path for level 10");
    let order: Vec<i64> = path.items.iter().map(|i| i.content.id).collect();
    assert_eq!(order, vec![a, b, d, c]);
    let unlocked: Vec<bool> = path.items.iter().map(|i| i.is_unlocked).collect();
    assert_eq!(unlocked, vec![true, true, false, false]);

    adaptive.record_progress(&student, b, 100.0).await.unwrap().unwrap();
    let path = adaptive.learning_path(&student).await.unwrap().unwrap();
    let unlocked: Vec<bool> = path.items.iter().map(|i| i.is_unlocked).collect();
    assert_eq!(unlocked, vec![true, true, true, false]);
    assert!(path.items[1].is_completed);

    // A reset retires the old path and skips finished content.
    let fresh = adaptive.reset_learning_path(&student).await.unwrap();
    assert_ne!(fresh.id, path.id);
    assert!(fresh.items.iter().all(|i| i.content.id != b));
}

#[tokio::test]
async fn deleting_content_removes_its_test() {
    let db = create_test_db().await;
    let adaptive = AdaptiveService::new(db.clone());
    let assessment = AssessmentService::new(db.clone());
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let other = create_user(&db, "other", Role::Teacher).await;

    let content = adaptive
        .create_content(&teacher, &new_content("Focus", 1, 10), None)
        .await
        .unwrap()
        .unwrap();
    let first = assessment
        .content_test(&teacher, content.id)
        .await
        .unwrap()
        .unwrap();
    let second = assessment
        .content_test(&teacher, content.id)
        .await
        .unwrap()
        .unwrap();
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.test.id, second.test.id);
    assert_eq!(first.test.test_type, TestType::ContentBased);

    assert_eq!(
        adaptive.delete_content(&other, content.id).await.unwrap(),
        Err(Refusal::Forbidden)
    );
    adaptive
        .delete_content(&teacher, content.id)
        .await
        .unwrap()
        .unwrap();
    assert!(db.get_content(content.id).await.unwrap().is_none());
    assert!(db.get_test(first.test.id).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_answers_all_land() {
    let db = create_test_db().await;
    let assessment = AssessmentService::new(db.clone());
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let student = placed_student(&db, "student", 10).await;

    let questions = (0..12).map(|i| mcq(&format!("q{i}"), 5)).collect();
    let test = assessment
        .create_test(&teacher, new_test("Recall", TestType::General, questions), false)
        .await
        .unwrap()
        .unwrap();
    let questions = db.questions_for_test(test.id).await.unwrap();
    let choices = choice_ids(&db, test.id).await;
    let session_id = assessment
        .start(&student, test.id)
        .await
        .unwrap()
        .unwrap()
        .session
        .id;

    let tasks: Vec<_> = questions
        .iter()
        .zip(&choices)
        .map(|(question, (correct, _))| {
            let assessment = assessment.clone();
            let student = student.clone();
            let (question_id, correct) = (question.id, *correct);
            tokio::spawn(async move {
                assessment
                    .submit_answer(&student, session_id, question_id, &choice(correct))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap().unwrap();
    }

    // Racing finishes close the session once and apply the level step once.
    let finishes: Vec<_> = (0..4)
        .map(|_| {
            let assessment = assessment.clone();
            let student = student.clone();
            tokio::spawn(async move { assessment.finish(&student, session_id).await })
        })
        .collect();
    for finish in finishes {
        let finished = finish.await.unwrap().unwrap().unwrap();
        assert_eq!(finished.status, SessionStatus::Completed);
        assert_eq!(finished.total_score, 100.0);
    }

    assert_eq!(refresh(&db, &student).await.level(), 15);
    let steps = db.level_history(student.id).await.unwrap();
    assert_eq!(steps.iter().filter(|c| c.reason.starts_with("Passed")).count(), 1);
    let summary = db.performance_summary(student.id).await.unwrap().unwrap();
    assert_eq!(summary.total_tests_completed, 1);
}

#[tokio::test]
async fn completion_records_summary_and_warnings() {
    let db = create_test_db().await;
    let assessment = AssessmentService::new(db.clone());
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let student = placed_student(&db, "student", 10).await;

    let test = assessment
        .create_test(
            &teacher,
            new_test("Logic", TestType::General, vec![mcq("a", 10), mcq("b", 10)]),
            false,
        )
        .await
        .unwrap()
        .unwrap();
    let questions = db.questions_for_test(test.id).await.unwrap();
    let choices = choice_ids(&db, test.id).await;
    let session_id = assessment
        .start(&student, test.id)
        .await
        .unwrap()
        .unwrap()
        .session
        .id;
    for (question, (_, wrong)) in questions.iter().zip(&choices) {
        assessment
            .submit_answer(&student, session_id, question.id, &choice(*wrong))
            .await
            .unwrap()
            .unwrap();
    }
    assessment.finish(&student, session_id).await.unwrap().unwrap();

    let summary = db.performance_summary(student.id).await.unwrap().unwrap();
    assert_eq!(summary.total_tests_completed, 1);
    assert_eq!(summary.avg_logic_score, 0.0);
    let notifications = db.notifications(student.id).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].message.contains("logic"));

    // A repeated finish neither warns again nor counts the session twice.
    assessment.finish(&student, session_id).await.unwrap().unwrap();
    assert_eq!(db.notifications(student.id).await.unwrap().len(), 1);
    let summary = db.performance_summary(student.id).await.unwrap().unwrap();
    assert_eq!(summary.total_tests_completed, 1);
}

#[tokio::test]
async fn completed_content_stays_completed() {
    let db = create_test_db().await;
    let adaptive = AdaptiveService::new(db.clone());
    let teacher = create_user(&db, "teacher", Role::Teacher).await;
    let student = placed_student(&db, "student", 10).await;

    let content = adaptive
        .create_content(&teacher, &new_content("Focus", 1, 20), None)
        .await
        .unwrap()
        .unwrap();

    let update = adaptive.record_progress(&student, content.id, 40.0).await.unwrap().unwrap();
    assert!(!update.is_completed);
    let update = adaptive.record_progress(&student, content.id, 100.0).await.unwrap().unwrap();
    assert!(update.is_completed);

    let update = adaptive.record_progress(&student, content.id, 50.0).await.unwrap().unwrap();
    assert_eq!(update.progress_percent, 50.0);
    assert!(update.is_completed);
    let stored = adaptive.progress(&student).await.unwrap();
    assert!(stored.iter().any(|p| p.content == content.id && p.is_completed));
}
