#![allow(dead_code)]

use coglearn::db::{models::User, Db, NewUser};
use coglearn::models::{
    Category, ChoiceInput, NewContent, NewTest, QuestionInput, QuestionType, Role, TestType,
};

pub async fn create_test_db() -> Db {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let path =
        std::env::temp_dir().join(format!("coglearn_test_{}_{}.db", std::process::id(), id));
    // Clean up leftover file from previous runs
    let _ = std::fs::remove_file(&path);
    let url = format!("file:{}", path.display());
    Db::new(url, None)
        .await
        .expect("failed to create test database")
}

pub const PASSWORD: &str = "correct horse";

pub async fn create_user(db: &Db, username: &str, role: Role) -> User {
    let user_id = db
        .create_user(NewUser {
            username,
            password: PASSWORD,
            email: "",
            first_name: "",
            last_name: "",
            role,
        })
        .await
        .expect("create user");
    db.find_user(user_id)
        .await
        .expect("find user")
        .expect("user exists")
}

/// A student who already took the placement test and sits at `level`.
pub async fn placed_student(db: &Db, username: &str, level: i64) -> User {
    let student = create_user(db, username, Role::Student).await;
    db.mark_placement_taken(student.id).await.expect("mark placed");
    db.record_level_change(student.id, student.level(), level, "seeded", None)
        .await
        .expect("set level");
    db.find_user(student.id)
        .await
        .expect("find user")
        .expect("user exists")
}

pub async fn token_for(db: &Db, user: &User) -> String {
    db.create_auth_token(user.id).await.expect("create token")
}

pub fn mcq(text: &str, points: i64) -> QuestionInput {
    QuestionInput {
        category: Category::Logic,
        question_type: QuestionType::Mcq,
        text: text.to_string(),
        correct_text_answer: None,
        points,
        order: None,
        choices: vec![
            ChoiceInput {
                text: "right".to_string(),
                is_correct: true,
                order: Some(1),
            },
            ChoiceInput {
                text: "wrong".to_string(),
                is_correct: false,
                order: Some(2),
            },
        ],
    }
}

pub fn essay(text: &str, points: i64) -> QuestionInput {
    QuestionInput {
        category: Category::Memory,
        question_type: QuestionType::Text,
        text: text.to_string(),
        correct_text_answer: None,
        points,
        order: None,
        choices: Vec::new(),
    }
}

pub fn new_test(title: &str, test_type: TestType, questions: Vec<QuestionInput>) -> NewTest {
    NewTest {
        title: title.to_string(),
        description: String::new(),
        test_type,
        min_level: 1,
        target_level: 1,
        time_limit_minutes: 30,
        passing_score: 70,
        questions,
    }
}

pub fn new_content(title: &str, min_level: i64, max_level: i64) -> NewContent {
    NewContent {
        title: title.to_string(),
        content_type: coglearn::models::ContentType::Text,
        body: format!("About {title}"),
        video_url: None,
        min_level,
        max_level,
    }
}
