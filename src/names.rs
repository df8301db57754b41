pub const LOGIN_URL: &str = "/login";
pub const REGISTER_URL: &str = "/register";
pub const LOGOUT_URL: &str = "/logout";
pub const DASHBOARD_URL: &str = "/dashboard";
pub const PROFILE_URL: &str = "/profile";

pub const STUDENT_DASHBOARD_URL: &str = "/student/dashboard";
pub const PLACEMENT_TEST_URL: &str = "/student/placement-test";
pub const STUDENT_TESTS_URL: &str = "/student/tests";
pub const STUDENT_HISTORY_URL: &str = "/student/history";
pub const LEARNING_PATH_URL: &str = "/student/learning-path";
pub const STUDENT_STATS_URL: &str = "/student/stats";
pub const RECOMMENDATIONS_URL: &str = "/student/recommendations";

pub const TEACHER_DASHBOARD_URL: &str = "/teacher/dashboard";
pub const TEACHER_TESTS_URL: &str = "/teacher/tests";
pub const NEW_TEST_URL: &str = "/teacher/tests/new";
pub const TEACHER_CONTENTS_URL: &str = "/teacher/contents";
pub const NEW_CONTENT_URL: &str = "/teacher/contents/new";
pub const GRADING_URL: &str = "/teacher/grading";
pub const REPORTS_URL: &str = "/teacher/reports";

pub const AUTH_COOKIE_NAME: &str = "auth_token";
pub const NEXT_QUERY_PARAM: &str = "next";

pub fn login_with_next(path: &str) -> String {
    format!("{LOGIN_URL}?{NEXT_QUERY_PARAM}={}", urlencoding::encode(path))
}

pub fn take_test_url(test_id: i64) -> String {
    format!("/student/tests/{test_id}/take")
}

pub fn results_url(session_id: i64) -> String {
    format!("/student/results/{session_id}")
}

pub fn open_recommendation_url(recommendation_id: i64) -> String {
    format!("/student/recommendations/{recommendation_id}/open")
}

pub fn student_report_url(student_id: i64) -> String {
    format!("/teacher/reports/{student_id}")
}

pub fn content_url(content_id: i64) -> String {
    format!("/content/{content_id}")
}

pub fn content_complete_url(content_id: i64) -> String {
    format!("/content/{content_id}/complete")
}

pub fn content_file_url(content_id: i64) -> String {
    format!("/api/adaptive-learning/content/{content_id}/file")
}

pub fn edit_test_url(test_id: i64) -> String {
    format!("/teacher/tests/{test_id}/edit")
}

pub fn delete_test_url(test_id: i64) -> String {
    format!("/teacher/tests/{test_id}/delete")
}

pub fn test_questions_url(test_id: i64) -> String {
    format!("/teacher/tests/{test_id}/questions")
}

pub fn delete_question_url(test_id: i64, question_id: i64) -> String {
    format!("/teacher/tests/{test_id}/questions/{question_id}/delete")
}

pub fn content_test_url(content_id: i64) -> String {
    format!("/teacher/contents/{content_id}/test")
}

pub fn delete_content_url(content_id: i64) -> String {
    format!("/teacher/contents/{content_id}/delete")
}

pub fn grade_session_url(session_id: i64) -> String {
    format!("/teacher/grading/{session_id}")
}

/// Whether `next` may be used as a post-login destination: a local absolute path only.
pub fn is_safe_next(next: &str) -> bool {
    next.starts_with('/') && !next.starts_with("//") && !next.contains('\\')
}

// Levels
pub const MIN_LEVEL: i64 = 1;
pub const MAX_LEVEL: i64 = 100;

// Test defaults
pub const DEFAULT_TIME_LIMIT_MINUTES: i64 = 30;
pub const DEFAULT_PASSING_SCORE: i64 = 70;
pub const DEFAULT_QUESTION_POINTS: i64 = 10;

// Adaptive learning
pub const RECOMMENDATION_LEVEL_WINDOW: i64 = 5;
pub const MAX_RECOMMENDATIONS: usize = 10;
pub const LEARNING_PATH_LENGTH: i64 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_with_next_encodes_query() {
        assert_eq!(
            login_with_next("/student/tests?page=2"),
            "/login?next=%2Fstudent%2Ftests%3Fpage%3D2"
        );
    }

    #[test]
    fn login_with_next_survives_reserved_and_unicode() {
        let path = "/content/7?tab=notes&q=a b#top/ünï";
        let url = login_with_next(path);
        let encoded = url.strip_prefix("/login?next=").unwrap();
        assert!(!encoded.contains(['&', '#', ' ', '?', '/']));
        assert_eq!(urlencoding::decode(encoded).unwrap(), path);
    }

    #[test]
    fn only_local_paths_are_safe() {
        assert!(is_safe_next("/student/tests"));
        assert!(!is_safe_next("//evil.example"));
        assert!(!is_safe_next("https://evil.example"));
        assert!(!is_safe_next("/\\evil.example"));
    }
}
