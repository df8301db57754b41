use color_eyre::Result;
use serde::{Deserialize, Serialize};

use super::{Outcome, Refusal};
use crate::db::{
    models::{
        CategoryPoints, Notification, PerformanceSummary, Recommendation, TestSession, User,
    },
    Db,
};
use crate::models::{Category, Role};
use crate::names;

/// Category scores below this create a notification for the student.
const LOW_SCORE_THRESHOLD: f64 = 40.0;
const RECENT_PENDING: i64 = 5;
const TOP_RECOMMENDATIONS: i64 = 3;
const RECENT_RESULTS: i64 = 3;

pub fn rank(level: i64) -> &'static str {
    match level {
        90.. => "Diamond",
        75.. => "Gold",
        50.. => "Silver",
        25.. => "Bronze",
        _ => "Novice",
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn rolling_average(average: f64, count: i64, score: f64) -> f64 {
    round2((average * count as f64 + score) / (count as f64 + 1.0))
}

/// Fold one completed session into a summary.
///
/// Returns the categories whose session score fell below the warning threshold.
pub fn apply_session(
    summary: &mut PerformanceSummary,
    session_points: &[CategoryPoints],
) -> Vec<(Category, f64)> {
    let count = summary.total_tests_completed;
    let mut low = Vec::new();

    for points in session_points.iter().filter(|p| p.points > 0.0) {
        let score = points.earned / points.points * 100.0;
        let average = rolling_average(summary.average(points.category), count, score);
        summary.set_average(points.category, average);
        if score < LOW_SCORE_THRESHOLD {
            low.push((points.category, score));
        }
    }

    summary.total_tests_completed = count + 1;
    low
}

pub fn low_score_message(category: Category, score: f64) -> String {
    format!("Your {category} score was {score:.0}% on your last test. Keep practising!")
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SystemReport {
    pub total_students: i64,
    pub average_level: f64,
    pub completed_sessions: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuickLink {
    pub label: String,
    pub url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TeacherDashboard {
    pub teacher_name: String,
    pub contents_authored: i64,
    pub tests_managed: i64,
    pub pending_reviews: i64,
    pub recent_pending: Vec<TestSession>,
    pub quick_links: Vec<QuickLink>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StudentIdentity {
    pub full_name: String,
    pub level: i64,
    pub rank: String,
    pub has_taken_placement_test: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LearningStatus {
    pub path_name: Option<String>,
    pub total_items: usize,
    pub completed_items: usize,
    pub progress_percent: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Alert {
    pub kind: String,
    pub message: String,
    pub url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StudentDashboard {
    pub identity: StudentIdentity,
    pub cognitive_profile: PerformanceSummary,
    pub learning_status: LearningStatus,
    pub recommendations: Vec<Recommendation>,
    pub recent_results: Vec<TestSession>,
    pub alerts: Vec<Alert>,
}

#[derive(Clone)]
pub struct AnalyticsService {
    db: Db,
}

impl AnalyticsService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn log_event(
        &self,
        user: &User,
        event_type: &str,
        data: &serde_json::Value,
    ) -> Result<()> {
        self.db.log_event(user.id, event_type, data).await
    }

    /// Rebuild the user's summary from every completed session.
    pub async fn my_stats(&self, user: &User) -> Result<PerformanceSummary> {
        let mut summary = PerformanceSummary {
            user: user.id,
            ..Default::default()
        };
        for points in self.db.user_category_points(user.id).await? {
            if points.points > 0.0 {
                summary.set_average(points.category, round2(points.earned / points.points * 100.0));
            }
        }
        summary.total_tests_completed = self.db.count_completed_sessions_for(user.id).await?;

        self.db.save_performance_summary(&summary).await
    }

    pub async fn system_report(&self) -> Result<SystemReport> {
        Ok(SystemReport {
            total_students: self.db.count_students().await?,
            average_level: round2(self.db.average_student_level().await?),
            completed_sessions: self.db.count_completed_sessions().await?,
        })
    }

    pub async fn students(&self) -> Result<Vec<User>> {
        self.db.students().await
    }

    pub async fn student_report(&self, student_id: i64) -> Result<Outcome<PerformanceSummary>> {
        let Some(student) = self.db.find_user(student_id).await? else {
            return Ok(Err(Refusal::NotFound));
        };
        if !student.is_student() {
            return Ok(Err(Refusal::NotFound));
        }

        let summary = self
            .db
            .performance_summary(student_id)
            .await?
            .unwrap_or_else(|| PerformanceSummary {
                user: student_id,
                ..Default::default()
            });
        Ok(Ok(summary))
    }

    pub async fn teacher_dashboard(&self, user: &User) -> Result<TeacherDashboard> {
        let managed_by = (user.role != Role::Admin).then_some(user.id);
        let tests_managed = match managed_by {
            Some(user_id) => self.db.count_tests_managed_by(user_id).await?,
            None => self.db.all_tests().await?.len() as i64,
        };

        Ok(TeacherDashboard {
            teacher_name: user.full_name(),
            contents_authored: self.db.count_contents_by_author(user.id).await?,
            tests_managed,
            pending_reviews: self.db.count_pending_reviews(managed_by).await?,
            recent_pending: self
                .db
                .pending_review_sessions(managed_by, RECENT_PENDING)
                .await?,
            quick_links: vec![
                QuickLink {
                    label: "Create test".to_string(),
                    url: names::NEW_TEST_URL.to_string(),
                },
                QuickLink {
                    label: "Create content".to_string(),
                    url: names::NEW_CONTENT_URL.to_string(),
                },
                QuickLink {
                    label: "Grade answers".to_string(),
                    url: names::GRADING_URL.to_string(),
                },
                QuickLink {
                    label: "Student reports".to_string(),
                    url: names::REPORTS_URL.to_string(),
                },
            ],
        })
    }

    pub async fn student_dashboard(&self, user: &User) -> Result<StudentDashboard> {
        let cognitive_profile = self
            .db
            .performance_summary(user.id)
            .await?
            .unwrap_or_else(|| PerformanceSummary {
                user: user.id,
                ..Default::default()
            });

        let learning_status = match self.db.active_learning_path(user.id).await? {
            Some(path) => {
                let total_items = path.items.len();
                let completed_items = path.items.iter().filter(|i| i.is_completed).count();
                LearningStatus {
                    path_name: Some(path.name),
                    total_items,
                    completed_items,
                    progress_percent: if total_items > 0 {
                        round2(completed_items as f64 / total_items as f64 * 100.0)
                    } else {
                        0.0
                    },
                }
            }
            None => LearningStatus::default(),
        };

        let mut alerts = Vec::new();
        if !user.has_taken_placement_test {
            alerts.push(Alert {
                kind: "warning".to_string(),
                message: "Take the placement test to unlock your personalised tests.".to_string(),
                url: Some(names::PLACEMENT_TEST_URL.to_string()),
            });
        }
        let unread = self
            .db
            .notifications(user.id)
            .await?
            .into_iter()
            .filter(|n| !n.is_read)
            .count();
        if unread > 0 {
            alerts.push(Alert {
                kind: "info".to_string(),
                message: format!("You have {unread} unread notification(s)."),
                url: None,
            });
        }

        let level = user.level();
        Ok(StudentDashboard {
            identity: StudentIdentity {
                full_name: user.full_name(),
                level,
                rank: rank(level).to_string(),
                has_taken_placement_test: user.has_taken_placement_test,
            },
            cognitive_profile,
            learning_status,
            recommendations: self.db.recommendations(user.id, TOP_RECOMMENDATIONS).await?,
            recent_results: self.db.session_history(user.id, RECENT_RESULTS).await?,
            alerts,
        })
    }

    pub async fn notifications(&self, user: &User) -> Result<Vec<Notification>> {
        self.db.notifications(user.id).await
    }

    pub async fn mark_read(&self, user: &User, notification_id: i64) -> Result<Outcome<()>> {
        if self.db.mark_notification_read(notification_id, user.id).await? {
            Ok(Ok(()))
        } else {
            Ok(Err(Refusal::NotFound))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(category: Category, earned: f64, points: f64) -> CategoryPoints {
        CategoryPoints {
            category,
            earned,
            points,
        }
    }

    #[test]
    fn ranks_follow_level_bands() {
        assert_eq!(rank(100), "Diamond");
        assert_eq!(rank(90), "Diamond");
        assert_eq!(rank(89), "Gold");
        assert_eq!(rank(75), "Gold");
        assert_eq!(rank(50), "Silver");
        assert_eq!(rank(25), "Bronze");
        assert_eq!(rank(24), "Novice");
        assert_eq!(rank(1), "Novice");
    }

    #[test]
    fn rolling_average_rounds_to_two_decimals() {
        assert_eq!(rolling_average(0.0, 0, 66.666), 66.67);
        assert_eq!(rolling_average(50.0, 1, 100.0), 75.0);
        assert_eq!(rolling_average(80.0, 2, 50.0), 70.0);
    }

    #[test]
    fn session_updates_present_categories_only() {
        let mut summary = PerformanceSummary {
            user: 7,
            avg_memory_score: 60.0,
            avg_focus_score: 90.0,
            avg_logic_score: 0.0,
            total_tests_completed: 1,
            last_updated: String::new(),
        };
        let low = apply_session(
            &mut summary,
            &[
                points(Category::Memory, 10.0, 10.0),
                points(Category::Logic, 0.0, 0.0),
            ],
        );

        assert!(low.is_empty());
        assert_eq!(summary.avg_memory_score, 80.0);
        assert_eq!(summary.avg_focus_score, 90.0);
        assert_eq!(summary.avg_logic_score, 0.0);
        assert_eq!(summary.total_tests_completed, 2);
    }

    #[test]
    fn low_category_scores_are_reported() {
        let mut summary = PerformanceSummary::default();
        let low = apply_session(
            &mut summary,
            &[
                points(Category::Focus, 5.0, 20.0),
                points(Category::Logic, 4.0, 10.0),
            ],
        );
        assert_eq!(low, vec![(Category::Focus, 25.0)]);
        assert_eq!(summary.avg_logic_score, 40.0);
    }
}
