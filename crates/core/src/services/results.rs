//! Election results.
//!
//! Raw vote rows are the single source for every figure here; there is no
//! precomputed summary to drift out of step.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ballot_common::AppResult;
use ballot_db::ElectionStore;
use serde::Serialize;

/// One candidate's standing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    pub candidate_id: i32,
    pub name: String,
    pub votes: i64,
    /// 1-based rank within the category.
    pub position: usize,
}

/// Results for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    pub category_id: i32,
    pub name: String,
    pub total_votes: i64,
    pub candidates: Vec<CandidateResult>,
}

/// Headline figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_students: usize,
    pub voted_students: usize,
    /// Whole-number percentage.
    pub turnout_percentage: u32,
    pub categories: Vec<CategoryResult>,
}

/// Turnout for one group of students.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTurnout {
    pub group: String,
    pub total: usize,
    pub voted: usize,
    pub turnout: f64,
}

/// Turnout by programme and by level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnoutBreakdown {
    pub programmes: Vec<GroupTurnout>,
    pub levels: Vec<GroupTurnout>,
}

/// Results service.
#[derive(Clone)]
pub struct ResultsService {
    store: Arc<dyn ElectionStore>,
}

impl ResultsService {
    /// Create a new results service.
    #[must_use]
    pub fn new(store: Arc<dyn ElectionStore>) -> Self {
        Self { store }
    }

    /// Turnout plus ranked tallies for every category.
    pub async fn dashboard(&self) -> AppResult<Dashboard> {
        let students = self.store.list_students().await?;
        let total_students = students.len();
        let voted_students = students.iter().filter(|s| s.has_voted).count();

        let tallies: HashMap<i32, i64> = self
            .store
            .tally_votes()
            .await?
            .into_iter()
            .map(|t| (t.candidate_id, t.votes))
            .collect();
        let candidates = self.store.list_candidates().await?;

        let categories = self
            .store
            .list_categories()
            .await?
            .into_iter()
            .map(|category| {
                let mut ranked: Vec<_> = candidates
                    .iter()
                    .filter(|c| c.category_id == category.id)
                    .map(|c| (c, tallies.get(&c.id).copied().unwrap_or(0)))
                    .collect();
                ranked.sort_by(|(a, av), (b, bv)| bv.cmp(av).then(a.id.cmp(&b.id)));

                CategoryResult {
                    category_id: category.id,
                    name: category.name,
                    total_votes: ranked.iter().map(|(_, v)| v).sum(),
                    candidates: ranked
                        .into_iter()
                        .enumerate()
                        .map(|(i, (c, votes))| CandidateResult {
                            candidate_id: c.id,
                            name: c.name.clone(),
                            votes,
                            position: i + 1,
                        })
                        .collect(),
                }
            })
            .collect();

        Ok(Dashboard {
            total_students,
            voted_students,
            turnout_percentage: percentage(voted_students, total_students).round() as u32,
            categories,
        })
    }

    /// Turnout per programme (alphabetical) and per level (numeric).
    pub async fn turnout_breakdown(&self) -> AppResult<TurnoutBreakdown> {
        let students = self.store.list_students().await?;

        let mut programmes: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        let mut levels: BTreeMap<i32, (usize, usize)> = BTreeMap::new();
        for student in &students {
            let voted = usize::from(student.has_voted);
            if let Some(programme) = student.programme.as_deref().filter(|p| !p.is_empty()) {
                let entry = programmes.entry(programme.to_string()).or_default();
                entry.0 += 1;
                entry.1 += voted;
            }
            if let Some(level) = student.level {
                let entry = levels.entry(level).or_default();
                entry.0 += 1;
                entry.1 += voted;
            }
        }

        let group = |name: String, (total, voted): (usize, usize)| GroupTurnout {
            group: name,
            total,
            voted,
            turnout: percentage(voted, total),
        };

        Ok(TurnoutBreakdown {
            programmes: programmes
                .into_iter()
                .map(|(name, counts)| group(name, counts))
                .collect(),
            levels: levels
                .into_iter()
                .map(|(level, counts)| group(level.to_string(), counts))
                .collect(),
        })
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ballot_db::entities::vote;
    use ballot_db::test_utils::{MemoryStore, sample_student};
    use chrono::Utc;

    async fn cast(store: &MemoryStore, id: &str, student: &str, candidate: i32, category: i32) {
        store
            .insert_vote(vote::Model {
                id: id.to_string(),
                student_id: student.to_string(),
                candidate_id: candidate,
                category_id: category,
                created_at: Utc::now().into(),
            })
            .await
            .unwrap();
    }

    async fn setup() -> (Arc<MemoryStore>, ResultsService) {
        let store = Arc::new(MemoryStore::new());
        let mut voted = sample_student("s1", "0200000001");
        voted.has_voted = true;
        store.add_student(voted).await;
        let mut other = sample_student("s2", "0200000002");
        other.programme = Some("Accounting".to_string());
        other.level = Some(100);
        store.add_student(other).await;
        store.add_student(sample_student("s3", "0200000003")).await;

        store.add_category(1, "President", 1).await;
        store.add_candidate(10, "Kofi Boateng", 1).await;
        store.add_candidate(11, "Esi Owusu", 1).await;
        store.add_candidate(12, "Yaw Darko", 1).await;

        (store.clone(), ResultsService::new(store))
    }

    #[tokio::test]
    async fn test_dashboard_ranks_and_includes_zero_votes() {
        let (store, service) = setup().await;
        cast(&store, "v1", "s1", 11, 1).await;
        cast(&store, "v2", "s2", 11, 1).await;
        cast(&store, "v3", "s3", 10, 1).await;

        let dashboard = service.dashboard().await.unwrap();

        assert_eq!(dashboard.total_students, 3);
        assert_eq!(dashboard.voted_students, 1);
        assert_eq!(dashboard.turnout_percentage, 33);

        let president = &dashboard.categories[0];
        assert_eq!(president.total_votes, 3);
        let order: Vec<_> = president
            .candidates
            .iter()
            .map(|c| (c.candidate_id, c.votes, c.position))
            .collect();
        assert_eq!(order, vec![(11, 2, 1), (10, 1, 2), (12, 0, 3)]);
    }

    #[tokio::test]
    async fn test_empty_roll() {
        let service = ResultsService::new(Arc::new(MemoryStore::new()));

        let dashboard = service.dashboard().await.unwrap();
        assert_eq!(dashboard.turnout_percentage, 0);
        assert!(dashboard.categories.is_empty());
    }

    #[tokio::test]
    async fn test_turnout_breakdown() {
        let (_store, service) = setup().await;

        let breakdown = service.turnout_breakdown().await.unwrap();

        let programmes: Vec<_> = breakdown.programmes.iter().map(|g| g.group.as_str()).collect();
        assert_eq!(programmes, vec!["Accounting", "Computer Science"]);
        assert_eq!(breakdown.programmes[1].total, 2);
        assert_eq!(breakdown.programmes[1].voted, 1);
        assert_eq!(breakdown.programmes[1].turnout, 50.0);

        let levels: Vec<_> = breakdown.levels.iter().map(|g| g.group.as_str()).collect();
        assert_eq!(levels, vec!["100", "300"]);
    }
}
