//! Score aggregation
//!
//! Merges the two scorers' skill verdicts and collapses the letter-grade
//! histogram into a GPA-style overall score.

use crate::clients::SkillScore;
use intervox_common::models::TotalScore;
use std::collections::BTreeMap;

/// GPA-style weighted average over the letter-grade histogram.
///
/// A=4, B=3, C=2, D=1, F=0; zero when the histogram is empty.
pub fn overall_score(total: &TotalScore) -> f64 {
    let graded = total.a + total.b + total.c + total.d + total.f;
    if graded == 0 {
        return 0.0;
    }
    let weighted = 4 * total.a + 3 * total.b + 2 * total.c + total.d;
    f64::from(weighted) / f64::from(graded)
}

/// Merge the content scorer's skills with the fluency scorer's.
///
/// The content scorer's entries come first and win name collisions; skills
/// only the fluency scorer reported are appended in order. Returns the
/// aligned `(skills, skills_score)` vectors.
pub fn merge_skills(
    content: &[SkillScore],
    fluency: &BTreeMap<String, String>,
) -> (Vec<String>, Vec<String>) {
    let mut skills = Vec::with_capacity(content.len() + fluency.len());
    let mut scores = Vec::with_capacity(content.len() + fluency.len());

    for entry in content {
        skills.push(entry.skill.clone());
        scores.push(entry.score.clone());
    }
    for (skill, score) in fluency {
        if !skills.iter().any(|s| s == skill) {
            skills.push(skill.clone());
            scores.push(score.clone());
        }
    }
    (skills, scores)
}
