use serde::Serialize;

use crate::config::ContextConfig;
use crate::progress::state::GroupId;
use crate::theory::degree::ScaleDegree;

#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumLevel {
    pub level: u32,
    pub name: String,
    pub description: String,
    pub group_size: usize,
    pub groups: Vec<GroupId>,
}

/// Every `size`-subset of `pool`, in lexicographic index order.
fn combinations(pool: &[ScaleDegree], size: usize) -> Vec<Vec<ScaleDegree>> {
    if size == 0 || size > pool.len() {
        return Vec::new();
    }
    let mut result = Vec::new();
    let mut indices: Vec<usize> = (0..size).collect();
    loop {
        result.push(indices.iter().map(|&i| pool[i]).collect());

        // Rightmost index that can still move.
        let mut i = size;
        loop {
            if i == 0 {
                return result;
            }
            i -= 1;
            if indices[i] != i + pool.len() - size {
                break;
            }
        }
        indices[i] += 1;
        for j in i + 1..size {
            indices[j] = indices[j - 1] + 1;
        }
    }
}

/// Group IDs practised at `level`: each (level + 1)-subset of the context's
/// base degrees. Empty outside 1..=max_level.
pub fn level_groups(context: &ContextConfig, level: u32) -> Vec<GroupId> {
    if level == 0 || level > context.max_level {
        return Vec::new();
    }
    let mut pool = context.base_degrees.clone();
    pool.sort();
    pool.dedup();
    let mut groups: Vec<GroupId> = combinations(&pool, level as usize + 1)
        .into_iter()
        .map(GroupId::new)
        .collect();
    groups.sort();
    groups
}

fn level_name(level: u32) -> &'static str {
    match level {
        1 => "Intervals",
        2 => "Triads",
        3 => "Four Degrees",
        4 => "Five Degrees",
        5 => "Six Degrees",
        _ => "Full Scale",
    }
}

pub fn curriculum_levels(context: &ContextConfig) -> Vec<CurriculumLevel> {
    (1..=context.max_level)
        .map(|level| {
            let group_size = level as usize + 1;
            CurriculumLevel {
                level,
                name: level_name(level).to_string(),
                description: format!("Melodies built from {} scale degrees", group_size),
                group_size,
                groups: level_groups(context, level),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binomial(n: usize, k: usize) -> usize {
        (0..k).fold(1, |acc, i| acc * (n - i) / (i + 1))
    }

    #[test]
    fn test_level_one_pairs() {
        let groups = level_groups(&ContextConfig::major(), 1);
        assert_eq!(groups.len(), 21);
        assert_eq!(groups[0].to_string(), "(1,2)");
        assert_eq!(groups[20].to_string(), "(6,7)");
        assert!(groups.iter().any(|g| g.to_string() == "(1,3)"));
    }

    #[test]
    fn test_level_counts() {
        let major = ContextConfig::major();
        for level in 1..=6 {
            let groups = level_groups(&major, level);
            assert_eq!(groups.len(), binomial(7, level as usize + 1), "level {}", level);
            for group in &groups {
                assert_eq!(group.len(), level as usize + 1);
            }
        }
        assert_eq!(level_groups(&major, 6)[0].to_string(), "(1,2,3,4,5,6,7)");
        assert!(level_groups(&major, 0).is_empty());
        assert!(level_groups(&major, 7).is_empty());
    }

    #[test]
    fn test_level_groups_deterministic() {
        let major = ContextConfig::major();
        assert_eq!(level_groups(&major, 2), level_groups(&major, 2));
        assert!(level_groups(&major, 2).iter().any(|g| g.to_string() == "(1,3,5)"));
    }

    #[test]
    fn test_curriculum_structure() {
        let curriculum = curriculum_levels(&ContextConfig::major());
        assert_eq!(curriculum.len(), 6);
        assert_eq!(curriculum[0].level, 1);
        assert_eq!(curriculum[5].level, 6);

        for (i, level) in curriculum.iter().enumerate() {
            assert_eq!(level.group_size, i + 2);
            assert!(!level.groups.is_empty());
        }
    }
}
