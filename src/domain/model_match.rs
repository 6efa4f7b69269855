//! Model Match - 模型名称的模糊匹配
//!
//! 使用字符二元组（bigram）的 Dice 系数:
//! 去除所有空白后，`2 * |交集| / (len1 + len2 - 2)`，区分大小写。

use std::collections::HashMap;

/// 模糊匹配的接受阈值，分数必须严格大于该值
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.5;

/// 单个候选的评分
#[derive(Debug, Clone, PartialEq)]
pub struct Rating {
    pub target: String,
    pub rating: f64,
}

/// 所有候选的评分以及最佳候选
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    pub ratings: Vec<Rating>,
    pub best_index: usize,
}

impl BestMatch {
    pub fn best(&self) -> &Rating {
        &self.ratings[self.best_index]
    }

    /// 最佳候选分数超过阈值时返回其名称
    pub fn accepted(&self) -> Option<&str> {
        let best = self.best();
        (best.rating > FUZZY_MATCH_THRESHOLD).then_some(best.target.as_str())
    }
}

/// 两个字符串的相似度，范围 [0, 1]
pub fn compare_two_strings(first: &str, second: &str) -> f64 {
    let first: Vec<char> = first.chars().filter(|c| !c.is_whitespace()).collect();
    let second: Vec<char> = second.chars().filter(|c| !c.is_whitespace()).collect();

    if first == second {
        return 1.0;
    }
    if first.len() < 2 || second.len() < 2 {
        return 0.0;
    }

    let mut first_bigrams: HashMap<(char, char), usize> = HashMap::new();
    for pair in first.windows(2) {
        *first_bigrams.entry((pair[0], pair[1])).or_insert(0) += 1;
    }

    let mut intersection = 0usize;
    for pair in second.windows(2) {
        if let Some(count) = first_bigrams.get_mut(&(pair[0], pair[1])) {
            if *count > 0 {
                *count -= 1;
                intersection += 1;
            }
        }
    }

    (2.0 * intersection as f64) / (first.len() + second.len() - 2) as f64
}

/// 对所有候选评分；并列时取最先出现的候选
///
/// 候选为空时返回 `None`。
pub fn find_best_match<S: AsRef<str>>(main: &str, targets: &[S]) -> Option<BestMatch> {
    if targets.is_empty() {
        return None;
    }

    let ratings: Vec<Rating> = targets
        .iter()
        .map(|target| Rating {
            target: target.as_ref().to_string(),
            rating: compare_two_strings(main, target.as_ref()),
        })
        .collect();

    let mut best_index = 0;
    for (index, rating) in ratings.iter().enumerate() {
        if rating.rating > ratings[best_index].rating {
            best_index = index;
        }
    }

    Some(BestMatch {
        ratings,
        best_index,
    })
}
