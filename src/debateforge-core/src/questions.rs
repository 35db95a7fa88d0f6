//! Built-in question bank for runs without a seed file.
//!
//! The bank holds a fixed set of questions per philosophy domain, plus
//! conditional ("如果…，那么…？") and contrast ("…与…：哪个更根本？")
//! questions assembled from word lists.

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::record::SeedQuestion;

pub const PHILOSOPHY_DOMAINS: &[(&str, &[&str])] = &[
    (
        "形而上学",
        &[
            "存在的本质是什么？",
            "时间是真实存在的还是人类认知的产物？",
            "空间是无限的吗？",
            "因果关系是必然的吗？",
            "个体性的原则是什么？",
        ],
    ),
    (
        "认识论",
        &[
            "知识的界限在哪里？",
            "感性经验能否提供可靠的知识？",
            "理性与经验哪个更重要？",
            "怀疑主义是否有道理？",
            "真理的标准是什么？",
        ],
    ),
    (
        "伦理学",
        &[
            "道德的基础是什么？",
            "个人幸福与社会利益如何平衡？",
            "善恶的标准是普遍的吗？",
            "道德责任的前提是什么？",
            "美德与规则哪个更重要？",
        ],
    ),
    (
        "美学",
        &[
            "美的标准是客观的吗？",
            "艺术的本质是模仿还是创造？",
            "审美经验的独特性何在？",
            "艺术与现实的关系如何？",
            "美与善、真的关系是什么？",
        ],
    ),
    (
        "心灵哲学",
        &[
            "意识的本质是什么？",
            "心灵与身体的关系如何？",
            "人工智能能否产生真正的意识？",
            "自我认同的标准是什么？",
            "情感在认知中的作用是什么？",
        ],
    ),
    (
        "政治哲学",
        &[
            "理想的政治制度是什么？",
            "个人自由与社会秩序如何平衡？",
            "正义的原则是什么？",
            "权力的合法性来源何在？",
            "公民不服从在什么情况下是正当的？",
        ],
    ),
];

const PREMISES: &[&str] = &["自由意志不存在", "道德是相对的", "知识是有限的", "美是主观的"];
const CONSEQUENCES: &[&str] = &["责任如何定义", "价值如何衡量", "真理如何追求", "创造如何可能"];
const CONTRAST_LEFT: &[&str] = &["理性", "感性", "个体", "集体", "自由", "秩序"];
const CONTRAST_RIGHT: &[&str] = &["情感", "直觉", "社会", "个人", "安全", "创新"];

/// Assembled questions drawn per template kind.
const ASSEMBLED_PER_KIND: usize = 10;

/// Sample up to `count` distinct questions from the bank.
///
/// Domain questions carry their domain as category; assembled ones use the
/// default category.
pub fn generate_questions<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<SeedQuestion> {
    let mut pool: Vec<SeedQuestion> = PHILOSOPHY_DOMAINS
        .iter()
        .flat_map(|(domain, questions)| {
            questions
                .iter()
                .map(move |q| SeedQuestion::new(*q).with_category(*domain))
        })
        .collect();

    for _ in 0..ASSEMBLED_PER_KIND {
        let (premise, consequence) = (pick(PREMISES, rng), pick(CONSEQUENCES, rng));
        push_unique(&mut pool, format!("如果{premise}，那么{consequence}？"));
    }
    for _ in 0..ASSEMBLED_PER_KIND {
        let (left, right) = (pick(CONTRAST_LEFT, rng), pick(CONTRAST_RIGHT, rng));
        push_unique(&mut pool, format!("{left}与{right}：哪个更根本？"));
    }

    pool.choose_multiple(rng, count.min(pool.len())).cloned().collect()
}

fn pick<R: Rng + ?Sized>(words: &[&'static str], rng: &mut R) -> &'static str {
    words.choose(rng).copied().unwrap_or_default()
}

fn push_unique(pool: &mut Vec<SeedQuestion>, question: String) {
    if !pool.iter().any(|seed| seed.question == question) {
        pool.push(SeedQuestion::new(question));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    const BANK_SIZE: usize = 30;

    #[test]
    fn test_requested_count_is_honoured() {
        let questions = generate_questions(12, &mut StdRng::seed_from_u64(1));
        assert_eq!(questions.len(), 12);
    }

    #[test]
    fn test_large_count_returns_whole_pool_without_duplicates() {
        let questions = generate_questions(1000, &mut StdRng::seed_from_u64(2));

        assert!(questions.len() > BANK_SIZE);
        assert!(questions.len() <= BANK_SIZE + 2 * ASSEMBLED_PER_KIND);
        let distinct: HashSet<_> = questions.iter().map(|q| q.question.as_str()).collect();
        assert_eq!(distinct.len(), questions.len());
    }

    #[test]
    fn test_domain_questions_keep_their_category() {
        let questions = generate_questions(1000, &mut StdRng::seed_from_u64(3));

        let ethics = questions
            .iter()
            .filter(|q| q.category.as_deref() == Some("伦理学"))
            .count();
        assert_eq!(ethics, 5);
        let from_bank = questions.iter().filter(|q| q.category.is_some()).count();
        assert_eq!(from_bank, BANK_SIZE);
    }

    #[test]
    fn test_assembled_questions_follow_templates() {
        let questions = generate_questions(1000, &mut StdRng::seed_from_u64(4));

        for seed in questions.iter().filter(|q| q.category.is_none()) {
            let q = &seed.question;
            assert!(
                (q.starts_with("如果") && q.contains("，那么")) || q.ends_with("：哪个更根本？"),
                "unexpected question {q}"
            );
        }
    }

    #[test]
    fn test_zero_count_is_empty() {
        assert!(generate_questions(0, &mut StdRng::seed_from_u64(5)).is_empty());
    }
}
