//! Knowledge Base
//!
//! Topical facts used to introduce scenarios and to recognise technical
//! vocabulary during evaluation. The built-in base covers the profiled
//! treatments; a directory of Markdown or plain-text handbooks can be
//! layered on top at startup. Lookups never fail: an unknown topic gets a
//! generic default entry.

use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

const GENERIC_TERMS: [&str; 4] = ["专业", "技术", "效果", "安全"];

const BUILTIN_TERMS: &[(&str, &[&str])] = &[
    ("玻尿酸", &["透明质酸", "分子量", "交联度", "维持时间", "吸收"]),
    ("超声炮", &["SMAS层", "聚焦超声", "紧致", "提升", "无创"]),
    ("热玛吉", &["射频", "胶原蛋白", "紧致", "抗衰", "疗程"]),
    ("种植牙", &["种植体", "骨结合", "愈合期", "冠修复", "使用寿命"]),
    ("矫正", &["牙列不齐", "咬合", "矫治器", "保持器", "疗程"]),
];

static PROJECT_NAME_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(手册|指南|话术|v\d+|\d+)").expect("static regex"));

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("Knowledge directory '{0}' does not exist")]
    MissingDirectory(PathBuf),
    #[error("Failed to read knowledge document: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectionResponse {
    /// Objection category, e.g. "价格" or "效果".
    pub kind: String,
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Knowledge {
    pub name: String,
    pub introduction: String,
    pub technical_terms: Vec<String>,
    pub indications: Vec<String>,
    pub contraindications: Vec<String>,
    pub price_range: String,
    pub duration: String,
    pub faq: Vec<Faq>,
    pub objection_responses: Vec<ObjectionResponse>,
    pub key_points: Vec<String>,
}

impl Knowledge {
    /// Best-effort entry for a topic nothing is known about.
    pub fn default_for(topic: &str) -> Self {
        Self {
            name: topic.to_string(),
            introduction: format!("{topic}是本院热门项目，深受顾客好评。"),
            technical_terms: GENERIC_TERMS.iter().map(|t| t.to_string()).collect(),
            indications: vec!["有改善需求的顾客".into()],
            contraindications: vec!["孕妇".into(), "严重过敏体质".into()],
            price_range: "价格根据方案不同有所差异".into(),
            duration: "效果维持时间因人而异".into(),
            faq: vec![Faq {
                question: format!("{topic}安全吗？"),
                answer: "本院使用的都是经过认证的产品，由经验丰富的医生操作，安全性有保障。".into(),
            }],
            objection_responses: vec![
                ObjectionResponse {
                    kind: "价格".into(),
                    response: "我们提供多种方案，可以根据您的预算来推荐最适合的。".into(),
                },
                ObjectionResponse {
                    kind: "效果".into(),
                    response: "根据顾客反馈，满意度很高，我们也可以看看案例效果。".into(),
                },
            ],
            key_points: vec!["强调安全性".into(), "展示案例".into(), "了解需求".into()],
        }
    }
}

/// Source of topical facts for scenarios and scoring.
#[cfg_attr(test, mockall::automock)]
pub trait KnowledgeProvider: Send + Sync {
    /// Knowledge for `topic`; falls back to a default entry, never fails.
    fn lookup(&self, topic: &str) -> Knowledge;
}

#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: BTreeMap<String, Knowledge>,
}

impl KnowledgeBase {
    /// Entries for every profiled treatment, with their technical vocabulary.
    pub fn builtin() -> Self {
        let entries = BUILTIN_TERMS
            .iter()
            .map(|(name, terms)| {
                let mut knowledge = Knowledge::default_for(name);
                knowledge.technical_terms = terms.iter().map(|t| t.to_string()).collect();
                (name.to_string(), knowledge)
            })
            .collect();
        Self { entries }
    }

    /// Built-in entries overlaid with every `.md`/`.txt` document under `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, KnowledgeError> {
        if !dir.is_dir() {
            return Err(KnowledgeError::MissingDirectory(dir.to_path_buf()));
        }
        let mut base = Self::builtin();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            for entry in std::fs::read_dir(&current)? {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                let is_document = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| matches!(ext.to_lowercase().as_str(), "md" | "txt"));
                if !is_document {
                    debug!(path = %path.display(), "Skipping unsupported knowledge file");
                    continue;
                }
                let name = project_name(&path);
                let content = std::fs::read_to_string(&path)?;
                base.insert(parse_document(&name, &content));
            }
        }
        info!(projects = base.entries.len(), path = %dir.display(), "Knowledge base loaded");
        Ok(base)
    }

    /// Adds or replaces an entry. An entry without terms keeps the terms of
    /// the entry it replaces.
    pub fn insert(&mut self, mut knowledge: Knowledge) {
        if knowledge.technical_terms.is_empty() {
            if let Some(existing) = self.entries.get(&knowledge.name) {
                knowledge.technical_terms = existing.technical_terms.clone();
            }
        }
        self.entries.insert(knowledge.name.clone(), knowledge);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn find(&self, topic: &str) -> Option<&Knowledge> {
        if let Some(exact) = self.entries.get(topic) {
            return Some(exact);
        }
        if let Some((_, knowledge)) = self
            .entries
            .iter()
            .find(|(name, _)| topic.contains(name.as_str()) || name.contains(topic))
        {
            return Some(knowledge);
        }
        if topic.chars().count() < 2 {
            return None;
        }
        let matcher = SkimMatcherV2::default();
        self.entries
            .iter()
            .filter_map(|(name, knowledge)| {
                let score = matcher
                    .fuzzy_match(name, topic)
                    .max(matcher.fuzzy_match(topic, name))?;
                (score > 0).then_some((score, knowledge))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, knowledge)| knowledge)
    }

    /// FAQ entries whose question or answer mentions `query`.
    pub fn search_faq(&self, query: &str, top_k: usize) -> Vec<(String, Faq)> {
        self.entries
            .values()
            .flat_map(|k| k.faq.iter().map(move |faq| (k.name.clone(), faq)))
            .filter(|(_, faq)| faq.question.contains(query) || faq.answer.contains(query))
            .take(top_k)
            .map(|(name, faq)| (name, faq.clone()))
            .collect()
    }

    /// Objection responses across all entries whose kind mentions `kind`.
    pub fn objection_responses(&self, kind: &str) -> Vec<ObjectionResponse> {
        self.entries
            .values()
            .flat_map(|k| k.objection_responses.iter())
            .filter(|o| o.kind.contains(kind))
            .cloned()
            .collect()
    }
}

impl KnowledgeProvider for KnowledgeBase {
    fn lookup(&self, topic: &str) -> Knowledge {
        self.find(topic.trim())
            .cloned()
            .unwrap_or_else(|| Knowledge::default_for(topic.trim()))
    }
}

/// Project name from a handbook file name, e.g. `玻尿酸话术手册v2.md` → `玻尿酸`.
pub fn project_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    PROJECT_NAME_NOISE.replace_all(stem, "").trim().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Introduction,
    Indications,
    Contraindications,
    Price,
    Duration,
    Terms,
    Faq,
    Objections,
    KeyPoints,
}

const HEADINGS: &[(&[&str], Section)] = &[
    (&["介绍", "简介"], Section::Introduction),
    (&["适应症", "适合人群"], Section::Indications),
    (&["禁忌"], Section::Contraindications),
    (&["价格", "费用"], Section::Price),
    (&["维持", "效果"], Section::Duration),
    (&["术语"], Section::Terms),
    (&["FAQ", "常见问题"], Section::Faq),
    (&["异议"], Section::Objections),
    (&["要点", "重点"], Section::KeyPoints),
];

fn heading(line: &str) -> Option<Section> {
    let is_marked = line.starts_with('#');
    let is_short_title = line.chars().count() <= 12
        && !is_bullet(line)
        && !line.contains(['？', '?', '：', ':']);
    if !is_marked && !is_short_title {
        return None;
    }
    HEADINGS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|kw| line.contains(kw)))
        .map(|(_, section)| *section)
}

fn is_bullet(line: &str) -> bool {
    line.starts_with(['•', '-', '*'])
        || line
            .split_once('.')
            .is_some_and(|(n, _)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

fn strip_bullet(line: &str) -> &str {
    line.trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '•' | '-' | '*' | '.' | ' '))
}

/// Extracts structured knowledge from a handbook's text.
pub fn parse_document(name: &str, content: &str) -> Knowledge {
    let mut knowledge = Knowledge {
        name: name.to_string(),
        ..Knowledge::default()
    };
    let mut section = None;

    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(next) = heading(line) {
            section = Some(next);
            continue;
        }
        match section {
            Some(Section::Introduction) => push_text(&mut knowledge.introduction, line),
            Some(Section::Indications) if is_bullet(line) => {
                knowledge.indications.push(strip_bullet(line).to_string())
            }
            Some(Section::Contraindications) if is_bullet(line) => {
                knowledge.contraindications.push(strip_bullet(line).to_string())
            }
            Some(Section::Price) => push_text(&mut knowledge.price_range, line),
            Some(Section::Duration) => push_text(&mut knowledge.duration, line),
            Some(Section::Terms) => knowledge.technical_terms.extend(
                strip_bullet(line)
                    .split(['、', '，', ',', ' '])
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from),
            ),
            Some(Section::Faq) => {
                if line.contains(['？', '?']) {
                    knowledge.faq.push(Faq {
                        question: strip_bullet(line).to_string(),
                        answer: String::new(),
                    });
                } else if let Some(last) = knowledge.faq.last_mut() {
                    push_text(&mut last.answer, line);
                }
            }
            Some(Section::Objections) => {
                if let Some((kind, response)) = line.split_once(['：', ':']) {
                    knowledge.objection_responses.push(ObjectionResponse {
                        kind: strip_bullet(kind).trim().to_string(),
                        response: response.trim().to_string(),
                    });
                }
            }
            Some(Section::KeyPoints) if line.starts_with(['•', '-', '*']) => {
                knowledge.key_points.push(strip_bullet(line).to_string())
            }
            _ => {}
        }
    }
    knowledge
}

fn push_text(target: &mut String, line: &str) {
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(line);
}

#[cfg(test)]
mod tests {
    use super::*;

    const HANDBOOK: &str = "\
# 项目简介
玻尿酸是一种透明质酸填充剂。
可用于面部塑形。

# 适合人群
- 法令纹明显者
- 下巴后缩者

# 禁忌
1. 孕妇
2. 瘢痕体质

# 专业术语
- 透明质酸、交联度、分子量

# 常见问题
会不会僵硬？
注射层次合适就不会僵硬。
能维持多久？
一般6-12个月。

# 异议处理
价格：我们有多种品牌可选。
效果：可以先看案例。

# 沟通要点
- 先了解需求
- 再介绍方案
";

    #[test]
    fn test_parse_document_sections() {
        let k = parse_document("玻尿酸", HANDBOOK);
        assert_eq!(k.introduction, "玻尿酸是一种透明质酸填充剂。 可用于面部塑形。");
        assert_eq!(k.indications, vec!["法令纹明显者", "下巴后缩者"]);
        assert_eq!(k.contraindications, vec!["孕妇", "瘢痕体质"]);
        assert_eq!(k.technical_terms, vec!["透明质酸", "交联度", "分子量"]);
        assert_eq!(k.faq.len(), 2);
        assert_eq!(k.faq[1].question, "能维持多久？");
        assert_eq!(k.faq[1].answer, "一般6-12个月。");
        assert_eq!(k.objection_responses[0].kind, "价格");
        assert_eq!(k.objection_responses[1].response, "可以先看案例。");
        assert_eq!(k.key_points, vec!["先了解需求", "再介绍方案"]);
    }

    #[test]
    fn test_project_name_strips_noise() {
        assert_eq!(project_name(Path::new("/kb/玻尿酸话术手册v2.md")), "玻尿酸");
        assert_eq!(project_name(Path::new("超声炮指南2024.txt")), "超声炮");
    }

    #[test]
    fn test_lookup_exact_substring_and_fuzzy() {
        let base = KnowledgeBase::builtin();
        assert_eq!(base.lookup("玻尿酸").technical_terms[0], "透明质酸");
        assert_eq!(base.lookup("种植牙修复").name, "种植牙");
        assert_eq!(base.lookup("超声波炮").name, "超声炮");
    }

    #[test]
    fn test_lookup_unknown_topic_returns_default() {
        let k = KnowledgeBase::builtin().lookup("价格谈判");
        assert_eq!(k.name, "价格谈判");
        assert_eq!(k.technical_terms, vec!["专业", "技术", "效果", "安全"]);
        assert_eq!(k.faq[0].question, "价格谈判安全吗？");
    }

    #[test]
    fn test_load_dir_overlays_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("玻尿酸话术手册.md"), HANDBOOK).unwrap();
        std::fs::create_dir(dir.path().join("dental")).unwrap();
        std::fs::write(
            dir.path().join("dental").join("种植牙指南.txt"),
            "# 项目介绍\n种植牙恢复咀嚼功能。\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.pdf"), "binary").unwrap();

        let base = KnowledgeBase::load_dir(dir.path()).unwrap();
        let hyaluronic = base.lookup("玻尿酸");
        assert_eq!(hyaluronic.technical_terms, vec!["透明质酸", "交联度", "分子量"]);
        assert_eq!(hyaluronic.key_points.len(), 2);

        // No terms section: the built-in vocabulary survives.
        let implant = base.lookup("种植牙");
        assert_eq!(implant.introduction, "种植牙恢复咀嚼功能。");
        assert!(implant.technical_terms.contains(&"骨结合".to_string()));
    }

    #[test]
    fn test_load_dir_missing_directory() {
        let err = KnowledgeBase::load_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, KnowledgeError::MissingDirectory(_)));
    }

    #[test]
    fn test_search_faq_and_objections() {
        let mut base = KnowledgeBase::builtin();
        base.insert(parse_document("玻尿酸", HANDBOOK));
        let hits = base.search_faq("僵硬", 3);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "玻尿酸");
        assert!(!base.objection_responses("价格").is_empty());
        assert!(base.objection_responses("不存在").is_empty());
    }

    #[test]
    fn test_mock_provider_is_usable_as_trait_object() {
        let mut mock = MockKnowledgeProvider::new();
        mock.expect_lookup()
            .withf(|topic| topic == "玻尿酸")
            .returning(|topic| Knowledge::default_for(topic));
        let provider: &dyn KnowledgeProvider = &mock;
        assert_eq!(provider.lookup("玻尿酸").name, "玻尿酸");
    }
}
