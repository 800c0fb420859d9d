//! Proficiency levels and the built-in grammar topic catalog.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Learner proficiency. Used as a prompt parameter and as part of cache
/// fingerprints.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ProficiencyLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl ProficiencyLevel {
    /// Every level, easiest first.
    pub const ALL: [ProficiencyLevel; 3] = [
        ProficiencyLevel::Beginner,
        ProficiencyLevel::Intermediate,
        ProficiencyLevel::Advanced,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProficiencyLevel::Beginner => "Beginner",
            ProficiencyLevel::Intermediate => "Intermediate",
            ProficiencyLevel::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProficiencyLevel {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lvl| lvl.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FlowError::InvalidConfig(format!("unknown proficiency level: '{}'", s)))
    }
}

/// A grammar topic a lesson can be generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topic {
    pub id: u32,
    pub title: &'static str,
    /// Short Vietnamese description shown next to the title.
    pub description: &'static str,
}

pub static TOPICS: [Topic; 10] = [
    Topic { id: 1, title: "Present Tenses", description: "Thói quen hàng ngày & hành động hiện tại" },
    Topic { id: 2, title: "Past Tenses", description: "Lịch sử & kỷ niệm quá khứ" },
    Topic { id: 3, title: "Future Forms", description: "Kế hoạch & dự đoán tương lai" },
    Topic { id: 4, title: "Prepositions", description: "Tư duy về thời gian & địa điểm (In, On, At)" },
    Topic { id: 5, title: "Articles", description: "Mạo từ xác định & không xác định (A, An, The)" },
    Topic { id: 6, title: "Passive Voice", description: "Câu bị động - Nhấn mạnh vào hành động" },
    Topic { id: 7, title: "Conditionals", description: "Câu điều kiện (Loại 0, 1, 2, 3)" },
    Topic { id: 8, title: "Relative Clauses", description: "Mệnh đề quan hệ (Who, Which, That)" },
    Topic { id: 9, title: "Modal Verbs", description: "Động từ khuyết thiếu (Can, Should, Must)" },
    Topic { id: 10, title: "Phrasal Verbs", description: "Các cụm động từ thông dụng" },
];

pub fn topic_by_id(id: u32) -> Option<&'static Topic> {
    TOPICS.iter().find(|t| t.id == id)
}

pub fn topic_by_title(title: &str) -> Option<&'static Topic> {
    TOPICS.iter().find(|t| t.title.eq_ignore_ascii_case(title.trim()))
}
