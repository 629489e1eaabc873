use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Exam category. Determines the exam-type folder on disk and the shape of
/// the serialized answers blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub(crate) enum ExamType {
    Reading,
    Listening,
    Writing,
}

impl ExamType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Reading => "reading",
            Self::Listening => "listening",
            Self::Writing => "writing",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "reading" => Some(Self::Reading),
            "listening" => Some(Self::Listening),
            "writing" => Some(Self::Writing),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
