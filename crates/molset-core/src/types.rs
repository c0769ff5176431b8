use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of one labeling task contributing rows to the merged collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskName(pub String);

impl TaskName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One task's label for one row: a scalar or a fixed-length vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Label {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Label {
    pub fn shape(&self) -> LabelShape {
        match self {
            Label::Scalar(_) => LabelShape(Vec::new()),
            Label::Vector(v) => LabelShape(vec![v.len()]),
        }
    }
}

/// Dimensions of a label: `[]` for a scalar, `[n]` for a length-n vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelShape(pub Vec<usize>);

impl fmt::Display for LabelShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}
