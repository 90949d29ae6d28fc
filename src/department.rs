use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// The closed set of departments a user or a document can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Engineering,
    Marketing,
    Finance,
    Hr,
}

impl Department {
    pub const ALL: [Department; 4] = [
        Department::Engineering,
        Department::Marketing,
        Department::Finance,
        Department::Hr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Engineering => "engineering",
            Department::Marketing => "marketing",
            Department::Finance => "finance",
            Department::Hr => "hr",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Department::Engineering => "Engineering",
            Department::Marketing => "Marketing",
            Department::Finance => "Finance",
            Department::Hr => "HR",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Department {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "engineering" => Ok(Department::Engineering),
            "marketing" => Ok(Department::Marketing),
            "finance" => Ok(Department::Finance),
            "hr" => Ok(Department::Hr),
            other => Err(ApiError::BadRequest(format!(
                "Unknown department '{}'; expected one of engineering, marketing, finance, hr",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_departments_case_insensitively() {
        assert_eq!("Engineering".parse::<Department>().unwrap(), Department::Engineering);
        assert_eq!(" HR ".parse::<Department>().unwrap(), Department::Hr);
        for dept in Department::ALL {
            assert_eq!(dept.as_str().parse::<Department>().unwrap(), dept);
        }
    }

    #[test]
    fn rejects_free_form_tags() {
        assert!(matches!(
            "general".parse::<Department>(),
            Err(ApiError::BadRequest(_))
        ));
        assert!("".parse::<Department>().is_err());
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Department::Hr).unwrap();
        assert_eq!(json, "\"hr\"");
        let parsed: Department = serde_json::from_str("\"finance\"").unwrap();
        assert_eq!(parsed, Department::Finance);
    }
}
