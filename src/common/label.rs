use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of classes the example store is trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "not_touch")]
    NotTouched,
    #[serde(rename = "touched")]
    Touched,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::NotTouched, Label::Touched];

    /// The label whose detection raises an alert.
    pub const ALERT: Label = Label::Touched;

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::NotTouched => "not_touch",
            Label::Touched => "touched",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    // Accepts the stored keys as well as the short console aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "not_touch" | "off" | "1" => Ok(Label::NotTouched),
            "touched" | "on" | "2" => Ok(Label::Touched),
            other => Err(format!("unknown label '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_and_aliases() {
        assert_eq!("not_touch".parse::<Label>(), Ok(Label::NotTouched));
        assert_eq!("OFF".parse::<Label>(), Ok(Label::NotTouched));
        assert_eq!("on".parse::<Label>(), Ok(Label::Touched));
        assert_eq!("2".parse::<Label>(), Ok(Label::Touched));
        assert!("elbow".parse::<Label>().is_err());
    }

    #[test]
    fn serializes_as_store_key() {
        let json = serde_json::to_string(&Label::Touched).unwrap();
        assert_eq!(json, "\"touched\"");
    }
}
