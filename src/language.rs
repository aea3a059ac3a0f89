use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FilmceptionError;

/// Languages a summary can be presented in. English is the source language
/// and never goes through a translation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    English,
    Urdu,
    Arabic,
    Korean,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::English,
        Language::Urdu,
        Language::Arabic,
        Language::Korean,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Urdu => "ur",
            Self::Arabic => "ar",
            Self::Korean => "ko",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Urdu => "Urdu",
            Self::Arabic => "Arabic",
            Self::Korean => "Korean",
        }
    }

    /// The model-backed target code, `None` for the identity case.
    pub fn translation_code(&self) -> Option<LanguageCode> {
        match self {
            Self::English => None,
            Self::Urdu => Some(LanguageCode::Ur),
            Self::Arabic => Some(LanguageCode::Ar),
            Self::Korean => Some(LanguageCode::Ko),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = FilmceptionError;

    /// Accepts either the code (`ur`) or the display name (`Urdu`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|lang| {
                lang.code().eq_ignore_ascii_case(wanted) || lang.name().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| FilmceptionError::UnsupportedLanguage(s.to_string()))
    }
}

/// Target languages that have a translation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    Ur,
    Ar,
    Ko,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 3] = [LanguageCode::Ur, LanguageCode::Ar, LanguageCode::Ko];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ur => "ur",
            Self::Ar => "ar",
            Self::Ko => "ko",
        }
    }

    /// Hub identifier of the pretrained English→target model
    pub fn default_model_id(&self) -> &'static str {
        match self {
            Self::Ur => "Helsinki-NLP/opus-mt-en-ur",
            Self::Ar => "Helsinki-NLP/opus-mt-en-ar",
            Self::Ko => "Helsinki-NLP/opus-mt-tc-big-en-ko",
        }
    }

    pub fn language(&self) -> Language {
        match self {
            Self::Ur => Language::Urdu,
            Self::Ar => Language::Arabic,
            Self::Ko => Language::Korean,
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageCode {
    type Err = FilmceptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|code| code.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| FilmceptionError::UnsupportedLanguage(s.to_string()))
    }
}
