//! Narrative and display localization

use crate::domain::{BridgeError, Result};
use std::fmt;
use std::str::FromStr;

/// Narrative language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    Finnish,
    English,
    Swedish,
    German,
}

impl Language {
    /// BCP 47 tag written into `language` and the narrative `lang` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Finnish => "fi",
            Language::English => "en",
            Language::Swedish => "sv",
            Language::German => "de",
        }
    }

    /// Lenient lookup used for per-request language hints; unknown tags
    /// fall back to the default language
    pub fn from_tag(tag: &str) -> Self {
        tag.parse().unwrap_or_default()
    }

    /// Separator between hours and minutes in narrative clock times
    pub(crate) fn clock_separator(&self) -> char {
        match self {
            Language::Finnish | Language::Swedish => '.',
            Language::English | Language::German => ':',
        }
    }
}

impl FromStr for Language {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        let primary = s.split(['-', '_']).next().unwrap_or_default();
        match primary.to_lowercase().as_str() {
            "fi" => Ok(Language::Finnish),
            "en" => Ok(Language::English),
            "sv" => Ok(Language::Swedish),
            "de" => Ok(Language::German),
            _ => Err(BridgeError::Configuration(format!(
                "Unsupported language: {s}. Expected one of fi, en, sv, de"
            ))),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Localized narrative fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phrase {
    CodeLabel,
    TimeLabel,
    DeviceLabel,
    Via,
    ResultLabel,
    TypeOfInsulin,
    BodyFluidGlucose,
    BloodGlucose,
    CarbohydrateIntake,
    ShortActingInsulin,
    LongActingInsulin,
}

impl Phrase {
    pub(crate) fn text(self, language: Language) -> &'static str {
        use Language::*;
        use Phrase::*;

        match (self, language) {
            (CodeLabel, Finnish) => "Koodi: ",
            (CodeLabel, Swedish) => "Kod: ",
            (CodeLabel, English | German) => "Code: ",

            (TimeLabel, Finnish) => "Aika: ",
            (TimeLabel, English) => "Time: ",
            (TimeLabel, Swedish) => "Tid: ",
            (TimeLabel, German) => "Zeit: ",

            (DeviceLabel, Finnish) => "Laite: ",
            (DeviceLabel, English) => "Device: ",
            (DeviceLabel, Swedish) => "Apparat: ",
            (DeviceLabel, German) => "Gerät: ",

            (Via, _) => "via ",

            (ResultLabel, Finnish) => "Tulos",
            (ResultLabel, English) => "Result",
            (ResultLabel, Swedish | German) => "Resultat",

            (TypeOfInsulin, Finnish) => "Insuliinin tyyppi: ",
            (TypeOfInsulin, English) => "Type of insulin: ",
            (TypeOfInsulin, Swedish) => "Typ av insulin: ",
            (TypeOfInsulin, German) => "Art des Insulins: ",

            (BodyFluidGlucose, Finnish) => "Kudossokeri",
            (BodyFluidGlucose, English) => "Glucose in body fluid",
            (BodyFluidGlucose, Swedish) => "Vävnadssocker",
            (BodyFluidGlucose, German) => "Gewebezucker",

            (BloodGlucose, Finnish) => "Verensokeri",
            (BloodGlucose, English) => "Blood glucose",
            (BloodGlucose, Swedish) => "Blodsocker",
            (BloodGlucose, German) => "Blutzucker",

            (CarbohydrateIntake, Finnish) => "Arvioitu hiilihydraattimäärä",
            (CarbohydrateIntake, English) => "Estimated carbohydrate intake",
            (CarbohydrateIntake, Swedish) => "Beräknad mängd kolhydratintag",
            (CarbohydrateIntake, German) => "Geschätzte Kohlenhydrataufnahme",

            (ShortActingInsulin, Finnish) => "Lyhytvaikutteinen insuliini",
            (ShortActingInsulin, English) => "Fast-acting insulin",
            (ShortActingInsulin, Swedish) => "Direktverkande insulin",
            (ShortActingInsulin, German) => "Kurzwirkendes Insulin",

            (LongActingInsulin, Finnish) => "Pitkävaikutteinen insuliini",
            (LongActingInsulin, English) => "Long-acting insulin",
            (LongActingInsulin, Swedish) => "Långverkande insulin",
            (LongActingInsulin, German) => "Langwirkendes Insulin",
        }
    }
}
