//! Human-readable XHTML narratives

use super::glucose::ObservationParts;
use super::insulin::MedicationParts;
use super::l10n::{Language, Phrase};
use super::time::clock_time;
use crate::domain::resource::{CodeableConcept, Coding};

const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn coding_label(coding: &Coding) -> String {
    let prefix = match coding.system.as_str() {
        "http://loinc.org" => "LOINC ",
        "http://snomed.info/sct" => "SNOMED ",
        _ => "",
    };
    format!("{prefix}{} ({})", coding.code, escape(&coding.display))
}

fn codes_line(concept: &CodeableConcept, language: Language) -> String {
    let codes: Vec<String> = concept.coding.iter().map(coding_label).collect();
    format!("{}{}", Phrase::CodeLabel.text(language), codes.join(", "))
}

fn device_line(device: &str, converter_name: Option<&str>, language: Language) -> Option<String> {
    if device.is_empty() {
        return None;
    }
    let via = converter_name
        .map(|name| format!(" ({}{})", Phrase::Via.text(language), escape(name)))
        .unwrap_or_default();
    Some(format!(
        "{}{}{}",
        Phrase::DeviceLabel.text(language),
        escape(device),
        via
    ))
}

fn wrap(lines: Vec<String>, language: Language) -> String {
    let tag = language.as_str();
    format!(
        r#"<div lang="{tag}" xml:lang="{tag}" xmlns="{XHTML_NS}">{}</div>"#,
        lines.join("<br />")
    )
}

/// Narrative for a glucose or carbohydrate observation
pub(crate) fn observation_div(
    parts: &ObservationParts,
    device: &str,
    converter_name: Option<&str>,
    language: Language,
) -> String {
    let label = parts
        .code
        .text
        .as_deref()
        .unwrap_or_else(|| Phrase::ResultLabel.text(language));

    let mut lines = vec![
        codes_line(&parts.code, language),
        format!(
            "{}{}",
            Phrase::TimeLabel.text(language),
            clock_time(&parts.effective, language)
        ),
        format!(
            "{}: {} {}",
            escape(label),
            parts.value.value,
            parts.value.unit
        ),
    ];
    lines.extend(device_line(device, converter_name, language));

    wrap(lines, language)
}

/// Narrative for an insulin administration
pub(crate) fn medication_div(
    parts: &MedicationParts,
    concept: &CodeableConcept,
    device: &str,
    converter_name: Option<&str>,
    language: Language,
) -> String {
    let when = match (&parts.effective_period, &parts.effective_date_time) {
        (Some(period), _) => format!(
            "{} - {}",
            clock_time(&period.start, language),
            clock_time(&period.end, language)
        ),
        (None, Some(instant)) => clock_time(instant, language),
        (None, None) => String::new(),
    };

    let mut lines = vec![
        format!(
            "{}{}",
            Phrase::TypeOfInsulin.text(language),
            escape(concept.text.as_deref().unwrap_or_default())
        ),
        codes_line(concept, language),
        format!("{}{}", Phrase::TimeLabel.text(language), when),
    ];
    if let Some(text) = &parts.dosage.text {
        lines.push(escape(text));
    }
    lines.extend(device_line(device, converter_name, language));

    wrap(lines, language)
}
